//! Session and preset files.
//!
//! Two formats with different scopes:
//!
//! - [`SessionFile`]: conversation content (both contexts minus their system
//!   prompts, plus whose turn is next). Used to resume a run.
//! - [`Preset`]: configuration inputs only. Used to prefill a new run.
//!
//! Both are written with stable key order, four-space indentation and
//! non-ASCII text kept literally, and both are loaded all-or-nothing.

pub mod preset;
pub mod session_file;

pub use preset::Preset;
pub use session_file::SessionFile;

use crate::error::PersistenceError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Serializes `value` as indented JSON (four spaces, UTF-8 kept literal).
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// Reads and parses a whole JSON file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as indented JSON, creating parent directories and
/// replacing any existing file.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let bytes = to_pretty_json(value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, bytes).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
