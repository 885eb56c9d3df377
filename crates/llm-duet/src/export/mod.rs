//! Artifacts written when a session stops.

pub mod json;
pub mod pdf;

pub use json::SessionJsonExporter;
pub use pdf::PdfExporter;

use crate::context::{AgentContext, Side};
use crate::error::ExportError;
use crate::transcript::Transcript;
use std::path::PathBuf;

/// Read-only snapshot of a stopped session handed to exporters.
#[derive(Debug, Clone, Copy)]
pub struct ExportView<'a> {
    /// Artifact base name, never empty.
    pub name: &'a str,
    pub transcript: &'a Transcript,
    pub context_a: &'a AgentContext,
    pub context_b: &'a AgentContext,
    /// Side that would have spoken next.
    pub next: Side,
}

/// Writes one artifact for a stopped session.
pub trait SessionExporter: Send + Sync {
    /// Writes the artifact and returns where it went.
    fn export(&self, view: &ExportView<'_>) -> Result<PathBuf, ExportError>;

    /// Short name for logs.
    fn name(&self) -> String {
        let type_name = std::any::type_name::<Self>();
        type_name.rsplit("::").next().unwrap_or(type_name).to_string()
    }
}
