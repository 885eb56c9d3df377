use super::{ExportView, SessionExporter};
use crate::config::OutputLayout;
use crate::error::ExportError;
use crate::persistence::SessionFile;
use std::path::PathBuf;

/// Writes the resume file as `<output>/Conversations_JSON/<name>.json`.
#[derive(Debug, Clone, Default)]
pub struct SessionJsonExporter {
    layout: OutputLayout,
}

impl SessionJsonExporter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }
}

impl SessionExporter for SessionJsonExporter {
    fn export(&self, view: &ExportView<'_>) -> Result<PathBuf, ExportError> {
        let path = self.layout.session_path(view.name);
        SessionFile::from_contexts(view.context_a, view.context_b, view.next).save(&path)?;
        Ok(path)
    }
}
