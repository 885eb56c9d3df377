//! Message vocabularies.
//!
//! Two kinds of message coexist and are deliberately separate types:
//!
//! - [`ChatMessage`] carries a protocol [`Role`] and lives inside an
//!   [`AgentContext`](crate::context::AgentContext). Only these reach a gateway.
//! - [`TranscriptEntry`] carries a free-text display label (e.g. `"Alice:"`)
//!   and lives in the [`Transcript`](crate::transcript::Transcript). These are
//!   only ever exported.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol role understood by chat-completion endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol message in an agent context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A display record in the transcript.
///
/// The label is arbitrary text chosen for presentation, typically a
/// participant name followed by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub label: String,
    pub content: String,
}

impl TranscriptEntry {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }

    /// Renders the entry as a single `"<label>: <content>"` line.
    ///
    /// A trailing colon on the label is dropped first so display labels such
    /// as `"Alice:"` do not produce `"Alice:: ..."`.
    pub fn render_line(&self) -> String {
        format!(
            "{}: {}",
            self.label.trim_end().trim_end_matches(':'),
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"Alice:","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_line_strips_label_colon() {
        let entry = TranscriptEntry::new("Alice:", "Hello there");
        assert_eq!(entry.render_line(), "Alice: Hello there");

        let bare = TranscriptEntry::new("Bob", "Hi");
        assert_eq!(bare.render_line(), "Bob: Hi");
    }
}
