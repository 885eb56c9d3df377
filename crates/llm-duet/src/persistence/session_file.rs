//! Resume format.
//!
//! ```json
//! {
//!     "A": [{"role": "assistant", "content": "..."}, ...],
//!     "B": [{"role": "user", "content": "..."}, ...],
//!     "next": "B"
//! }
//! ```
//!
//! `next` was added later; files without it fall back to message-count parity.

use super::{read_json, write_json};
use crate::context::{AgentContext, Side};
use crate::error::PersistenceError;
use crate::message::{ChatMessage, Role, TranscriptEntry};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Both agents' exchange history, keyed by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(rename = "A")]
    pub a: Vec<ChatMessage>,
    #[serde(rename = "B")]
    pub b: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Side>,
}

impl SessionFile {
    /// Captures two contexts, dropping each leading system prompt.
    pub fn from_contexts(a: &AgentContext, b: &AgentContext, next: Side) -> Self {
        Self {
            a: a.history().to_vec(),
            b: b.history().to_vec(),
            next: Some(next),
        }
    }

    /// Loads and validates a session file.
    ///
    /// Nothing is returned unless the whole file is valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let file: SessionFile = read_json(path)?;

        for (side, messages) in [(Side::A, &file.a), (Side::B, &file.b)] {
            if let Some(pos) = messages.iter().position(|m| m.role == Role::System) {
                return Err(PersistenceError::Invalid {
                    path: path.to_path_buf(),
                    reason: format!(
                        "side {side} has a system message at index {pos}; system prompts are supplied on load"
                    ),
                });
            }
        }

        Ok(file)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        write_json(path.as_ref(), self)
    }

    /// Side that speaks next once this history sits behind a system prompt.
    pub fn next_side(&self) -> Side {
        self.next
            .unwrap_or_else(|| Side::from_parity(1 + self.a.len()))
    }

    /// Rebuilds display records from side A's history, in file order.
    ///
    /// `assistant` messages were spoken by A and `user` messages by B.
    pub fn transcript_entries(&self, label_a: &str, label_b: &str) -> Vec<TranscriptEntry> {
        self.a
            .iter()
            .filter_map(|msg| match msg.role {
                Role::Assistant => Some(TranscriptEntry::new(label_a, msg.content.clone())),
                Role::User => Some(TranscriptEntry::new(label_b, msg.content.clone())),
                Role::System => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn contexts() -> (AgentContext, AgentContext) {
        let mut a = AgentContext::new("sys A");
        let mut b = AgentContext::new("sys B");
        for (i, speaker) in [Side::A, Side::B, Side::A].into_iter().enumerate() {
            let text = format!("m{}", i + 1);
            match speaker {
                Side::A => {
                    a.push_assistant(&text);
                    b.push_user(&text);
                }
                Side::B => {
                    b.push_assistant(&text);
                    a.push_user(&text);
                }
            }
        }
        (a, b)
    }

    #[test]
    fn test_from_contexts_drops_system_prompt() {
        let (a, b) = contexts();
        let file = SessionFile::from_contexts(&a, &b, Side::B);
        assert_eq!(file.a.len(), 3);
        assert_eq!(file.a[0], ChatMessage::assistant("m1"));
        assert_eq!(file.b[0], ChatMessage::user("m1"));
        assert_eq!(file.next, Some(Side::B));
    }

    #[test]
    fn test_save_layout_and_key_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let file = SessionFile {
            a: vec![ChatMessage::assistant("Grüße")],
            b: vec![ChatMessage::user("Grüße")],
            next: Some(Side::B),
        };
        file.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let a_at = text.find("\"A\"").unwrap();
        let b_at = text.find("\"B\"").unwrap();
        let next_at = text.find("\"next\"").unwrap();
        assert!(a_at < b_at && b_at < next_at);
        assert!(text.contains("Grüße"));
        assert!(text.contains("\n    \"A\": ["));
    }

    #[test]
    fn test_load_without_next_uses_parity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{"A": [{"role": "assistant", "content": "hi"}], "B": [{"role": "user", "content": "hi"}]}"#,
        )
        .unwrap();

        let file = SessionFile::load(&path).unwrap();
        assert_eq!(file.next, None);
        // One exchange done: context A would hold 2 messages, so B is next.
        assert_eq!(file.next_side(), Side::B);
    }

    #[test]
    fn test_load_rejects_embedded_system_message() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"A": [{"role": "system", "content": "persona"}], "B": []}"#,
        )
        .unwrap();

        assert!(matches!(
            SessionFile::load(&path),
            Err(PersistenceError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"A": [{"role": "assistant""#).unwrap();
        assert!(matches!(
            SessionFile::load(&path),
            Err(PersistenceError::Json { .. })
        ));
    }

    #[test]
    fn test_transcript_entries_map_roles_to_labels() {
        let (a, b) = contexts();
        let file = SessionFile::from_contexts(&a, &b, Side::B);
        let entries = file.transcript_entries("Alice:", "Bob:");
        assert_eq!(
            entries,
            vec![
                TranscriptEntry::new("Alice:", "m1"),
                TranscriptEntry::new("Bob:", "m2"),
                TranscriptEntry::new("Alice:", "m3"),
            ]
        );
    }
}
