//! Per-agent rolling context.

use crate::message::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one of the two participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// Returns the opposite participant.
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Side that goes next given the length of context A.
    ///
    /// Context A starts with its system message, so an odd length means an
    /// even number of exchanges have happened and A speaks next.
    pub fn from_parity(context_a_len: usize) -> Side {
        if context_a_len % 2 == 1 { Side::A } else { Side::B }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// The message history sent to one agent on its turn.
///
/// Always begins with exactly one `system` message carrying the agent's
/// persona. Everything after it is the exchange history as seen by this agent:
/// its own replies as `assistant`, the other agent's replies as `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    messages: Vec<ChatMessage>,
}

impl AgentContext {
    /// Creates a context holding only the system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// All messages, system prompt first. This is what a gateway receives.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages after the leading system prompt.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages[1..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; the system prompt is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &ChatMessage {
        // The system message guarantees at least one element.
        &self.messages[self.messages.len() - 1]
    }

    /// Records a reply this agent produced.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Records a reply the other agent produced.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Appends previously persisted history after the system prompt.
    ///
    /// Callers validate roles beforehand; system messages are not expected here.
    pub(crate) fn extend_history(&mut self, history: impl IntoIterator<Item = ChatMessage>) {
        self.messages
            .extend(history.into_iter().filter(|m| m.role != Role::System));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_single_system_message() {
        let ctx = AgentContext::new("You are a pirate.");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.messages()[0].role, Role::System);
        assert_eq!(ctx.system_prompt(), "You are a pirate.");
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_push_keeps_roles() {
        let mut ctx = AgentContext::new("sys");
        ctx.push_assistant("mine");
        ctx.push_user("theirs");
        assert_eq!(ctx.history()[0], ChatMessage::assistant("mine"));
        assert_eq!(ctx.history()[1], ChatMessage::user("theirs"));
        assert_eq!(ctx.last().content, "theirs");
    }

    #[test]
    fn test_parity() {
        assert_eq!(Side::from_parity(1), Side::A);
        assert_eq!(Side::from_parity(2), Side::B);
        assert_eq!(Side::from_parity(5), Side::A);
    }

    #[test]
    fn test_side_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Side::B).unwrap(), "\"B\"");
        assert_eq!(Side::A.other(), Side::B);
    }
}
