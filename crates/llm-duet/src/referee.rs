//! Off-topic referee.
//!
//! After an exchange, the referee asks a judging model whether the newest
//! reply still follows the conversation's framing. The prompt is rebuilt from
//! the full transcript on every check; nothing is cached between checks.
//!
//! ```text
//! <instruction template>
//! <label>: <content>        (one line per transcript entry)
//! ...
//! New message:
//! <newest reply>
//! Reply with just yes or no.
//! ```
//!
//! The decision is delegated to a [`VerdictRule`]. The default,
//! [`substring_no_veto`], vetoes whenever the answer contains `"no"` anywhere,
//! which also matches answers like "I don't know". It is kept for
//! compatibility with existing transcripts; swap it with
//! [`Referee::with_verdict_rule`] for a stricter parser.

use crate::error::DuetError;
use crate::gateway::{CompletionGateway, CompletionRequest};
use crate::message::ChatMessage;
use crate::transcript::Transcript;
use tracing::debug;

/// Output budget for the judging call.
pub const REFEREE_MAX_TOKENS: u32 = 16;

/// System instruction given to the judging model.
pub const REFEREE_SYSTEM_PROMPT: &str = "You are a strict conversation referee. \
You answer every request with a single word: \"yes\" or \"no\". Never add anything else.";

const REFEREE_TEMPLATE: &str = "\
You are reviewing a conversation between two participants. Each participant \
was given instructions and a topic before it started. Judge strictly whether \
the new message below still follows those instructions and stays on the \
original topic. Answer \"yes\" if the conversation should continue, or \"no\" \
if it has drifted and must stop.

Conversation so far:
{{ transcript }}

New message:
{{ reply }}

Reply with just yes or no.";

/// Outcome of a referee check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Veto,
}

/// Maps a raw judge answer to a verdict.
pub type VerdictRule = fn(&str) -> Verdict;

/// Vetoes when the trimmed, lower-cased answer contains `"no"` anywhere.
pub fn substring_no_veto(raw: &str) -> Verdict {
    if raw.trim().to_lowercase().contains("no") {
        Verdict::Veto
    } else {
        Verdict::Continue
    }
}

/// A completed referee check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgement {
    pub verdict: Verdict,
    /// The judge's answer, unmodified.
    pub raw: String,
}

impl Judgement {
    pub fn is_veto(&self) -> bool {
        self.verdict == Verdict::Veto
    }
}

/// Builds and evaluates continuation checks.
#[derive(Debug, Clone)]
pub struct Referee {
    model: Option<String>,
    rule: VerdictRule,
}

impl Default for Referee {
    fn default() -> Self {
        Self::new()
    }
}

impl Referee {
    /// Creates a referee that judges with the caller-supplied fallback model.
    pub fn new() -> Self {
        Self {
            model: None,
            rule: substring_no_veto,
        }
    }

    /// Uses a dedicated judging model instead of a participant's deployment.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Replaces the decision rule.
    pub fn with_verdict_rule(mut self, rule: VerdictRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Renders the user prompt for one check.
    pub fn build_prompt(&self, transcript: &Transcript, reply: &str) -> Result<String, DuetError> {
        Ok(crate::prompt!(
            REFEREE_TEMPLATE,
            transcript = transcript.render_lines(),
            reply = reply,
        )?)
    }

    /// Builds the gateway request for one check.
    ///
    /// `fallback_model` is used when no dedicated judging model was set.
    pub fn build_request(
        &self,
        transcript: &Transcript,
        reply: &str,
        fallback_model: &str,
    ) -> Result<CompletionRequest, DuetError> {
        let prompt = self.build_prompt(transcript, reply)?;
        let model = self.model.as_deref().unwrap_or(fallback_model);
        Ok(CompletionRequest::new(
            vec![
                ChatMessage::system(REFEREE_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            model,
            REFEREE_MAX_TOKENS,
        ))
    }

    /// Applies the configured rule to a raw answer.
    pub fn decide(&self, raw: &str) -> Verdict {
        (self.rule)(raw)
    }

    /// Runs one continuation check through `gateway`.
    pub async fn judge<G>(
        &self,
        gateway: &G,
        transcript: &Transcript,
        reply: &str,
        fallback_model: &str,
    ) -> Result<Judgement, DuetError>
    where
        G: CompletionGateway + ?Sized,
    {
        let request = self.build_request(transcript, reply, fallback_model)?;
        let raw = gateway.complete(request).await?;
        let verdict = self.decide(&raw);

        debug!(
            target: "llm_duet::referee",
            raw = %raw,
            verdict = ?verdict,
            event = "referee_judged"
        );

        Ok(Judgement { verdict, raw })
    }
}
