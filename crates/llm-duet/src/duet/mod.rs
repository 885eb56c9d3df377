//! Turn orchestration between two agents.
//!
//! A [`Duet`] owns both agent contexts, the transcript and the turn budget.
//! Each [`advance`](Duet::advance) sends the active side's context to the
//! gateway, fans the reply out to both contexts and the transcript, and hands
//! the turn to the other side.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_duet::duet::Duet;
//! use llm_duet::gateway::OpenAIGateway;
//!
//! let gateway = OpenAIGateway::try_from_env()?;
//! let mut duet = Duet::new(config, gateway)?;
//! duet.start(4)?;
//! while !duet.is_stopped() {
//!     let turn = duet.advance().await?;
//!     println!("{}: {}", turn.side, turn.content);
//! }
//! ```
//!
//! # Failure handling
//!
//! A failed gateway call, for the reply or for the referee check, leaves every
//! list exactly as it was before the exchange and moves the session to
//! [`RunState::Blocked`]. Nothing is retried until the caller invokes
//! [`retry`](Duet::retry).

pub mod state;

pub use state::{RunState, StopReason, TurnReport};

use crate::config::{DuetConfig, ParticipantConfig};
use crate::context::{AgentContext, Side};
use crate::error::{ConfigError, DuetError, ExportError};
use crate::export::{ExportView, SessionExporter};
use crate::gateway::{CompletionGateway, CompletionRequest};
use crate::message::TranscriptEntry;
use crate::persistence::SessionFile;
use crate::referee::{Judgement, Referee};
use crate::transcript::Transcript;
use state::PendingReview;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// One two-agent conversation session.
pub struct Duet<G: CompletionGateway> {
    config: DuetConfig,
    gateway: G,
    context_a: AgentContext,
    context_b: AgentContext,
    transcript: Transcript,
    state: RunState,
    remaining: u32,
    next: Side,
    /// Side that opens the run once started.
    first: Side,
    referee: Option<Referee>,
    pending_review: Option<PendingReview>,
    stop_reason: Option<StopReason>,
    status: Option<String>,
    exporters: Vec<Box<dyn SessionExporter>>,
    exported: Vec<PathBuf>,
    export_attempted: bool,
}

impl<G: CompletionGateway> Duet<G> {
    /// Creates an idle session with fresh contexts.
    ///
    /// The referee is enabled when `config.referee` is set.
    pub fn new(config: DuetConfig, gateway: G) -> Result<Self, ConfigError> {
        config.validate()?;

        let context_a = AgentContext::new(config.a.system_prompt.as_str());
        let context_b = AgentContext::new(config.b.system_prompt.as_str());
        let transcript = Transcript::seeded(&config.a, &config.b);
        let referee = config.referee.then(Referee::new);

        Ok(Self {
            config,
            gateway,
            context_a,
            context_b,
            transcript,
            state: RunState::Idle,
            remaining: 0,
            next: Side::A,
            first: Side::A,
            referee,
            pending_review: None,
            stop_reason: None,
            status: None,
            exporters: Vec::new(),
            exported: Vec::new(),
            export_attempted: false,
        })
    }

    /// Creates an idle session continuing a saved conversation.
    ///
    /// The saved history is placed behind the system prompts from `config`,
    /// and transcript records are rebuilt from side A's history.
    pub fn from_session(config: DuetConfig, gateway: G, session: SessionFile) -> Result<Self, ConfigError> {
        let mut duet = Self::new(config, gateway)?;

        let entries = session.transcript_entries(
            &duet.config.a.display_label(),
            &duet.config.b.display_label(),
        );
        for entry in entries {
            duet.transcript.push(entry);
        }

        duet.first = session.next_side();
        let flagged = session.next.is_some();
        duet.context_a.extend_history(session.a);
        duet.context_b.extend_history(session.b);

        info!(
            target: "llm_duet::duet",
            context_a_len = duet.context_a.len(),
            context_b_len = duet.context_b.len(),
            next = %duet.first,
            flagged,
            event = "session_resumed"
        );

        Ok(duet)
    }

    /// Replaces the referee, enabling it if the configuration did not.
    pub fn with_referee(mut self, referee: Referee) -> Self {
        self.referee = Some(referee);
        self
    }

    /// Adds an exporter run once when the session stops.
    pub fn with_exporter(mut self, exporter: impl SessionExporter + 'static) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }

    pub fn config(&self) -> &DuetConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn context(&self, side: Side) -> &AgentContext {
        match side {
            Side::A => &self.context_a,
            Side::B => &self.context_b,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == RunState::Stopped
    }

    /// Turns left in the budget.
    pub fn remaining_turns(&self) -> u32 {
        self.remaining
    }

    /// Side whose context is sent on the next exchange.
    pub fn next_side(&self) -> Side {
        match self.state {
            RunState::Idle => self.first,
            _ => self.next,
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Last status message, such as the referee's stop notice.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Paths written by exporters when the session stopped.
    pub fn exported_paths(&self) -> &[PathBuf] {
        &self.exported
    }

    fn participant(&self, side: Side) -> &ParticipantConfig {
        self.config.participant(side)
    }

    fn invalid_state(&self, operation: &'static str) -> DuetError {
        DuetError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    /// Begins a run with a budget of `turns` exchanges.
    pub fn start(&mut self, turns: u32) -> Result<(), DuetError> {
        if self.state != RunState::Idle {
            return Err(self.invalid_state("start"));
        }
        if turns == 0 {
            return Err(ConfigError::InvalidTurns(turns.to_string()).into());
        }

        self.next = self.first;
        self.remaining = turns;
        self.state = RunState::Running;

        info!(
            target: "llm_duet::duet",
            turns,
            next = %self.next,
            referee = self.referee.is_some(),
            transcript_len = self.transcript.len(),
            event = "session_started"
        );
        Ok(())
    }

    /// Runs exactly one exchange.
    ///
    /// Nothing is appended until the gateway call and, when enabled, the
    /// referee check have both succeeded. After a referee failure, the first
    /// call following [`retry`](Self::retry) repeats only the pending check.
    pub async fn advance(&mut self) -> Result<TurnReport, DuetError> {
        if self.state != RunState::Running {
            return Err(self.invalid_state("advance"));
        }

        let pending = match self.pending_review.take() {
            Some(pending) => pending,
            None => self.request_reply().await?,
        };

        let judgement = match self.judge(&pending).await {
            Ok(judgement) => judgement,
            Err(err) => {
                self.state = RunState::Blocked;
                error!(
                    target: "llm_duet::duet",
                    side = %pending.side,
                    phase = "referee",
                    error = %err,
                    event = "turn_failed"
                );
                self.pending_review = Some(pending);
                return Err(err);
            }
        };

        self.apply_reply(pending.side, &pending.reply);

        info!(
            target: "llm_duet::duet",
            side = %pending.side,
            chars = pending.reply.chars().count(),
            context_len = self.context_a.len(),
            event = "turn_completed"
        );

        self.book(pending, judgement)
    }

    /// Sends the active side's context to the gateway.
    async fn request_reply(&mut self) -> Result<PendingReview, DuetError> {
        let side = self.next;
        let participant = self.participant(side);
        let request = CompletionRequest::new(
            self.context(side).messages().to_vec(),
            participant.deployment.as_str(),
            participant.params.max_output_tokens,
        )
        .with_seed(participant.params.seed);

        info!(
            target: "llm_duet::duet",
            side = %side,
            participant = %participant.name,
            model = %participant.deployment,
            remaining = self.remaining,
            event = "turn_started"
        );

        match self.gateway.complete(request).await {
            Ok(reply) => Ok(PendingReview { side, reply }),
            Err(err) => {
                self.state = RunState::Blocked;
                error!(
                    target: "llm_duet::duet",
                    side = %side,
                    phase = "completion",
                    retryable = err.is_retryable(),
                    error = %err,
                    event = "turn_failed"
                );
                Err(err.into())
            }
        }
    }

    fn transcript_entry(&self, side: Side, reply: &str) -> TranscriptEntry {
        TranscriptEntry::new(self.participant(side).display_label(), reply)
    }

    /// Appends a reply to both contexts and the transcript, then hands the
    /// turn over.
    fn apply_reply(&mut self, side: Side, reply: &str) {
        let entry = self.transcript_entry(side, reply);
        let (own, other) = match side {
            Side::A => (&mut self.context_a, &mut self.context_b),
            Side::B => (&mut self.context_b, &mut self.context_a),
        };
        own.push_assistant(reply);
        other.push_user(reply);
        self.transcript.push(entry);
        self.next = side.other();
    }

    /// Asks the referee, if any, about a reply that is not applied yet.
    ///
    /// The prompt shows the transcript as it will read once the reply is in.
    async fn judge(&self, pending: &PendingReview) -> Result<Option<Judgement>, DuetError> {
        let Some(referee) = self.referee.as_ref() else {
            return Ok(None);
        };
        let mut transcript = self.transcript.clone();
        transcript.push(self.transcript_entry(pending.side, &pending.reply));

        let judgement = referee
            .judge(&self.gateway, &transcript, &pending.reply, &self.config.a.deployment)
            .await?;
        Ok(Some(judgement))
    }

    /// Books an applied exchange against the budget.
    fn book(&mut self, pending: PendingReview, judgement: Option<Judgement>) -> Result<TurnReport, DuetError> {
        let vetoed = judgement.as_ref().is_some_and(Judgement::is_veto);
        if let Some(judgement) = judgement.as_ref().filter(|j| j.is_veto()) {
            self.remaining = 0;
            self.status = Some(format!(
                "Referee stopped the conversation: {}",
                judgement.raw.trim()
            ));
            warn!(
                target: "llm_duet::duet",
                side = %pending.side,
                raw = %judgement.raw,
                event = "referee_veto"
            );
        }

        self.remaining = self.remaining.saturating_sub(1);

        let stopped = if self.remaining == 0 {
            let reason = if vetoed {
                StopReason::RefereeVeto
            } else {
                StopReason::BudgetExhausted
            };
            self.finish(reason)?;
            Some(reason)
        } else {
            None
        };

        Ok(TurnReport {
            side: pending.side,
            content: pending.reply,
            judgement,
            remaining: self.remaining,
            stopped,
        })
    }

    /// Leaves [`RunState::Blocked`] so the failed step can be attempted again.
    pub fn retry(&mut self) -> Result<(), DuetError> {
        if self.state != RunState::Blocked {
            return Err(self.invalid_state("retry"));
        }
        self.state = RunState::Running;
        info!(
            target: "llm_duet::duet",
            next = %self.next,
            pending_review = self.pending_review.is_some(),
            event = "session_retry"
        );
        Ok(())
    }

    /// Stops the session at the caller's request and runs the exporters.
    ///
    /// Stopping an already stopped session does nothing.
    pub fn stop(&mut self) -> Result<(), DuetError> {
        if self.state == RunState::Stopped {
            return Ok(());
        }
        self.finish(StopReason::UserStop)
    }

    /// Drives [`advance`](Self::advance) until the session stops.
    ///
    /// Returns every report produced, or the first error.
    pub async fn run(&mut self) -> Result<Vec<TurnReport>, DuetError> {
        let mut reports = Vec::new();
        while self.state == RunState::Running {
            reports.push(self.advance().await?);
        }
        Ok(reports)
    }

    fn finish(&mut self, reason: StopReason) -> Result<(), DuetError> {
        // A pending review can no longer complete once stopped.
        self.pending_review = None;
        self.remaining = 0;
        self.state = RunState::Stopped;
        self.stop_reason = Some(reason);

        info!(
            target: "llm_duet::duet",
            reason = ?reason,
            transcript_len = self.transcript.len(),
            context_len = self.context_a.len(),
            event = "session_stopped"
        );

        self.export()
    }

    /// Runs every exporter once. All exporters are attempted; the first
    /// failure is returned.
    fn export(&mut self) -> Result<(), DuetError> {
        if self.export_attempted {
            return Ok(());
        }
        self.export_attempted = true;

        let view = ExportView {
            name: self.config.export_name(),
            transcript: &self.transcript,
            context_a: &self.context_a,
            context_b: &self.context_b,
            next: self.next,
        };

        let mut written = Vec::new();
        let mut first_error: Option<ExportError> = None;
        for exporter in &self.exporters {
            match exporter.export(&view) {
                Ok(path) => {
                    info!(
                        target: "llm_duet::export",
                        exporter = %exporter.name(),
                        path = %path.display(),
                        event = "export_written"
                    );
                    written.push(path);
                }
                Err(err) => {
                    error!(
                        target: "llm_duet::export",
                        exporter = %exporter.name(),
                        error = %err,
                        event = "export_failed"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        self.exported = written;
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
