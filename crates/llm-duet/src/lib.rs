//! 'llm-duet' - Relay a turn-taking conversation between two LLM agents.
//!
//! Two independently configured agents, A and B, take turns: each reply is
//! recorded as `assistant` in the speaker's context and as `user` in the
//! listener's, so every agent sees the other as its interlocutor. An optional
//! referee asks a judging model after every exchange whether the conversation
//! is still on topic, and can end the run early.
//!
//! # Building blocks
//!
//! - [`duet::Duet`]: the turn state machine (`start`, `advance`, `retry`, `stop`, `run`)
//! - [`context::AgentContext`]: one agent's rolling message history
//! - [`transcript::Transcript`]: the append-only display log used for export
//! - [`referee::Referee`]: the yes/no continuation check
//! - [`gateway::CompletionGateway`]: the model boundary, with an
//!   OpenAI/Azure implementation in [`gateway::OpenAIGateway`]
//! - [`persistence`]: resume files and presets
//! - [`export`]: PDF and session JSON artifacts written on stop
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_duet::{Duet, DuetConfig, OutputLayout, ParticipantConfig, Side};
//! use llm_duet::export::{PdfExporter, SessionJsonExporter};
//! use llm_duet::gateway::OpenAIGateway;
//!
//! let config = DuetConfig {
//!     a: ParticipantConfig::new(Side::A, "Ada", "gpt-4o", "You defend tabs."),
//!     b: ParticipantConfig::new(Side::B, "Linus", "gpt-4o", "You defend spaces."),
//!     turns: 6,
//!     referee: true,
//!     file_name: "indentation".into(),
//! };
//!
//! let layout = OutputLayout::default();
//! let mut duet = Duet::new(config, OpenAIGateway::try_from_env()?)?
//!     .with_exporter(PdfExporter::new(layout.clone()))
//!     .with_exporter(SessionJsonExporter::new(layout));
//! duet.start(6)?;
//! duet.run().await?;
//! ```

pub mod config;
pub mod context;
pub mod duet;
pub mod error;
pub mod export;
pub mod gateway;
pub mod message;
pub mod observability;
pub mod persistence;
pub mod prompt;
pub mod referee;
pub mod transcript;

#[doc(hidden)]
pub use minijinja;

pub use config::{DuetConfig, GenerationParams, HexColor, OutputLayout, ParticipantConfig, ProviderConfig};
pub use context::{AgentContext, Side};
pub use duet::{Duet, RunState, StopReason, TurnReport};
pub use error::{ConfigError, DuetError, ExportError, GatewayError, PersistenceError};
pub use gateway::{CompletionGateway, CompletionRequest};
pub use message::{ChatMessage, Role, TranscriptEntry};
pub use persistence::{Preset, SessionFile};
pub use referee::{Referee, Verdict, VerdictRule, substring_no_veto};
pub use transcript::Transcript;
