//! # Observability
//!
//! Installs the tracing subscriber for the `llm-duet` runtime.
//!
//! Every component logs structured events under an `llm_duet::*` target with an
//! `event` field (`turn_started`, `turn_completed`, `turn_failed`,
//! `referee_veto`, `session_stopped`, ...), so a filter such as
//! `RUST_LOG=llm_duet::duet=debug` narrows output to the orchestrator.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum level captured for `llm_duet` targets.
    pub level: Level,
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Standard error, leaving standard output to the conversation itself.
    #[default]
    Console,
    /// A file, truncated on start.
    File(PathBuf),
}

/// Initializes the global tracing subscriber.
///
/// Call once at the beginning of `main`. Fails if a subscriber is already
/// installed or the log file cannot be created.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::from_default_env().add_directive(format!("llm_duet={}", config.level).parse()?);

    let subscriber = tracing_subscriber::registry().with(filter);

    match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            subscriber.with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            subscriber.with(layer).try_init()?;
        }
    };

    Ok(())
}
