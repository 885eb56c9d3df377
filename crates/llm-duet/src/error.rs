//! Error types for the duet runtime.
//!
//! Each subsystem has its own enum so callers can tell a configuration
//! mistake (fix the preset) from a gateway failure (the session is blocked)
//! or a persistence failure (nothing was committed).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating configuration, before any run starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The provider catalog contains no usable model entries.
    #[error("No models are configured. Check the provider catalog at {0}")]
    NoModels(PathBuf),

    /// A deployment was requested that the catalog does not list.
    #[error("Unknown deployment '{0}'")]
    UnknownDeployment(String),

    /// The turn budget is zero or not a positive integer.
    #[error("Turn count must be a positive integer, got '{0}'")]
    InvalidTurns(String),

    /// No turn budget was supplied by the preset or by the caller.
    #[error("Turn count is missing; supply a positive integer")]
    MissingTurns,

    /// A participant has an empty system prompt.
    #[error("System prompt for {0} is empty")]
    EmptySystemPrompt(String),

    /// A colour is not in `#RGB` or `#RRGGBB` form.
    #[error("Invalid color '{0}': expected #RGB or #RRGGBB")]
    InvalidColor(String),
}

/// Errors returned by a [`CompletionGateway`](crate::gateway::CompletionGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials or endpoint settings are missing.
    #[error("Gateway is not configured: {0}")]
    NotConfigured(String),

    /// The request never produced an HTTP response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request did not finish within the gateway's deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },

    /// The provider answered successfully but returned no text.
    #[error("Gateway returned no content")]
    EmptyResponse,

    /// The provider response body could not be decoded.
    #[error("Failed to decode gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether the same request may succeed if the caller chooses to retry.
    ///
    /// The orchestrator never retries by itself; this only informs the caller
    /// deciding whether to call [`Duet::retry`](crate::duet::Duet::retry).
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout(_) => true,
            GatewayError::Http { retryable, .. } => *retryable,
            GatewayError::NotConfigured(_)
            | GatewayError::EmptyResponse
            | GatewayError::Decode(_) => false,
        }
    }
}

/// Errors while reading or writing session and preset files.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but its contents break the format's rules.
    #[error("Invalid contents in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Errors while producing export artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode PDF: {0}")]
    Pdf(String),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Umbrella error for orchestrator operations.
#[derive(Debug, Error)]
pub enum DuetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Failed to render prompt: {0}")]
    Prompt(#[from] minijinja::Error),

    /// An operation was requested in a state that does not allow it.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}
