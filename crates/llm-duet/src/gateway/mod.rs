//! Completion gateway abstraction.
//!
//! A gateway turns an ordered list of protocol messages into one reply. The
//! orchestrator depends only on this trait; the HTTP details live in the
//! implementations under this module.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_duet::gateway::{CompletionGateway, CompletionRequest, OpenAIGateway};
//! use llm_duet::message::ChatMessage;
//!
//! let gateway = OpenAIGateway::try_from_env()?;
//! let reply = gateway
//!     .complete(CompletionRequest::new(
//!         vec![ChatMessage::system("Be terse."), ChatMessage::user("Hello")],
//!         "gpt-4o",
//!         256,
//!     ))
//!     .await?;
//! ```

#[cfg(feature = "openai-api")]
pub mod openai_api;

#[cfg(feature = "openai-api")]
pub use openai_api::OpenAIGateway;

use crate::error::GatewayError;
use crate::message::ChatMessage;
use async_trait::async_trait;

/// One completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Model identity (deployment name on Azure, model id on OpenAI).
    pub model: String,
    /// Sampling seed; `None` leaves the choice to the provider.
    pub seed: Option<u64>,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            messages,
            model: model.into(),
            seed: None,
            max_output_tokens,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// The text-generation service boundary.
///
/// Implementations own their own timeouts; a request that never answers must
/// surface as an error rather than hang the session.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Sends the request and returns the reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;

    /// Returns the name of this gateway.
    ///
    /// By default, this returns the type name.
    fn name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("UnknownGateway")
            .to_string()
    }

    /// Checks that credentials and endpoint settings are present.
    async fn is_available(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[async_trait]
impl<T: CompletionGateway + ?Sized> CompletionGateway for std::sync::Arc<T> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        (**self).complete(request).await
    }

    fn name(&self) -> String {
        (**self).name()
    }

    async fn is_available(&self) -> Result<(), GatewayError> {
        (**self).is_available().await
    }
}
