//! OpenAIGateway - Chat Completions REST client for OpenAI and Azure OpenAI.
//!
//! Two endpoint shapes are supported:
//!
//! - **OpenAI**: `https://api.openai.com/v1/chat/completions`, bearer token,
//!   model id in the body.
//! - **Azure**: `<endpoint>/openai/deployments/<deployment>/chat/completions?api-version=<v>`,
//!   `api-key` header, deployment in the URL.
//!
//! # Example
//!
//! ```rust,no_run
//! use llm_duet::gateway::OpenAIGateway;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // From environment variable (OPENAI_API_KEY)
//! let gateway = OpenAIGateway::try_from_env()?;
//!
//! // Azure deployment
//! let gateway = OpenAIGateway::azure("key", "https://my.openai.azure.com", "2024-06-01")
//!     .with_timeout(Duration::from_secs(60))?;
//! # Ok(())
//! # }
//! ```

use super::{CompletionGateway, CompletionRequest};
use crate::config::ProviderConfig;
use crate::error::GatewayError;
use crate::message::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Default request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    OpenAI,
    Azure {
        endpoint: String,
        api_version: String,
    },
}

/// Gateway implementation that talks to a Chat Completions HTTP API.
#[derive(Clone)]
pub struct OpenAIGateway {
    client: Client,
    api_key: String,
    endpoint: Endpoint,
    timeout: Duration,
}

impl OpenAIGateway {
    /// Creates a gateway for the public OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::build(api_key.into(), Endpoint::OpenAI)
    }

    /// Creates a gateway for an Azure OpenAI resource.
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self::build(
            api_key.into(),
            Endpoint::Azure {
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                api_version: api_version.into(),
            },
        )
    }

    fn build(api_key: String, endpoint: Endpoint) -> Self {
        Self {
            client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OPENAI_API_KEY` (required)
    pub fn try_from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            GatewayError::NotConfigured("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::openai(api_key))
    }

    /// Builds a gateway from the provider catalog.
    ///
    /// An `endpoint` selects Azure mode. The key comes from the catalog or,
    /// failing that, from `AZURE_OPENAI_API_KEY` (Azure) / `OPENAI_API_KEY`.
    pub fn from_provider(config: &ProviderConfig) -> Result<Self, GatewayError> {
        let configured_key = config.key.clone().filter(|k| !k.trim().is_empty());

        match config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => {
                let api_key = configured_key
                    .or_else(|| env::var("AZURE_OPENAI_API_KEY").ok())
                    .ok_or_else(|| {
                        GatewayError::NotConfigured(
                            "no API key in provider config or AZURE_OPENAI_API_KEY".to_string(),
                        )
                    })?;
                let api_version = config
                    .api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
                Ok(Self::azure(api_key, endpoint, api_version))
            }
            None => {
                let api_key = configured_key
                    .or_else(|| env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| {
                        GatewayError::NotConfigured(
                            "no API key in provider config or OPENAI_API_KEY".to_string(),
                        )
                    })?;
                Ok(Self::openai(api_key))
            }
        }
    }

    /// Replaces the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GatewayError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::NotConfigured(format!("HTTP client: {err}")))?;
        self.timeout = timeout;
        Ok(self)
    }

    fn url_for(&self, model: &str) -> String {
        match &self.endpoint {
            Endpoint::OpenAI => OPENAI_URL.to_string(),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
        }
    }

    async fn send_request(&self, url: &str, body: &ChatCompletionRequest<'_>) -> Result<String, GatewayError> {
        let builder = self.client.post(url).json(body);
        let builder = match self.endpoint {
            Endpoint::OpenAI => builder.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Transport(err.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Decode(err.to_string())
            }
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CompletionGateway for OpenAIGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let url = self.url_for(&request.model);
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_completion_tokens: request.max_output_tokens,
            seed: request.seed,
        };

        debug!(
            target: "llm_duet::gateway",
            model = %request.model,
            messages = request.messages.len(),
            seed = ?request.seed,
            event = "completion_request"
        );

        self.send_request(&url, &body).await
    }

    fn name(&self) -> String {
        match self.endpoint {
            Endpoint::OpenAI => "OpenAIGateway".to_string(),
            Endpoint::Azure { .. } => "AzureOpenAIGateway".to_string(),
        }
    }

    async fn is_available(&self) -> Result<(), GatewayError> {
        if self.api_key.trim().is_empty() {
            return Err(GatewayError::NotConfigured("API key is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, GatewayError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(GatewayError::EmptyResponse)
}

fn map_http_error(status: StatusCode, body: String) -> GatewayError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    GatewayError::Http {
        status: status.as_u16(),
        message,
        retryable,
    }
}
