pub mod http;
pub mod scrub;

use crate::error::CompletionError;
use crate::harness::types::{ModelConfig, ResponseMetrics};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::{EnvUpdateAck, HealthStatus, HttpCompletionClient, build_backend_client};
pub use scrub::{sanitize_error_body, scrub_secret_patterns};

/// One (model, prompt, config) triple sent to the completion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            model: model.into(),
            user_prompt: prompt.into(),
            temperature: config.temperature,
            top_p: config.top_p,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }
}

/// Remote completion contract.
///
/// Implementations resolve to normalized metrics or a typed failure; they
/// never retry, and any timeout is their own business.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ResponseMetrics, CompletionError>;
}
