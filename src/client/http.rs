use super::scrub::sanitize_error_body;
use super::{CompletionClient, CompletionRequest};
use crate::config::Config;
use crate::error::{CompletionError, EnvUpdateError};
use crate::harness::types::{ResponseMetrics, UsageMetrics};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub fn build_backend_client(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    #[serde(default)]
    cost: f64,
    #[serde(default)]
    latency: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    response_content: Option<String>,
    model_name: Option<String>,
    usage: UsagePayload,
}

/// The backend wraps the payload as `{status, response}`; bare payloads are
/// accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletionEnvelope {
    Wrapped { response: ResponsePayload },
    Bare(ResponsePayload),
}

impl CompletionEnvelope {
    fn into_metrics(self, requested_model: &str, measured: Duration) -> ResponseMetrics {
        let payload = match self {
            Self::Wrapped { response } | Self::Bare(response) => response,
        };
        let usage = UsageMetrics {
            prompt_tokens: payload.usage.prompt_tokens,
            completion_tokens: payload.usage.completion_tokens,
            total_tokens: payload.usage.total_tokens,
            cost: payload.usage.cost.max(0.0),
            latency: payload
                .usage
                .latency
                .unwrap_or_else(|| measured.as_secs_f64())
                .max(0.0),
        };
        ResponseMetrics::completed(
            payload
                .model_name
                .unwrap_or_else(|| requested_model.to_string()),
            payload.response_content.unwrap_or_default(),
            usage,
        )
    }
}

#[derive(Debug, Serialize)]
struct EnvVarsRequest<'a> {
    variables: &'a BTreeMap<String, String>,
}

/// Acknowledgement of an environment update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvUpdateAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub updated_vars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// reqwest client for the completion backend (`/completions`, `/envs`, `/health`).
pub struct HttpCompletionClient {
    base_url: String,
    system_prompt: Option<String>,
    client: Client,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, build_backend_client(120, 10))
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            system_prompt: None,
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client =
            build_backend_client(config.request_timeout_secs, config.connect_timeout_secs);
        Self::with_client(&config.backend_url, client).with_system_prompt(config.system_prompt.clone())
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|prompt| !prompt.trim().is_empty());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Pushes parsed `KEY=VALUE` pairs to the backend. Values are never logged.
    pub async fn update_environment(
        &self,
        variables: &BTreeMap<String, String>,
    ) -> Result<EnvUpdateAck, EnvUpdateError> {
        if variables.is_empty() {
            return Err(EnvUpdateError::Empty);
        }
        let names: Vec<&str> = variables.keys().map(String::as_str).collect();
        info!(?names, "pushing environment variables");

        let response = self
            .client
            .post(self.url("envs"))
            .json(&EnvVarsRequest { variables })
            .send()
            .await
            .map_err(|error| EnvUpdateError::Transport(sanitize_error_body(&error.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvUpdateError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        response
            .json::<EnvUpdateAck>()
            .await
            .map_err(|error| EnvUpdateError::Decode(error.to_string()))
    }

    pub async fn health(&self) -> anyhow::Result<HealthStatus> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<ResponseMetrics, CompletionError> {
        let model = request.model.as_str();
        let body = match (&request.system_prompt, &self.system_prompt) {
            (None, Some(default_prompt)) => request
                .clone()
                .with_system_prompt(Some(default_prompt.clone())),
            _ => request.clone(),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.url("completions"))
            .json(&body)
            .send()
            .await
            .map_err(|error| CompletionError::Transport {
                model: model.to_string(),
                message: sanitize_error_body(&error.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        let envelope: CompletionEnvelope =
            response
                .json()
                .await
                .map_err(|error| CompletionError::Decode {
                    model: model.to_string(),
                    message: error.to_string(),
                })?;
        let elapsed = started.elapsed();
        debug!(model, elapsed_ms = elapsed.as_millis(), "completion received");
        Ok(envelope.into_metrics(model, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_payload_decodes_and_keeps_backend_latency() {
        let json = r#"{"status":"success","response":{"response_content":"hi","model_name":"gpt-4o","usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3,"cost":0.5,"latency":1.25}}}"#;
        let envelope: CompletionEnvelope = serde_json::from_str(json).unwrap();
        let metrics = envelope.into_metrics("gpt-4o", Duration::from_secs(9));
        assert_eq!(metrics.response_content, "hi");
        assert_eq!(metrics.usage.total_tokens, 3);
        assert!((metrics.usage.latency - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn bare_payload_falls_back_to_measured_latency_and_requested_model() {
        let json = r#"{"response_content":null,"usage":{"prompt_tokens":1,"completion_tokens":0,"total_tokens":1,"cost":0.0}}"#;
        let envelope: CompletionEnvelope = serde_json::from_str(json).unwrap();
        let metrics = envelope.into_metrics("claude-3-5-haiku", Duration::from_millis(1500));
        assert_eq!(metrics.model_name, "claude-3-5-haiku");
        assert_eq!(metrics.response_content, "");
        assert!((metrics.usage.latency - 1.5).abs() < 1e-9);
        assert!(metrics.error.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpCompletionClient::new("http://localhost:8000/");
        assert_eq!(client.url("health"), "http://localhost:8000/health");
    }

    #[test]
    fn blank_system_prompt_is_ignored() {
        let client = HttpCompletionClient::new("http://localhost:8000")
            .with_system_prompt(Some("   ".into()));
        assert!(client.system_prompt.is_none());
    }
}
