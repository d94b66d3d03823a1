//! Selectable model identifiers with per-token pricing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strum::{Display, EnumString};
use tracing::debug;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelMode {
    #[default]
    Chat,
    Completion,
    Embedding,
    ImageGeneration,
    AudioTranscription,
    AudioSpeech,
    Moderation,
    Rerank,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokensPerDollar {
    pub input_tokens: f64,
    pub output_tokens: f64,
}

/// One catalog line: a model identifier and what its tokens cost in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPriceEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: ModelMode,
    #[serde(default)]
    pub input_cost_per_token: f64,
    #[serde(default)]
    pub output_cost_per_token: f64,
}

impl ModelPriceEntry {
    fn new(id: &str, mode: ModelMode, input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            id: id.to_string(),
            mode,
            input_cost_per_token: input_per_million / 1_000_000.0,
            output_cost_per_token: output_per_million / 1_000_000.0,
        }
    }

    pub fn is_chat(&self) -> bool {
        self.mode == ModelMode::Chat
    }

    /// `None` for free models, where the ratio is meaningless.
    pub fn tokens_per_dollar(&self) -> Option<TokensPerDollar> {
        (self.input_cost_per_token > 0.0 && self.output_cost_per_token > 0.0).then(|| {
            TokensPerDollar {
                input_tokens: 1.0 / self.input_cost_per_token,
                output_tokens: 1.0 / self.output_cost_per_token,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    entries: Vec<ModelPriceEntry>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        use ModelMode::{Chat, Embedding, ImageGeneration};
        Self {
            entries: vec![
                ModelPriceEntry::new("gpt-4o", Chat, 2.5, 10.0),
                ModelPriceEntry::new("gpt-4o-mini", Chat, 0.15, 0.6),
                ModelPriceEntry::new("gpt-4.1", Chat, 2.0, 8.0),
                ModelPriceEntry::new("gpt-4.1-mini", Chat, 0.4, 1.6),
                ModelPriceEntry::new("o3-mini", Chat, 1.1, 4.4),
                ModelPriceEntry::new("claude-3-5-sonnet-20241022", Chat, 3.0, 15.0),
                ModelPriceEntry::new("claude-3-5-haiku-20241022", Chat, 0.8, 4.0),
                ModelPriceEntry::new("claude-3-opus-20240229", Chat, 15.0, 75.0),
                ModelPriceEntry::new("claude-sonnet-4-20250514", Chat, 3.0, 15.0),
                ModelPriceEntry::new("gemini/gemini-2.0-flash", Chat, 0.1, 0.4),
                ModelPriceEntry::new("gemini/gemini-1.5-pro", Chat, 1.25, 5.0),
                ModelPriceEntry::new("groq/llama-3.1-8b-instant", Chat, 0.05, 0.08),
                ModelPriceEntry::new("mistral/mistral-large-latest", Chat, 2.0, 6.0),
                ModelPriceEntry::new("text-embedding-3-small", Embedding, 0.02, 0.0),
                ModelPriceEntry::new("text-embedding-3-large", Embedding, 0.13, 0.0),
                ModelPriceEntry::new("dall-e-3", ImageGeneration, 0.0, 0.0),
            ],
        }
    }

    /// Parses a LiteLLM-style pricing map (`{"<model>": {"mode": ..., ...}}`).
    ///
    /// Entries that do not describe a model (such as `sample_spec`) or lack a
    /// shape we understand are skipped. Ids are sorted for stable listings.
    pub fn from_litellm_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(json).context("pricing catalog is not a JSON object")?;
        let entries: Vec<ModelPriceEntry> = raw
            .into_iter()
            .filter(|(id, _)| id != "sample_spec")
            .filter_map(|(id, value)| {
                serde_json::from_value::<ModelPriceEntry>(value)
                    .map(|entry| ModelPriceEntry { id, ..entry })
                    .ok()
            })
            .collect();
        debug!(entries = entries.len(), "pricing catalog parsed");
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pricing catalog {}", path.display()))?;
        Self::from_litellm_json(&json)
            .with_context(|| format!("failed to parse pricing catalog {}", path.display()))
    }

    pub fn entries(&self) -> &[ModelPriceEntry] {
        &self.entries
    }

    /// Identifiers offered for selection.
    pub fn chat_models(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_chat())
            .map(|entry| entry.id.as_str())
            .collect()
    }

    pub fn lookup(&self, model: &str) -> Option<&ModelPriceEntry> {
        self.entries.iter().find(|entry| entry.id == model)
    }
}
