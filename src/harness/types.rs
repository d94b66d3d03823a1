use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{Display, EnumString};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Prefix of the display content of a failed model call.
pub const ERROR_MARKER: &str = "Error: ";

const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
const TOP_P_RANGE: (f64, f64) = (0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// A single field edit of a [`ModelConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelConfigField {
    Temperature(f64),
    TopP(f64),
}

impl ModelConfigField {
    pub fn validate(self) -> Result<Self, StoreError> {
        let (field, (min, max), value) = match self {
            Self::Temperature(value) => ("temperature", TEMPERATURE_RANGE, value),
            Self::TopP(value) => ("top_p", TOP_P_RANGE, value),
        };
        if value.is_finite() && (min..=max).contains(&value) {
            Ok(self)
        } else {
            Err(StoreError::ConfigOutOfRange {
                field,
                min,
                max,
                value,
            })
        }
    }

    pub fn apply_to(self, config: ModelConfig) -> ModelConfig {
        match self {
            Self::Temperature(temperature) => ModelConfig {
                temperature,
                ..config
            },
            Self::TopP(top_p) => ModelConfig { top_p, ..config },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    /// Wall-clock seconds.
    pub latency: f64,
}

impl UsageMetrics {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// One model's answer to one test case.
///
/// `passed` is grading state set by the operator and never computed. A failed
/// call keeps its message in `error`; `response_content` then carries the
/// rendered `"Error: <message>"` form so every consumer of the content column
/// (terminal, spreadsheet) shows it without special casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    pub response_content: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    pub usage: UsageMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseMetrics {
    pub fn completed(model_name: impl Into<String>, content: impl Into<String>, usage: UsageMetrics) -> Self {
        Self {
            response_content: content.into(),
            model_name: model_name.into(),
            passed: None,
            usage,
            error: None,
        }
    }

    pub fn failed(model_name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            response_content: format!("{ERROR_MARKER}{message}"),
            model_name: model_name.into(),
            passed: None,
            usage: UsageMetrics::default(),
            error: Some(message),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_passed(&self) -> bool {
        self.passed.unwrap_or(false)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Markdown,
    Raw,
}

impl ViewMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Markdown => Self::Raw,
            Self::Raw => Self::Markdown,
        }
    }
}

/// Token of one in-flight run, stamped on its test case by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseMetrics>,
    /// Transient; never persisted as `true`.
    #[serde(default)]
    pub loading: bool,
    /// Run that set `loading`; follows the test case when positions shift.
    #[serde(skip)]
    pub active_run: Option<RunId>,
    #[serde(default)]
    pub view_mode: BTreeMap<String, ViewMode>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: String::new(),
            responses: BTreeMap::new(),
            loading: false,
            active_run: None,
            view_mode: BTreeMap::new(),
        }
    }

    /// Display name assigned to the test case appended after `existing` others.
    pub fn default_name(existing: usize) -> String {
        format!("Test Case {}", existing + 1)
    }

    pub fn view_mode_for(&self, model: &str) -> ViewMode {
        self.view_mode.get(model).copied().unwrap_or_default()
    }
}

/// Full harness state.
///
/// Each collection sits behind its own `Arc`; a mutation replaces only the
/// collections it touches, so observers can detect structural change with
/// `Arc::ptr_eq`.
#[derive(Debug, Clone)]
pub struct HarnessState {
    pub selected_models: Arc<Vec<String>>,
    pub model_configs: Arc<BTreeMap<String, ModelConfig>>,
    pub test_cases: Arc<Vec<TestCase>>,
}

impl Default for HarnessState {
    fn default() -> Self {
        Self {
            selected_models: Arc::new(Vec::new()),
            model_configs: Arc::new(BTreeMap::new()),
            test_cases: Arc::new(vec![TestCase::new(TestCase::default_name(0))]),
        }
    }
}

impl HarnessState {
    pub fn new(
        selected_models: Vec<String>,
        model_configs: BTreeMap<String, ModelConfig>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        let test_cases = if test_cases.is_empty() {
            vec![TestCase::new(TestCase::default_name(0))]
        } else {
            test_cases
        };
        Self {
            selected_models: Arc::new(selected_models),
            model_configs: Arc::new(model_configs),
            test_cases: Arc::new(test_cases),
        }
    }

    pub fn config_for(&self, model: &str) -> ModelConfig {
        self.model_configs.get(model).copied().unwrap_or_default()
    }

    pub fn is_selected(&self, model: &str) -> bool {
        self.selected_models.iter().any(|selected| selected == model)
    }

    pub fn test_case(&self, index: usize) -> Option<&TestCase> {
        self.test_cases.get(index)
    }
}
