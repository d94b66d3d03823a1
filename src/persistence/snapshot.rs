use super::traits::{EVALUATION_KEY, KeyValueStore};
use crate::error::StorageError;
use crate::harness::types::{HarnessState, ModelConfig, TestCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Persisted form of [`HarnessState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSnapshot {
    #[serde(default)]
    pub selected_models: Vec<String>,
    #[serde(default)]
    pub model_configs: BTreeMap<String, ModelConfig>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl From<&HarnessState> for EvaluationSnapshot {
    fn from(state: &HarnessState) -> Self {
        Self {
            selected_models: state.selected_models.as_ref().clone(),
            model_configs: state.model_configs.as_ref().clone(),
            test_cases: state
                .test_cases
                .iter()
                .map(|case| TestCase {
                    loading: false,
                    active_run: None,
                    ..case.clone()
                })
                .collect(),
        }
    }
}

impl EvaluationSnapshot {
    pub fn into_state(self) -> HarnessState {
        let test_cases = self
            .test_cases
            .into_iter()
            .map(|case| TestCase {
                loading: false,
                active_run: None,
                ..case
            })
            .collect();
        HarnessState::new(self.selected_models, self.model_configs, test_cases)
    }
}

/// Saves and restores the evaluation snapshot under [`EVALUATION_KEY`].
#[derive(Clone)]
pub struct EvaluationPersistence {
    storage: Arc<dyn KeyValueStore>,
}

impl EvaluationPersistence {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Restores the last snapshot. Missing data yields the default state with
    /// one empty test case; unreadable or corrupt data is logged and replaced
    /// by the default too.
    pub fn restore(&self) -> HarnessState {
        let raw = match self.storage.get(EVALUATION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HarnessState::default(),
            Err(error) => {
                warn!(backend = self.storage.name(), %error, "evaluation snapshot unreadable; starting fresh");
                return HarnessState::default();
            }
        };

        match serde_json::from_str::<EvaluationSnapshot>(&raw) {
            Ok(snapshot) => {
                debug!(
                    test_cases = snapshot.test_cases.len(),
                    models = snapshot.selected_models.len(),
                    "evaluation snapshot restored"
                );
                snapshot.into_state()
            }
            Err(error) => {
                warn!(%error, "evaluation snapshot is corrupt; starting fresh");
                HarnessState::default()
            }
        }
    }

    /// Writes the full state with every `loading` flag forced to `false`.
    pub fn save(&self, state: &HarnessState) -> Result<(), StorageError> {
        let snapshot = EvaluationSnapshot::from(state);
        let json = serde_json::to_string(&snapshot)?;
        self.storage.set(EVALUATION_KEY, &json)
    }

    pub fn reset(&self) -> Result<(), StorageError> {
        self.storage.remove(EVALUATION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::types::{ResponseMetrics, UsageMetrics, ViewMode};
    use crate::persistence::file::InMemoryStore;

    fn persistence() -> (Arc<InMemoryStore>, EvaluationPersistence) {
        let storage = Arc::new(InMemoryStore::new());
        let persistence = EvaluationPersistence::new(storage.clone());
        (storage, persistence)
    }

    #[test]
    fn absent_snapshot_restores_default_state() {
        let (_, persistence) = persistence();
        let state = persistence.restore();
        assert_eq!(state.test_cases.len(), 1);
        assert!(state.selected_models.is_empty());
    }

    #[test]
    fn loading_is_never_persisted() {
        let (storage, persistence) = persistence();
        let mut case = TestCase::new("T1");
        case.loading = true;
        let state = HarnessState::new(vec!["a".into()], BTreeMap::new(), vec![case]);

        persistence.save(&state).unwrap();

        let raw = storage.get(EVALUATION_KEY).unwrap().unwrap();
        assert!(raw.contains("\"loading\":false"));
        assert!(!raw.contains("\"loading\":true"));
        assert!(state.test_cases[0].loading);
    }

    #[test]
    fn snapshot_round_trips_view_mode_configs_and_grading() {
        let (_, persistence) = persistence();
        let mut case = TestCase::new("T1");
        case.prompt = "hello".into();
        let mut response = ResponseMetrics::completed("a", "hi", UsageMetrics::default());
        response.passed = Some(true);
        case.responses.insert("a".into(), response);
        case.view_mode.insert("a".into(), ViewMode::Raw);
        let configs = BTreeMap::from([(
            "a".to_string(),
            ModelConfig {
                temperature: 1.3,
                top_p: 0.9,
            },
        )]);
        let state = HarnessState::new(vec!["a".into()], configs, vec![case]);

        persistence.save(&state).unwrap();
        let restored = persistence.restore();

        assert_eq!(restored.selected_models, state.selected_models);
        assert_eq!(restored.model_configs, state.model_configs);
        assert_eq!(restored.test_cases, state.test_cases);
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_default() {
        let (storage, persistence) = persistence();
        storage.set(EVALUATION_KEY, "{not json").unwrap();
        let state = persistence.restore();
        assert_eq!(state.test_cases.len(), 1);
        assert_eq!(state.test_cases[0].name, "Test Case 1");
    }

    #[test]
    fn reset_removes_only_the_evaluation_key() {
        let (storage, persistence) = persistence();
        persistence.save(&HarnessState::default()).unwrap();
        storage.set("langmetres.env_vars", "A=1").unwrap();

        persistence.reset().unwrap();

        assert!(!storage.contains(EVALUATION_KEY));
        assert!(storage.contains("langmetres.env_vars"));
    }
}
