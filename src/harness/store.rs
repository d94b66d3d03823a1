use super::types::{
    HarnessState, ModelConfig, ModelConfigField, ResponseMetrics, RunId, TestCase, ViewMode,
};
use crate::error::{CompletionError, RunError, StoreError};
use arc_swap::{ArcSwap, Guard};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Outcome of a pure state transition.
enum Update<T> {
    Publish(HarnessState, T),
    Unchanged(T),
}

/// Everything a run needs, captured atomically with the `loading` flip.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run: RunId,
    pub index: usize,
    pub prompt: String,
    pub models: Vec<(String, ModelConfig)>,
}

/// Single source of truth for the harness.
///
/// Readers take immutable snapshots. Writers apply a pure transition to the
/// current snapshot and publish the result with a compare-and-swap, retrying
/// when another writer got there first; every published snapshot is also
/// broadcast on a `watch` channel for observers such as autosave.
pub struct HarnessStore {
    current: ArcSwap<HarnessState>,
    changes: watch::Sender<Arc<HarnessState>>,
    next_run: AtomicU64,
}

impl Default for HarnessStore {
    fn default() -> Self {
        Self::new(HarnessState::default())
    }
}

impl HarnessStore {
    pub fn new(initial: HarnessState) -> Self {
        let initial = Arc::new(initial);
        let (changes, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: ArcSwap::new(initial),
            changes,
            next_run: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<HarnessState> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<HarnessState>> {
        self.changes.subscribe()
    }

    fn apply<T, E, F>(&self, op: &'static str, transition: F) -> Result<T, E>
    where
        F: Fn(&HarnessState) -> Result<Update<T>, E>,
    {
        let mut current = self.current.load_full();
        loop {
            let (next, value) = match transition(&current)? {
                Update::Unchanged(value) => return Ok(value),
                Update::Publish(next, value) => (Arc::new(next), value),
            };

            let previous = self.current.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&*previous, &current) {
                debug!(op, "harness state published");
                self.changes.send_replace(self.current.load_full());
                return Ok(value);
            }
            current = Guard::into_inner(previous);
        }
    }

    // ── Models ──────────────────────────────────────────────────────────

    /// Appends `model` to the selection. Returns `false` when already selected.
    pub fn select_model(&self, model: &str) -> Result<bool, StoreError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(StoreError::EmptyModelId);
        }
        self.apply("select_model", |state| {
            if state.is_selected(model) {
                return Ok(Update::Unchanged(false));
            }
            let mut selected = state.selected_models.as_ref().clone();
            selected.push(model.to_string());
            Ok(Update::Publish(
                HarnessState {
                    selected_models: Arc::new(selected),
                    ..state.clone()
                },
                true,
            ))
        })
    }

    /// Deselects `model`, dropping its config and its response in every test
    /// case. Idempotent; returns whether anything changed.
    pub fn remove_model(&self, model: &str) -> bool {
        let Ok(changed) = self.apply::<_, Infallible, _>("remove_model", |state| {
            let selected = state.is_selected(model);
            let configured = state.model_configs.contains_key(model);
            let answered = state
                .test_cases
                .iter()
                .any(|case| case.responses.contains_key(model) || case.view_mode.contains_key(model));
            if !selected && !configured && !answered {
                return Ok(Update::Unchanged(false));
            }

            let mut next = state.clone();
            if selected {
                next.selected_models = Arc::new(
                    state
                        .selected_models
                        .iter()
                        .filter(|candidate| *candidate != model)
                        .cloned()
                        .collect(),
                );
            }
            if configured {
                let mut configs = state.model_configs.as_ref().clone();
                configs.remove(model);
                next.model_configs = Arc::new(configs);
            }
            if answered {
                let cases = state
                    .test_cases
                    .iter()
                    .map(|case| {
                        let mut case = case.clone();
                        case.responses.remove(model);
                        case.view_mode.remove(model);
                        case
                    })
                    .collect();
                next.test_cases = Arc::new(cases);
            }
            Ok(Update::Publish(next, true))
        });
        changed
    }

    pub fn set_model_config(
        &self,
        model: &str,
        field: ModelConfigField,
    ) -> Result<ModelConfig, StoreError> {
        let field = field.validate()?;
        self.apply("set_model_config", |state| {
            if !state.is_selected(model) {
                return Err(StoreError::ModelNotSelected(model.to_string()));
            }
            let updated = field.apply_to(state.config_for(model));
            let mut configs = state.model_configs.as_ref().clone();
            configs.insert(model.to_string(), updated);
            Ok(Update::Publish(
                HarnessState {
                    model_configs: Arc::new(configs),
                    ..state.clone()
                },
                updated,
            ))
        })
    }

    // ── Test cases ──────────────────────────────────────────────────────

    /// Appends an empty test case named `"Test Case {n+1}"` and returns its index.
    pub fn add_test_case(&self) -> usize {
        let Ok(index) = self.apply::<_, Infallible, _>("add_test_case", |state| {
            let index = state.test_cases.len();
            let mut cases = state.test_cases.as_ref().clone();
            cases.push(TestCase::new(TestCase::default_name(index)));
            Ok(Update::Publish(
                HarnessState {
                    test_cases: Arc::new(cases),
                    ..state.clone()
                },
                index,
            ))
        });
        index
    }

    /// Removes a test case. Deleting the last remaining one is a no-op that
    /// returns `Ok(false)`.
    pub fn delete_test_case(&self, index: usize) -> Result<bool, StoreError> {
        self.apply("delete_test_case", |state| {
            let len = state.test_cases.len();
            if index >= len {
                return Err(StoreError::TestCaseOutOfRange { index, len });
            }
            if len <= 1 {
                return Ok(Update::Unchanged(false));
            }
            let mut cases = state.test_cases.as_ref().clone();
            cases.remove(index);
            Ok(Update::Publish(
                HarnessState {
                    test_cases: Arc::new(cases),
                    ..state.clone()
                },
                true,
            ))
        })
    }

    pub fn rename_test_case(&self, index: usize, name: &str) -> Result<(), StoreError> {
        self.edit_test_case("rename_test_case", index, |case| {
            case.name = name.to_string();
        })
    }

    pub fn set_prompt(&self, index: usize, prompt: &str) -> Result<(), StoreError> {
        self.edit_test_case("set_prompt", index, |case| {
            case.prompt = prompt.to_string();
        })
    }

    /// Adds or overwrites the response of `model` in one test case.
    pub fn attach_response(
        &self,
        index: usize,
        model: &str,
        response: ResponseMetrics,
    ) -> Result<(), StoreError> {
        self.edit_test_case("attach_response", index, |case| {
            case.responses.insert(model.to_string(), response.clone());
        })
    }

    /// Merges one model's completion outcome into the test case carrying
    /// `run`, wherever it sits now, flattening failures into a synthetic
    /// error entry. Returns the test case's current index.
    pub fn attach_outcome(
        &self,
        run: RunId,
        model: &str,
        outcome: &Result<ResponseMetrics, CompletionError>,
    ) -> Result<usize, StoreError> {
        let response = match outcome {
            Ok(response) => response.clone(),
            Err(error) => ResponseMetrics::failed(model, error.to_string()),
        };
        self.apply("attach_outcome", |state| {
            let index = position_of_run(state, run).ok_or(StoreError::RunTargetGone(run.0))?;
            let next = with_test_case(state, index, |case| {
                case.responses.insert(model.to_string(), response.clone());
            })?;
            Ok(Update::Publish(next, index))
        })
    }

    pub fn toggle_view_mode(&self, index: usize, model: &str) -> Result<ViewMode, StoreError> {
        self.apply("toggle_view_mode", |state| {
            let next_mode = state
                .test_case(index)
                .ok_or(StoreError::TestCaseOutOfRange {
                    index,
                    len: state.test_cases.len(),
                })?
                .view_mode_for(model)
                .toggled();
            let next = with_test_case(state, index, |case| {
                case.view_mode.insert(model.to_string(), next_mode);
            })?;
            Ok(Update::Publish(next, next_mode))
        })
    }

    pub fn set_passed(&self, index: usize, model: &str, passed: bool) -> Result<(), StoreError> {
        self.apply("set_passed", |state| {
            let case = state.test_case(index).ok_or(StoreError::TestCaseOutOfRange {
                index,
                len: state.test_cases.len(),
            })?;
            if !case.responses.contains_key(model) {
                return Err(StoreError::NoResponse(model.to_string()));
            }
            let next = with_test_case(state, index, |case| {
                if let Some(response) = case.responses.get_mut(model) {
                    response.passed = Some(passed);
                }
            })?;
            Ok(Update::Publish(next, ()))
        })
    }

    // ── Whole-state operations ──────────────────────────────────────────

    /// Swaps in the selection and test cases produced by a spreadsheet import.
    /// Model configs are kept.
    pub fn replace_evaluation(&self, selected_models: Vec<String>, test_cases: Vec<TestCase>) {
        let Ok(()) = self.apply::<_, Infallible, _>("replace_evaluation", |state| {
            let replaced = HarnessState::new(
                selected_models.clone(),
                BTreeMap::new(),
                test_cases.clone(),
            );
            Ok(Update::Publish(
                HarnessState {
                    model_configs: Arc::clone(&state.model_configs),
                    ..replaced
                },
                (),
            ))
        });
    }

    pub fn reset(&self) {
        let Ok(()) = self.apply::<_, Infallible, _>("reset", |_| {
            Ok(Update::Publish(HarnessState::default(), ()))
        });
    }

    // ── Run lifecycle ───────────────────────────────────────────────────

    /// Validates a run and marks the test case `loading` in one transition.
    /// The returned plan's `run` token identifies the test case from then on.
    pub fn begin_run(&self, index: usize) -> Result<RunPlan, RunError> {
        let run = RunId(self.next_run.fetch_add(1, Ordering::Relaxed));
        self.apply("begin_run", |state| {
            let len = state.test_cases.len();
            let case = state
                .test_case(index)
                .ok_or(RunError::TestCaseNotFound { index, len })?;
            if state.selected_models.is_empty() {
                return Err(RunError::NoModelsSelected);
            }
            if case.loading {
                return Err(RunError::AlreadyRunning(index));
            }

            let plan = RunPlan {
                run,
                index,
                prompt: case.prompt.clone(),
                models: state
                    .selected_models
                    .iter()
                    .map(|model| (model.clone(), state.config_for(model)))
                    .collect(),
            };
            let next = with_test_case(state, index, |case| {
                case.loading = true;
                case.active_run = Some(run);
            })
                .map_err(|_| RunError::TestCaseNotFound { index, len })?;
            Ok(Update::Publish(next, plan))
        })
    }

    /// Clears `loading` on the test case carrying `run`. Tolerates that test
    /// case having been deleted or replaced meanwhile.
    pub fn finish_run(&self, run: RunId) {
        let Ok(()) = self.apply::<_, Infallible, _>("finish_run", |state| {
            let Some(index) = position_of_run(state, run) else {
                return Ok(Update::Unchanged(()));
            };
            match with_test_case(state, index, |case| {
                case.loading = false;
                case.active_run = None;
            }) {
                Ok(next) => Ok(Update::Publish(next, ())),
                Err(_) => Ok(Update::Unchanged(())),
            }
        });
    }

    fn edit_test_case<F>(&self, op: &'static str, index: usize, edit: F) -> Result<(), StoreError>
    where
        F: Fn(&mut TestCase),
    {
        self.apply(op, |state| {
            with_test_case(state, index, &edit).map(|next| Update::Publish(next, ()))
        })
    }
}

fn position_of_run(state: &HarnessState, run: RunId) -> Option<usize> {
    state
        .test_cases
        .iter()
        .position(|case| case.active_run == Some(run))
}

fn with_test_case<F>(state: &HarnessState, index: usize, edit: F) -> Result<HarnessState, StoreError>
where
    F: FnOnce(&mut TestCase),
{
    let len = state.test_cases.len();
    if index >= len {
        return Err(StoreError::TestCaseOutOfRange { index, len });
    }
    let mut cases = state.test_cases.as_ref().clone();
    edit(&mut cases[index]);
    Ok(HarnessState {
        test_cases: Arc::new(cases),
        ..state.clone()
    })
}
