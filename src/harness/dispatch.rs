use super::store::HarnessStore;
use super::types::{ResponseMetrics, RunId};
use crate::client::{CompletionClient, CompletionRequest};
use crate::error::{CompletionError, RunError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// One model's settled result, in the order results arrived.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub model: String,
    pub result: Result<ResponseMetrics, CompletionError>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub index: usize,
    pub outcomes: Vec<ModelOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| outcome.model.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &CompletionError)> {
        self.outcomes.iter().filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|error| (outcome.model.as_str(), error))
        })
    }
}

/// Clears `loading` however the run future ends, including being dropped.
struct LoadingGuard<'a> {
    store: &'a HarnessStore,
    run: RunId,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.finish_run(self.run);
    }
}

/// Fans one test case out to every selected model.
pub struct EvaluationDispatcher {
    store: Arc<HarnessStore>,
    client: Arc<dyn CompletionClient>,
    system_prompt: Option<String>,
}

impl EvaluationDispatcher {
    pub fn new(store: Arc<HarnessStore>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            store,
            client,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub async fn run(&self, index: usize) -> Result<RunReport, RunError> {
        self.run_with(index, |_| {}).await
    }

    /// Runs the test case at `index`, calling `on_outcome` right after each
    /// model's result has been merged into the store.
    ///
    /// All calls start together and settle independently: a failing model
    /// becomes a synthetic error entry and never cancels its siblings.
    /// Results follow the test case even if edits elsewhere move it to
    /// another index while the run is in flight.
    pub async fn run_with<F>(&self, index: usize, mut on_outcome: F) -> Result<RunReport, RunError>
    where
        F: FnMut(&ModelOutcome),
    {
        let plan = self.store.begin_run(index)?;
        let run = plan.run;
        let _loading = LoadingGuard {
            store: self.store.as_ref(),
            run,
        };
        info!(
            test_case = index,
            run = run.0,
            models = plan.models.len(),
            "dispatching run"
        );

        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut calls = JoinSet::new();
        for (model, config) in plan.models {
            let request = CompletionRequest::new(model.clone(), plan.prompt.clone(), config)
                .with_system_prompt(self.system_prompt.clone());
            let client = Arc::clone(&self.client);
            pending.insert(model.clone());
            calls.spawn(async move {
                let result = client.complete(&request).await;
                (model, result)
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((model, result)) => {
                    pending.remove(&model);
                    let outcome = ModelOutcome { model, result };
                    self.settle(run, &outcome);
                    on_outcome(&outcome);
                    outcomes.push(outcome);
                }
                Err(join_error) => {
                    warn!(test_case = index, error = %join_error, "completion task did not finish");
                }
            }
        }

        // Tasks that panicked never reported their model.
        for model in pending {
            let outcome = ModelOutcome {
                result: Err(CompletionError::Aborted {
                    model: model.clone(),
                    message: "task ended without a result".into(),
                }),
                model,
            };
            self.settle(run, &outcome);
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        info!(
            test_case = index,
            failed = outcomes.iter().filter(|outcome| outcome.result.is_err()).count(),
            "run settled"
        );
        Ok(RunReport { index, outcomes })
    }

    fn settle(&self, run: RunId, outcome: &ModelOutcome) {
        if let Err(error) = &outcome.result {
            warn!(run = run.0, model = %outcome.model, %error, "model call failed");
        }
        if let Err(error) = self.store.attach_outcome(run, &outcome.model, &outcome.result) {
            warn!(
                run = run.0,
                model = %outcome.model,
                %error,
                "result discarded; test case no longer exists"
            );
        }
    }
}
