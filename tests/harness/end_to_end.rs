use langmetres::client::HttpCompletionClient;
use langmetres::harness::{EvaluationDispatcher, HarnessStore, ModelConfigField};
use langmetres::persistence::{EVALUATION_KEY, EvaluationPersistence, InMemoryStore, KeyValueStore};
use langmetres::spreadsheet;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(50))
                .set_body_json(json!({
                    "status": "success",
                    "response": {
                        "response_content": "Paris",
                        "model_name": "gpt-4o",
                        "usage": {
                            "prompt_tokens": 8,
                            "completion_tokens": 1,
                            "total_tokens": 9,
                            "cost": 0.0000425,
                            "latency": 0.61
                        }
                    }
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"model": "claude-3-5-haiku-20241022"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    server
}

fn store_with_models() -> Arc<HarnessStore> {
    let store = Arc::new(HarnessStore::default());
    store.select_model("gpt-4o").unwrap();
    store.select_model("claude-3-5-haiku-20241022").unwrap();
    store
        .set_model_config("gpt-4o", ModelConfigField::Temperature(0.0))
        .unwrap();
    store.set_prompt(0, "Capital of France?").unwrap();
    store
}

#[tokio::test]
async fn one_failing_model_does_not_spoil_the_run() {
    let server = backend().await;
    let store = store_with_models();
    let dispatcher = EvaluationDispatcher::new(
        Arc::clone(&store),
        Arc::new(HttpCompletionClient::new(&server.uri())),
    );

    let report = dispatcher.run(0).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.succeeded().collect::<Vec<_>>(), ["gpt-4o"]);
    let state = store.snapshot();
    let case = &state.test_cases[0];
    assert!(!case.loading);
    assert_eq!(case.responses["gpt-4o"].response_content, "Paris");
    let failed = &case.responses["claude-3-5-haiku-20241022"];
    assert!(failed.is_failure());
    assert!(failed.response_content.starts_with("Error: HTTP error! status: 500"));
    assert!(failed.usage.is_zero());
}

#[tokio::test]
async fn graded_run_survives_export_and_import() {
    let server = backend().await;
    let store = store_with_models();
    let dispatcher = EvaluationDispatcher::new(
        Arc::clone(&store),
        Arc::new(HttpCompletionClient::new(&server.uri())),
    );
    dispatcher.run(0).await.unwrap();
    store.set_passed(0, "gpt-4o", true).unwrap();
    store.add_test_case();

    let tmp = TempDir::new().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let before = store.snapshot();
    let (file, rows) = spreadsheet::export_to_dir(tmp.path(), &before.test_cases, date).unwrap();
    assert_eq!(rows, 2);

    let fresh = HarnessStore::default();
    fresh.select_model("unrelated").unwrap();
    fresh
        .set_model_config("unrelated", ModelConfigField::TopP(0.5))
        .unwrap();
    spreadsheet::import_file(&file, &fresh).await.unwrap();

    let after = fresh.snapshot();
    assert_eq!(after.test_cases.len(), 1);
    assert_eq!(
        after.selected_models.as_slice(),
        ["claude-3-5-haiku-20241022", "gpt-4o"]
    );
    assert!(after.model_configs.contains_key("unrelated"));
    assert_eq!(
        spreadsheet::export_rows(&before.test_cases),
        spreadsheet::export_rows(&after.test_cases)
    );
    assert!(after.test_cases[0].responses["gpt-4o"].is_passed());
}

#[tokio::test]
async fn snapshot_taken_mid_run_is_stored_without_loading() {
    let storage = Arc::new(InMemoryStore::new());
    let persistence = EvaluationPersistence::new(storage.clone());
    let store = store_with_models();

    let plan = store.begin_run(0).unwrap();
    assert_eq!(plan.models.len(), 2);
    assert!(store.snapshot().test_cases[0].loading);

    persistence.save(&store.snapshot()).unwrap();

    let raw = storage.get(EVALUATION_KEY).unwrap().unwrap();
    assert!(!raw.contains("\"loading\":true"));
    let restored = persistence.restore();
    assert!(!restored.test_cases[0].loading);
    assert_eq!(restored.test_cases[0].active_run, None);
    store.finish_run(plan.run);
}
