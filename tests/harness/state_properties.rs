use langmetres::error::{RunError, StoreError};
use langmetres::harness::{HarnessStore, ModelConfigField, ResponseMetrics, UsageMetrics};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn answered_store() -> HarnessStore {
    let store = HarnessStore::default();
    for model in ["a", "b"] {
        store.select_model(model).unwrap();
        store
            .set_model_config(model, ModelConfigField::Temperature(1.0))
            .unwrap();
    }
    store.add_test_case();
    for index in 0..2 {
        for model in ["a", "b"] {
            store
                .attach_response(
                    index,
                    model,
                    ResponseMetrics::completed(model, "answer", UsageMetrics::default()),
                )
                .unwrap();
        }
    }
    store.set_passed(0, "b", true).unwrap();
    store
}

#[test]
fn removing_a_model_cascades_and_is_idempotent() {
    let store = answered_store();

    assert!(store.remove_model("a"));
    let once = store.snapshot();
    assert!(!store.remove_model("a"));
    let twice = store.snapshot();

    assert!(Arc::ptr_eq(&once, &twice));
    assert_eq!(once.selected_models.as_slice(), ["b"]);
    assert!(!once.model_configs.contains_key("a"));
    for case in once.test_cases.iter() {
        assert!(!case.responses.contains_key("a"));
        assert!(case.responses.contains_key("b"));
    }
    assert!(once.test_cases[0].responses["b"].is_passed());
}

#[test]
fn test_case_count_never_drops_below_one() {
    let store = HarnessStore::default();
    assert_eq!(store.delete_test_case(0), Ok(false));
    assert_eq!(store.snapshot().test_cases.len(), 1);

    store.add_test_case();
    assert_eq!(store.delete_test_case(1), Ok(true));
    assert_eq!(store.delete_test_case(0), Ok(false));
    assert_eq!(store.snapshot().test_cases.len(), 1);
}

#[test]
fn new_test_cases_are_numbered_from_the_current_count() {
    let store = HarnessStore::default();
    let index = store.add_test_case();
    store.rename_test_case(0, "Test Case 2").unwrap();
    let state = store.snapshot();
    assert_eq!(state.test_cases[index].name, "Test Case 2");
    assert_eq!(state.test_cases[0].name, "Test Case 2");
}

#[test]
fn untouched_collections_keep_their_identity() {
    let store = answered_store();
    let before = store.snapshot();
    store.set_prompt(1, "changed").unwrap();
    let after = store.snapshot();

    assert!(!Arc::ptr_eq(&before.test_cases, &after.test_cases));
    assert!(Arc::ptr_eq(&before.selected_models, &after.selected_models));
    assert!(Arc::ptr_eq(&before.model_configs, &after.model_configs));
}

#[test]
fn sampling_settings_are_bounded() {
    let store = answered_store();
    assert!(matches!(
        store.set_model_config("a", ModelConfigField::Temperature(2.5)),
        Err(StoreError::ConfigOutOfRange { .. })
    ));
    assert_ok!(store.set_model_config("a", ModelConfigField::TopP(1.0)));
    assert!(matches!(
        store.set_model_config("zzz", ModelConfigField::TopP(0.5)),
        Err(StoreError::ModelNotSelected(_))
    ));
}

#[test]
fn runs_need_models_and_do_not_overlap() {
    let store = HarnessStore::default();
    assert_eq!(store.begin_run(0).unwrap_err(), RunError::NoModelsSelected);

    store.select_model("a").unwrap();
    let plan = store.begin_run(0).unwrap();
    assert_eq!(store.begin_run(0).unwrap_err(), RunError::AlreadyRunning(0));
    store.finish_run(plan.run);
    assert_ok!(store.begin_run(0));
    assert_err!(store.begin_run(0));
    assert!(matches!(
        store.begin_run(7),
        Err(RunError::TestCaseNotFound { index: 7, len: 1 })
    ));
}
