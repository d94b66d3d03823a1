use super::snapshot::EvaluationPersistence;
use crate::harness::types::HarnessState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Persists every published harness snapshot.
///
/// Bursts collapse to the latest value. The task ends once the store (the
/// sender) is dropped, after writing whatever it had not yet seen.
pub fn spawn_autosave(
    mut changes: watch::Receiver<Arc<HarnessState>>,
    persistence: EvaluationPersistence,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut writes = 0_usize;
        loop {
            let closed = changes.changed().await.is_err();
            if closed && !changes.has_changed().unwrap_or(false) {
                break;
            }
            let state = Arc::clone(&changes.borrow_and_update());
            match persistence.save(&state) {
                Ok(()) => writes += 1,
                Err(err) => error!(error = %err, "failed to persist evaluation snapshot"),
            }
            if closed {
                break;
            }
        }
        debug!(writes, "autosave stopped");
        writes
    })
}
