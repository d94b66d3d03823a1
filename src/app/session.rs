use crate::config::Config;
use crate::harness::HarnessStore;
use crate::persistence::{
    EnvCache, EvaluationPersistence, FileStore, KeyValueStore, spawn_autosave,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Everything one command invocation works against: the restored store, the
/// durable keys behind it, and the task that writes every change back.
pub struct Session {
    pub config: Arc<Config>,
    pub store: Arc<HarnessStore>,
    pub persistence: EvaluationPersistence,
    pub env_cache: EnvCache,
    autosave: JoinHandle<usize>,
}

impl Session {
    pub fn open(config: Arc<Config>) -> Result<Self> {
        let storage = FileStore::new(&config.data_dir).with_context(|| {
            format!("failed to open data directory {}", config.data_dir.display())
        })?;
        Ok(Self::open_with(config, Arc::new(storage)))
    }

    /// Restores the last snapshot from `storage` and starts autosave.
    /// Must be called inside a tokio runtime.
    pub fn open_with(config: Arc<Config>, storage: Arc<dyn KeyValueStore>) -> Self {
        let persistence = EvaluationPersistence::new(Arc::clone(&storage));
        let env_cache = EnvCache::new(storage);
        let store = Arc::new(HarnessStore::new(persistence.restore()));
        let autosave = spawn_autosave(store.subscribe(), persistence.clone());
        Self {
            config,
            store,
            persistence,
            env_cache,
            autosave,
        }
    }

    /// Releases the store and waits until its last snapshot is on disk.
    ///
    /// Any other `Arc<HarnessStore>` (a dispatcher, say) must be dropped
    /// first, otherwise autosave never sees the channel close.
    pub async fn close(self) -> Result<()> {
        let Self {
            store, autosave, ..
        } = self;
        drop(store);
        let writes = autosave.await.context("autosave task failed")?;
        debug!(writes, "session closed");
        Ok(())
    }

    /// Like [`Session::close`], then removes the evaluation snapshot so the
    /// next session starts from the default state.
    pub async fn discard(self) -> Result<()> {
        let persistence = self.persistence.clone();
        self.close().await?;
        persistence
            .reset()
            .context("failed to remove saved evaluation")
    }
}
