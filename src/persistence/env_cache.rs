use super::traits::{ENV_SAVE_FLAG_KEY, ENV_TEXT_KEY, KeyValueStore};
use crate::error::StorageError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cached environment text plus the flag that gates caching it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub text: String,
    pub save_to_storage: bool,
}

/// Owns [`ENV_TEXT_KEY`] and [`ENV_SAVE_FLAG_KEY`], independently of the
/// evaluation snapshot.
#[derive(Clone)]
pub struct EnvCache {
    storage: Arc<dyn KeyValueStore>,
}

impl EnvCache {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn save_enabled(&self) -> bool {
        match self.storage.get(ENV_SAVE_FLAG_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(raw.trim()).unwrap_or_else(|error| {
                warn!(%error, "env save flag is corrupt; treating as off");
                false
            }),
            Ok(None) => false,
            Err(error) => {
                warn!(%error, "env save flag unreadable; treating as off");
                false
            }
        }
    }

    /// Text is only returned while caching is enabled.
    pub fn load(&self) -> Result<EnvSettings, StorageError> {
        let save_to_storage = self.save_enabled();
        let text = if save_to_storage {
            self.storage.get(ENV_TEXT_KEY)?.unwrap_or_default()
        } else {
            String::new()
        };
        Ok(EnvSettings {
            text,
            save_to_storage,
        })
    }

    /// Turning caching off purges the stored text immediately.
    pub fn set_save_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.storage
            .set(ENV_SAVE_FLAG_KEY, &serde_json::to_string(&enabled)?)?;
        if !enabled {
            self.storage.remove(ENV_TEXT_KEY)?;
            debug!("env cache disabled and purged");
        }
        Ok(())
    }

    /// Stores `text` if caching is on. Returns whether it was stored.
    pub fn store_text(&self, text: &str) -> Result<bool, StorageError> {
        if !self.save_enabled() {
            return Ok(false);
        }
        self.storage.set(ENV_TEXT_KEY, text)?;
        Ok(true)
    }

    /// Clears the cached text and the flag. The evaluation snapshot is untouched.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.storage.remove(ENV_TEXT_KEY)?;
        self.storage.remove(ENV_SAVE_FLAG_KEY)
    }
}
