use crate::error::StorageError;

/// Durable evaluation snapshot.
pub const EVALUATION_KEY: &str = "langmetres.evaluation";
/// Raw `KEY=VALUE` environment text.
pub const ENV_TEXT_KEY: &str = "langmetres.env_vars";
/// Whether the environment text may be cached at all.
pub const ENV_SAVE_FLAG_KEY: &str = "langmetres.save_env";

/// String-keyed durable storage, the local equivalent of browser storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn name(&self) -> &str;
}
