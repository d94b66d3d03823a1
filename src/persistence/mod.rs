pub mod autosave;
pub mod env_cache;
pub mod file;
pub mod snapshot;
pub mod traits;

pub use autosave::spawn_autosave;
pub use env_cache::{EnvCache, EnvSettings};
pub use file::{FileStore, InMemoryStore};
pub use snapshot::{EvaluationPersistence, EvaluationSnapshot};
pub use traits::{ENV_SAVE_FLAG_KEY, ENV_TEXT_KEY, EVALUATION_KEY, KeyValueStore};
