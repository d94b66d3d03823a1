use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `LangMetres`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the CLI layer continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum HarnessError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Completion backend ──────────────────────────────────────────────
    #[error("completion: {0}")]
    Completion(#[from] CompletionError),

    // ── Environment update ──────────────────────────────────────────────
    #[error("environment: {0}")]
    EnvUpdate(#[from] EnvUpdateError),

    // ── Harness state ───────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Runs ────────────────────────────────────────────────────────────
    #[error("run: {0}")]
    Run(#[from] RunError),

    // ── Spreadsheet import ──────────────────────────────────────────────
    #[error("import: {0}")]
    Import(#[from] ImportError),

    // ── Durable storage ─────────────────────────────────────────────────
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Completion errors ──────────────────────────────────────────────────────

/// Failure of a single (model, prompt) completion call.
///
/// Recovered locally by the dispatcher: it never aborts sibling calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("request to {model} failed: {message}")]
    Transport { model: String, message: String },

    #[error("HTTP error! status: {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid completion payload for {model}: {message}")]
    Decode { model: String, message: String },

    #[error("completion task for {model} aborted: {message}")]
    Aborted { model: String, message: String },
}

// ─── Environment update errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EnvUpdateError {
    #[error("no variables to send")]
    Empty,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP error! status: {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid acknowledgement: {0}")]
    Decode(String),
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("test case index {index} out of range (have {len})")]
    TestCaseOutOfRange { index: usize, len: usize },

    #[error("model {0} is not selected")]
    ModelNotSelected(String),

    #[error("model {0} has no response in this test case")]
    NoResponse(String),

    #[error("{field} must be within {min}..={max}, got {value}")]
    ConfigOutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("model id must not be empty")]
    EmptyModelId,

    #[error("the test case of run {0} no longer exists")]
    RunTargetGone(u64),
}

// ─── Run errors ─────────────────────────────────────────────────────────────

/// Harness-level run failure, raised before any per-model call is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("test case index {index} out of range (have {len})")]
    TestCaseNotFound { index: usize, len: usize },

    #[error("no models selected")]
    NoModelsSelected,

    #[error("test case {0} already has a run in flight")]
    AlreadyRunning(usize),
}

// ─── Import errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file format: missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("file format: row {row}: column {column:?} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("file format: row {row}: column {column:?} is empty")]
    MissingValue { row: usize, column: &'static str },

    #[error("file format: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Storage errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;
