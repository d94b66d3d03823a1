pub mod compare;
pub mod dispatch;
pub mod store;
pub mod types;

pub use compare::{Rank, ResponseRanking, rank_responses};
pub use dispatch::{EvaluationDispatcher, ModelOutcome, RunReport};
pub use store::{HarnessStore, RunPlan};
pub use types::{
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, ERROR_MARKER, HarnessState, ModelConfig, ModelConfigField,
    ResponseMetrics, RunId, TestCase, UsageMetrics, ViewMode,
};
