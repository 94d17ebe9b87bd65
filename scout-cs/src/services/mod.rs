//! Pipeline services
//!
//! `search_orchestrator` drives a session through its state machine;
//! `quality_guarantor` owns the guarantee check and the fallback ladder.

pub mod quality_guarantor;
pub mod search_orchestrator;

pub use quality_guarantor::{
    Evaluation, FallbackStrategy, GuaranteeConfig, QualityGuarantor, RetryPlan, SearchReport,
};
pub use search_orchestrator::{SearchMetadata, SearchOrchestrator, SearchOutput};
