//! Candidate scoring
//!
//! Two related measurements:
//! - `tier_scorer`: the five-dimension weighted composite, platform bonus,
//!   and gold/silver/bronze tier that rank candidates
//! - `quality`: the completeness-weighted quality score the guarantee
//!   evaluation counts against its minimum

pub mod quality;
pub mod tier_scorer;
pub mod weights;

pub use quality::{meets_quality, quality_score};
pub use tier_scorer::TierScorer;
pub use weights::{DimensionWeights, PlatformFactors, ScoringConfig, TierThresholds};
