//! Quality guarantor
//!
//! Decides whether a collected pool satisfies the search guarantee (at
//! least `minimum_results` candidates at or above the quality threshold)
//! and, when it does not, which fallback strategy the next collection round
//! should run. Strategies escalate in a fixed order:
//!
//! 1. `broadening`: strip narrowing modifiers from the query and drop the
//!    location filter
//! 2. `alternative_sources`: lead with platforms that have not produced
//!    yet, pulling in registered platforms the request left out
//! 3. `relaxed_criteria`: lower the quality threshold and the validation
//!    confidence floor
//!
//! The guarantor never loops on its own; the orchestrator owns retries and
//! the clock. A pool that still misses the guarantee after the ladder is
//! returned in full, flagged as a quality compromise, rather than withheld.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::scoring::quality::quality_score;
use crate::types::{Platform, SearchCriteria};

pub const DEFAULT_MINIMUM_RESULTS: usize = 10;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 60.0;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Validation confidence below which a candidate is dropped before scoring
pub const DEFAULT_VALIDATION_FLOOR: f64 = 0.30;

const RELAXED_VALIDATION_FLOOR: f64 = 0.15;
const RELAX_STEP: f64 = 15.0;
const RELAX_FLOOR: f64 = 35.0;

/// Guarantee parameters for one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuaranteeConfig {
    pub minimum_results: usize,
    pub quality_threshold: f64,
    pub max_retries: u32,
}

impl Default for GuaranteeConfig {
    fn default() -> Self {
        Self {
            minimum_results: DEFAULT_MINIMUM_RESULTS,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// One guarantee check over the current pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Evaluation {
    /// Candidates at or above the quality threshold
    pub high_quality: usize,
    /// Pool size at evaluation time
    pub total: usize,
    /// Minimum the guarantee requires
    pub required: usize,
    /// Threshold the check ran with
    pub threshold: f64,
    pub satisfied: bool,
}

impl Evaluation {
    /// Share of the pool that cleared the bar, in [0,1]
    pub fn quality_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.high_quality as f64 / self.total as f64
        }
    }
}

/// Fallback strategies in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    Broadening,
    AlternativeSources,
    RelaxedCriteria,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::Broadening => "broadening",
            FallbackStrategy::AlternativeSources => "alternative_sources",
            FallbackStrategy::RelaxedCriteria => "relaxed_criteria",
        }
    }

    /// Strategy for the n-th retry (1-based); attempts past the ladder
    /// stay on relaxed criteria
    pub fn for_attempt(attempt: u32) -> FallbackStrategy {
        match attempt {
            0 | 1 => FallbackStrategy::Broadening,
            2 => FallbackStrategy::AlternativeSources,
            _ => FallbackStrategy::RelaxedCriteria,
        }
    }
}

impl std::fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the next collection round should run with
#[derive(Debug, Clone)]
pub struct RetryPlan {
    pub strategy: FallbackStrategy,
    pub criteria: SearchCriteria,
    pub platforms: Vec<Platform>,
    pub validation_floor: f64,
    pub quality_threshold: f64,
}

/// Guarantee metrics reported in the final output metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// Last fallback strategy applied, if any
    pub strategy_used: Option<FallbackStrategy>,
    pub retries_needed: u32,
    /// Share of the final pool above the evaluation threshold
    pub final_quality_rate: f64,
    pub guarantee_met: bool,
    /// True when results were returned under a weakened guarantee
    pub quality_compromise: bool,
}

/// Evaluates pools and plans fallback rounds
pub struct QualityGuarantor {
    config: GuaranteeConfig,
}

impl QualityGuarantor {
    pub fn new(config: GuaranteeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuaranteeConfig {
        &self.config
    }

    /// Check the pool against the guarantee at the given threshold
    pub fn evaluate(&self, candidates: &[CandidateRecord], threshold: f64) -> Evaluation {
        let high_quality = candidates
            .iter()
            .filter(|c| quality_score(c) >= threshold)
            .count();
        let evaluation = Evaluation {
            high_quality,
            total: candidates.len(),
            required: self.config.minimum_results,
            threshold,
            satisfied: high_quality >= self.config.minimum_results,
        };
        debug!(
            high_quality,
            total = evaluation.total,
            required = evaluation.required,
            threshold,
            satisfied = evaluation.satisfied,
            "Evaluated quality guarantee"
        );
        evaluation
    }

    /// Plan the n-th retry round, or None when retries are exhausted
    ///
    /// # Arguments
    /// * `attempt` - 1-based retry counter
    /// * `base` - Criteria of the original request
    /// * `requested` - Platforms the request asked for
    /// * `available` - Platforms with a registered adapter
    /// * `succeeded` - Platforms that already delivered results
    pub fn plan_retry(
        &self,
        attempt: u32,
        base: &SearchCriteria,
        requested: &[Platform],
        available: &[Platform],
        succeeded: &[Platform],
    ) -> Option<RetryPlan> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }

        let strategy = FallbackStrategy::for_attempt(attempt);
        let plan = match strategy {
            FallbackStrategy::Broadening => RetryPlan {
                strategy,
                criteria: broaden(base),
                platforms: requested.to_vec(),
                validation_floor: DEFAULT_VALIDATION_FLOOR,
                quality_threshold: self.config.quality_threshold,
            },
            FallbackStrategy::AlternativeSources => RetryPlan {
                strategy,
                criteria: base.clone(),
                platforms: reorder_sources(requested, available, succeeded),
                validation_floor: DEFAULT_VALIDATION_FLOOR,
                quality_threshold: self.config.quality_threshold,
            },
            FallbackStrategy::RelaxedCriteria => RetryPlan {
                strategy,
                criteria: base.clone(),
                platforms: available.to_vec(),
                validation_floor: RELAXED_VALIDATION_FLOOR,
                quality_threshold: (self.config.quality_threshold - RELAX_STEP).max(RELAX_FLOOR),
            },
        };
        Some(plan)
    }

    /// Final guarantee metrics for the output metadata
    pub fn report(
        &self,
        evaluation: &Evaluation,
        retries_needed: u32,
        strategy_used: Option<FallbackStrategy>,
    ) -> SearchReport {
        let compromised =
            !evaluation.satisfied || evaluation.threshold < self.config.quality_threshold;
        SearchReport {
            strategy_used,
            retries_needed,
            final_quality_rate: evaluation.quality_rate(),
            guarantee_met: evaluation.satisfied,
            quality_compromise: compromised,
        }
    }
}

impl Default for QualityGuarantor {
    fn default() -> Self {
        Self::new(GuaranteeConfig::default())
    }
}

/// Broadened copy of the criteria: skill terms only, no location
fn broaden(base: &SearchCriteria) -> SearchCriteria {
    let mut criteria = if base.skill_terms.is_empty() {
        base.clone()
    } else {
        base.with_query(&base.skill_terms.join(" "))
    };
    criteria.location = None;
    criteria
}

/// Platforms for an alternative-sources round
///
/// Unproductive requested platforms lead, then available platforms the
/// request skipped, then the ones that already delivered.
fn reorder_sources(
    requested: &[Platform],
    available: &[Platform],
    succeeded: &[Platform],
) -> Vec<Platform> {
    let mut platforms: Vec<Platform> = Vec::new();
    for p in requested {
        if !succeeded.contains(p) {
            platforms.push(*p);
        }
    }
    for p in available {
        if !requested.contains(p) && !platforms.contains(p) {
            platforms.push(*p);
        }
    }
    for p in succeeded {
        if !platforms.contains(p) && (requested.contains(p) || available.contains(p)) {
            platforms.push(*p);
        }
    }
    platforms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_with_quality(quality_target: f64) -> CandidateRecord {
        // Empty profile contributes no completeness, so dimensions carry
        // the quality score: q = 0.25·skill + 0.25·exp + 0.20·rep
        let mut record = CandidateRecord::new(Platform::Github, "test");
        let dimension = quality_target / 0.70;
        record.scores.skill_match = dimension;
        record.scores.experience = dimension;
        record.scores.reputation = dimension;
        record
    }

    #[test]
    fn test_evaluation_counts_against_threshold() {
        let guarantor = QualityGuarantor::default();
        let pool: Vec<CandidateRecord> = (0..12)
            .map(|i| candidate_with_quality(if i < 7 { 65.0 } else { 40.0 }))
            .collect();

        let evaluation = guarantor.evaluate(&pool, DEFAULT_QUALITY_THRESHOLD);
        assert_eq!(evaluation.high_quality, 7);
        assert_eq!(evaluation.total, 12);
        assert!(!evaluation.satisfied);
        assert!((evaluation.quality_rate() - 7.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluation_satisfied_at_minimum() {
        let guarantor = QualityGuarantor::default();
        let pool: Vec<CandidateRecord> =
            (0..10).map(|_| candidate_with_quality(70.0)).collect();
        assert!(guarantor.evaluate(&pool, DEFAULT_QUALITY_THRESHOLD).satisfied);
    }

    #[test]
    fn test_strategy_ladder_order() {
        assert_eq!(FallbackStrategy::for_attempt(1), FallbackStrategy::Broadening);
        assert_eq!(
            FallbackStrategy::for_attempt(2),
            FallbackStrategy::AlternativeSources
        );
        assert_eq!(
            FallbackStrategy::for_attempt(3),
            FallbackStrategy::RelaxedCriteria
        );
        assert_eq!(
            FallbackStrategy::for_attempt(7),
            FallbackStrategy::RelaxedCriteria
        );
    }

    #[test]
    fn test_broadening_strips_modifiers_and_location() {
        let guarantor = QualityGuarantor::default();
        let base = SearchCriteria::new(
            "senior rust developer remote",
            Some("Berlin".to_string()),
        );

        let plan = guarantor
            .plan_retry(1, &base, &[Platform::Github], &[Platform::Github], &[])
            .unwrap();

        assert_eq!(plan.strategy, FallbackStrategy::Broadening);
        assert_eq!(plan.criteria.query, "rust");
        assert!(plan.criteria.location.is_none());
        assert_eq!(plan.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
    }

    #[test]
    fn test_alternative_sources_lead_with_unproductive() {
        let guarantor = QualityGuarantor::default();
        let base = SearchCriteria::new("rust", None);
        let requested = [Platform::Github, Platform::Stackoverflow];
        let available = [
            Platform::Github,
            Platform::Stackoverflow,
            Platform::Devto,
            Platform::Google,
        ];
        let succeeded = [Platform::Github];

        let plan = guarantor
            .plan_retry(2, &base, &requested, &available, &succeeded)
            .unwrap();

        assert_eq!(plan.strategy, FallbackStrategy::AlternativeSources);
        assert_eq!(
            plan.platforms,
            vec![
                Platform::Stackoverflow,
                Platform::Devto,
                Platform::Google,
                Platform::Github,
            ]
        );
    }

    #[test]
    fn test_relaxed_criteria_lowers_both_floors() {
        let guarantor = QualityGuarantor::default();
        let base = SearchCriteria::new("rust", None);

        let plan = guarantor
            .plan_retry(3, &base, &[Platform::Github], &[Platform::Github], &[])
            .unwrap();

        assert_eq!(plan.strategy, FallbackStrategy::RelaxedCriteria);
        assert_eq!(plan.quality_threshold, 45.0);
        assert!(plan.validation_floor < DEFAULT_VALIDATION_FLOOR);
    }

    #[test]
    fn test_relaxed_threshold_never_sinks_below_floor() {
        let guarantor = QualityGuarantor::new(GuaranteeConfig {
            quality_threshold: 40.0,
            ..GuaranteeConfig::default()
        });
        let base = SearchCriteria::new("rust", None);
        let plan = guarantor
            .plan_retry(3, &base, &[], &[], &[])
            .unwrap();
        assert_eq!(plan.quality_threshold, RELAX_FLOOR);
    }

    #[test]
    fn test_retries_exhaust_after_max() {
        let guarantor = QualityGuarantor::default();
        let base = SearchCriteria::new("rust", None);
        assert!(guarantor.plan_retry(4, &base, &[], &[], &[]).is_none());
        assert!(guarantor.plan_retry(0, &base, &[], &[], &[]).is_none());
    }

    #[test]
    fn test_report_flags_compromise_on_relaxed_threshold() {
        let guarantor = QualityGuarantor::default();
        let satisfied_relaxed = Evaluation {
            high_quality: 10,
            total: 14,
            required: 10,
            threshold: 45.0,
            satisfied: true,
        };

        let report = guarantor.report(
            &satisfied_relaxed,
            3,
            Some(FallbackStrategy::RelaxedCriteria),
        );
        assert!(report.guarantee_met);
        assert!(report.quality_compromise);
        assert_eq!(report.retries_needed, 3);
    }

    #[test]
    fn test_report_clean_when_satisfied_at_full_threshold() {
        let guarantor = QualityGuarantor::default();
        let evaluation = Evaluation {
            high_quality: 12,
            total: 15,
            required: 10,
            threshold: DEFAULT_QUALITY_THRESHOLD,
            satisfied: true,
        };

        let report = guarantor.report(&evaluation, 0, None);
        assert!(report.guarantee_met);
        assert!(!report.quality_compromise);
        assert!(report.strategy_used.is_none());
    }
}
