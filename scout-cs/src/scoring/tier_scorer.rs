//! Tiered scoring
//!
//! Fills a candidate's five dimension scores, the weighted composite with
//! platform bonus, the derived tier, and a confidence figure based on how
//! much the dimensions agree. Oracle-provided dimension scores override the
//! local heuristics per dimension; missing signals score the neutral 50 so a
//! sparse profile is ranked, not rejected.

use chrono::Utc;
use tracing::debug;

use crate::models::candidate::{sanitize_score, CandidateRecord, DimensionScores};
use crate::scoring::weights::ScoringConfig;
use crate::types::{text_mentions_term, SearchCriteria};

/// Similarity at which two skill tokens count as the same technology
const FUZZY_SKILL_THRESHOLD: f64 = 0.80;

/// Years of experience that map to a full experience score
const EXPERIENCE_CEILING_YEARS: f64 = 10.0;

/// Log-scale normalization caps for platform metrics
const REPUTATION_POINTS_CAP: f64 = 10_000.0;
const CONTRIBUTIONS_CAP: f64 = 500.0;
const FOLLOWERS_CAP: f64 = 1_000.0;

const NEUTRAL: f64 = 50.0;

/// Computes dimension scores, composite, tier, and confidence
pub struct TierScorer {
    config: ScoringConfig,
}

impl TierScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a candidate in place
    ///
    /// # Arguments
    /// * `record` - Candidate to score; dimension, composite, tier, and
    ///   confidence fields are overwritten
    /// * `criteria` - Query whose skill terms drive the skill-match dimension
    /// * `oracle_scores` - Dimension scores from the validation oracle, if
    ///   any; each present value overrides the local heuristic for that
    ///   dimension
    pub fn score(
        &self,
        record: &mut CandidateRecord,
        criteria: &SearchCriteria,
        oracle_scores: Option<&DimensionScores>,
    ) {
        let heuristic = self.heuristic_dimensions(record, criteria);
        let dims = match oracle_scores {
            Some(oracle) => oracle.sanitized(),
            None => heuristic.sanitized(),
        };

        let weighted = self.config.weights.weighted(&dims);
        let bonus = self.config.platform_bonus.get(record.source_platform);
        let overall = sanitize_score(weighted + bonus);

        record.scores = dims;
        record.overall_score = overall;
        record.tier = self.config.thresholds.tier_for(overall);
        record.validation_confidence = self.confidence(&dims, record);

        debug!(
            platform = %record.source_platform,
            overall,
            tier = %record.tier,
            confidence = record.validation_confidence,
            "Scored candidate"
        );
    }

    /// Score confidence: consistency of the dimensions blended with the
    /// platform reliability constant
    ///
    /// `confidence = round(100·(0.6·consistency + 0.4·reliability))/100`
    /// where `consistency = max(0, 1 − variance/1000)`.
    fn confidence(&self, dims: &DimensionScores, record: &CandidateRecord) -> f64 {
        let consistency = (1.0 - dims.variance() / 1000.0).max(0.0);
        let reliability = self.config.platform_reliability.get(record.source_platform);
        (100.0 * (0.6 * consistency + 0.4 * reliability)).round() / 100.0
    }

    fn heuristic_dimensions(
        &self,
        record: &CandidateRecord,
        criteria: &SearchCriteria,
    ) -> DimensionScores {
        DimensionScores {
            skill_match: skill_match_score(record, criteria),
            experience: experience_score(record.experience_years),
            reputation: reputation_score(record),
            freshness: freshness_score(record),
            social_proof: social_proof_score(record.metrics.followers),
        }
    }
}

/// Fraction of query skill terms the candidate demonstrably has, scaled to 0-100
///
/// Exact skill matches earn full credit, close names (postgres vs
/// postgresql) fuzzy credit, and bare mentions in the title or summary
/// partial credit. No skill terms in the query means the dimension is
/// uninformative: neutral 50.
fn skill_match_score(record: &CandidateRecord, criteria: &SearchCriteria) -> f64 {
    if criteria.skill_terms.is_empty() {
        return NEUTRAL;
    }

    let skills: Vec<String> = record.skills.iter().map(|s| s.to_lowercase()).collect();
    let prose = format!(
        "{} {}",
        record.title.as_deref().unwrap_or(""),
        record.summary.as_deref().unwrap_or("")
    );

    let mut credit = 0.0;
    for term in &criteria.skill_terms {
        if skills.iter().any(|s| s == term) {
            credit += 1.0;
            continue;
        }
        let best_similarity = skills
            .iter()
            .map(|s| strsim::normalized_levenshtein(s, term))
            .fold(0.0_f64, f64::max);
        if best_similarity >= FUZZY_SKILL_THRESHOLD {
            credit += best_similarity;
        } else if text_mentions_term(&prose, term) {
            credit += 0.6;
        }
    }

    100.0 * (credit / criteria.skill_terms.len() as f64).min(1.0)
}

/// Years of experience mapped linearly to 0-100, full marks at 10 years
fn experience_score(years: Option<f64>) -> f64 {
    match years {
        Some(y) if y >= 0.0 => (y / EXPERIENCE_CEILING_YEARS * 100.0).min(100.0),
        _ => NEUTRAL,
    }
}

/// Platform reputation on a log scale; the best available metric wins
fn reputation_score(record: &CandidateRecord) -> f64 {
    let from_points = record
        .metrics
        .reputation_points
        .map(|p| log_scaled(p as f64, REPUTATION_POINTS_CAP));
    let from_contributions = record
        .metrics
        .contributions
        .map(|c| log_scaled(c as f64, CONTRIBUTIONS_CAP));

    match (from_points, from_contributions) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => NEUTRAL,
    }
}

/// Recency of public activity; unknown activity is neutral
fn freshness_score(record: &CandidateRecord) -> f64 {
    let Some(last_active) = record.metrics.last_active else {
        return NEUTRAL;
    };
    let days = (Utc::now() - last_active).num_days();
    match days {
        d if d <= 7 => 100.0,
        d if d <= 30 => 90.0,
        d if d <= 90 => 75.0,
        d if d <= 180 => 60.0,
        d if d <= 365 => 40.0,
        d if d <= 730 => 20.0,
        _ => 5.0,
    }
}

/// Audience size on a log scale
fn social_proof_score(followers: Option<u64>) -> f64 {
    match followers {
        Some(f) => log_scaled(f as f64, FOLLOWERS_CAP),
        None => NEUTRAL,
    }
}

fn log_scaled(value: f64, cap: f64) -> f64 {
    (100.0 * ((1.0 + value.max(0.0)).ln() / (1.0 + cap).ln())).min(100.0)
}
