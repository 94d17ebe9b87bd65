//! Scoring configuration: dimension weights, tier thresholds, platform tables
//!
//! Everything tunable about scoring lives in `ScoringConfig` so threshold or
//! weight changes never touch the scoring logic itself. The defaults here
//! are the canonical values; nothing else in the crate hardcodes them.

use crate::models::candidate::{DimensionScores, Tier};
use crate::types::Platform;

/// Weights applied to the five dimensions when computing the composite
///
/// Must sum to 1.0 so a uniform candidate scores exactly its dimension value.
#[derive(Debug, Clone, Copy)]
pub struct DimensionWeights {
    pub skill_match: f64,
    pub experience: f64,
    pub reputation: f64,
    pub freshness: f64,
    pub social_proof: f64,
}

impl DimensionWeights {
    pub fn sum(&self) -> f64 {
        self.skill_match + self.experience + self.reputation + self.freshness + self.social_proof
    }

    /// Weighted composite of sanitized dimension scores, before platform bonus
    pub fn weighted(&self, scores: &DimensionScores) -> f64 {
        self.skill_match * scores.skill_match
            + self.experience * scores.experience
            + self.reputation * scores.reputation
            + self.freshness * scores.freshness
            + self.social_proof * scores.social_proof
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            skill_match: 0.40,
            experience: 0.25,
            reputation: 0.15,
            freshness: 0.12,
            social_proof: 0.08,
        }
    }
}

/// Tier cutoffs applied to composite + bonus
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub gold: f64,
    pub silver: f64,
}

impl TierThresholds {
    /// Map a final score to its tier; monotonic by construction
    pub fn tier_for(&self, score: f64) -> Tier {
        if score >= self.gold {
            Tier::Gold
        } else if score >= self.silver {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            gold: 75.0,
            silver: 55.0,
        }
    }
}

/// One value per platform; used for both the additive bonus and the
/// reliability constant
#[derive(Debug, Clone, Copy)]
pub struct PlatformFactors {
    pub github: f64,
    pub stackoverflow: f64,
    pub linkedin: f64,
    pub devto: f64,
    pub kaggle: f64,
    pub google: f64,
}

impl PlatformFactors {
    pub fn get(&self, platform: Platform) -> f64 {
        match platform {
            Platform::Github => self.github,
            Platform::Stackoverflow => self.stackoverflow,
            Platform::Linkedin => self.linkedin,
            Platform::Devto => self.devto,
            Platform::Kaggle => self.kaggle,
            Platform::Google => self.google,
        }
    }
}

/// The single configuration object for the tier scorer
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub weights: DimensionWeights,
    pub thresholds: TierThresholds,
    /// Additive per-platform bonus, applied after weighting, before tiering
    pub platform_bonus: PlatformFactors,
    /// Per-platform reliability constant in [0,1], feeds score confidence
    pub platform_reliability: PlatformFactors,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            thresholds: TierThresholds::default(),
            platform_bonus: PlatformFactors {
                github: 5.0,
                stackoverflow: 4.0,
                linkedin: 3.0,
                devto: 1.0,
                kaggle: 2.0,
                google: 0.0,
            },
            platform_reliability: PlatformFactors {
                github: 0.90,
                stackoverflow: 0.85,
                linkedin: 0.80,
                devto: 0.70,
                kaggle: 0.80,
                google: 0.60,
            },
        }
    }
}
