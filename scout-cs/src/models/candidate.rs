//! Candidate profile model
//!
//! `CandidateRecord` is the unit of data flowing through the whole pipeline:
//! created by a source adapter, gated by validation, optionally enriched,
//! scored, then merged into the session pool. Scoring and merging logic live
//! in `scoring` and `fusion`; this module is the data shape plus the small
//! amount of math that belongs to it (completeness, score sanitization).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Platform;

/// Discrete quality tier, derived from the overall score
///
/// Variant order is ascending so tier comparisons read naturally
/// (`Tier::Gold > Tier::Silver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five scoring dimensions, each 0-100
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub skill_match: f64,
    pub experience: f64,
    pub reputation: f64,
    pub freshness: f64,
    pub social_proof: f64,
}

impl DimensionScores {
    /// Clamp every dimension into [0,100], mapping NaN to the neutral 50
    pub fn sanitized(self) -> Self {
        Self {
            skill_match: sanitize_score(self.skill_match),
            experience: sanitize_score(self.experience),
            reputation: sanitize_score(self.reputation),
            freshness: sanitize_score(self.freshness),
            social_proof: sanitize_score(self.social_proof),
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.skill_match,
            self.experience,
            self.reputation,
            self.freshness,
            self.social_proof,
        ]
    }

    /// Population variance of the five dimensions
    ///
    /// Feeds the consistency part of scoring confidence: dimensions that
    /// agree produce low variance and therefore high consistency.
    pub fn variance(&self) -> f64 {
        let values = self.as_array();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
    }
}

/// Clamp a score into [0,100]; NaN becomes the neutral 50
///
/// A bad upstream value degrades one dimension, never the whole candidate.
pub fn sanitize_score(value: f64) -> f64 {
    if value.is_nan() {
        50.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Raw platform metrics captured at collection time
///
/// Inputs for the reputation/freshness/social-proof heuristics. Absent
/// metrics score neutral rather than zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMetrics {
    /// Follower or vote count, whatever the platform exposes as audience size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    /// Platform reputation points (Stack Overflow rep, Kaggle medals as points)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation_points: Option<u64>,
    /// Public contribution count (repos, answers, articles, datasets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributions: Option<u64>,
    /// Most recent public activity the platform reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

/// One discovered profile
///
/// Identity fields feed the dedup key (first non-empty of email, platform
/// username, normalized name). At least one must be present before the
/// record is accepted into the merge pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    // Identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_name: Option<String>,

    // Profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<f64>,

    // Provenance
    pub source_platform: Platform,
    pub discovery_method: String,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub metrics: CandidateMetrics,

    // Scores (filled by the tier scorer; zero until then)
    #[serde(default)]
    pub scores: DimensionScores,
    #[serde(default)]
    pub overall_score: f64,
    pub tier: Tier,

    // Risk / quality
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub validation_confidence: f64,
}

impl CandidateRecord {
    /// New empty record for one platform discovery
    pub fn new(platform: Platform, discovery_method: impl Into<String>) -> Self {
        Self {
            email: None,
            platform_username: None,
            normalized_name: None,
            name: None,
            title: None,
            location: None,
            summary: None,
            skills: Vec::new(),
            experience_years: None,
            source_platform: platform,
            discovery_method: discovery_method.into(),
            collected_at: Utc::now(),
            profile_url: None,
            metrics: CandidateMetrics::default(),
            scores: DimensionScores::default(),
            overall_score: 0.0,
            tier: Tier::Bronze,
            risk_flags: Vec::new(),
            validation_confidence: 0.0,
        }
    }

    /// Set the display name and keep the normalized identity field in sync
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        let normalized = crate::fusion::identity::normalize_name(&name);
        if !normalized.is_empty() {
            self.normalized_name = Some(normalized);
        }
        self.name = Some(name);
    }

    /// True when at least one identity field is non-empty
    pub fn has_identity(&self) -> bool {
        fn filled(field: &Option<String>) -> bool {
            field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }
        filled(&self.email) || filled(&self.platform_username) || filled(&self.normalized_name)
    }

    /// Add a skill if not already present (case-insensitive)
    pub fn add_skill(&mut self, skill: impl Into<String>) {
        let skill = skill.into();
        let lowered = skill.to_lowercase();
        if !self.skills.iter().any(|s| s.to_lowercase() == lowered) {
            self.skills.push(skill);
        }
    }

    /// Add a risk flag if not already present, preserving insertion order
    pub fn add_risk_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.risk_flags.contains(&flag) {
            self.risk_flags.push(flag);
        }
    }

    /// Fraction of profile fields that are filled, in [0,1]
    ///
    /// Counts the eight signals a recruiter actually reads: name, title,
    /// location, summary, email, username, any skills, any experience figure.
    pub fn data_completeness(&self) -> f64 {
        let filled = [
            self.name.is_some(),
            self.title.is_some(),
            self.location.is_some(),
            self.summary.is_some(),
            self.email.is_some(),
            self.platform_username.is_some(),
            !self.skills.is_empty(),
            self.experience_years.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count();
        filled as f64 / 8.0
    }
}
