//! Validation and enrichment oracle
//!
//! Collected candidates pass through an oracle before scoring: a validator
//! decides whether the record describes a real, relevant person, and
//! enrichers fill gaps with data from paid or slow providers. Both sit
//! behind traits so the pipeline never knows which backing service (or
//! none) is wired in. Every implementation must degrade to a usable answer
//! when its provider is unreachable; the deterministic `HeuristicValidator`
//! is the floor the others fall back to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::candidate::{CandidateRecord, DimensionScores};
use crate::types::SearchCriteria;

pub mod apollo_client;
pub mod llm_validator;
pub mod perplexity_client;

pub use apollo_client::ApolloClient;
pub use llm_validator::LlmValidator;
pub use perplexity_client::PerplexityClient;

/// Oracle call failures
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Validator's judgement on one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the record plausibly describes a real, relevant person
    pub is_valid: bool,
    /// Validator's confidence in its own judgement, 0.0 to 1.0
    pub confidence: f64,
    /// Short rationale, used in risk flags and logs
    pub reason: Option<String>,
    /// Dimension scores the validator produced, if it scored at all
    pub dimension_scores: Option<DimensionScores>,
}

impl Verdict {
    /// The verdict used when no validator can reach a judgement: accept
    /// with middling confidence so downstream scoring decides
    pub fn neutral() -> Self {
        Self {
            is_valid: true,
            confidence: 0.5,
            reason: None,
            dimension_scores: None,
        }
    }
}

/// Fields an enricher can add to a candidate. Additive only: an enrichment
/// never overwrites data already collected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub email: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub summary: Option<String>,
    pub experience_years: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.title.is_none()
            && self.location.is_none()
            && self.summary.is_none()
            && self.experience_years.is_none()
            && self.skills.is_empty()
    }

    /// Fill the record's gaps from this enrichment
    pub fn apply_to(&self, record: &mut CandidateRecord) {
        record.email = record.email.take().or_else(|| self.email.clone());
        record.title = record.title.take().or_else(|| self.title.clone());
        record.location = record.location.take().or_else(|| self.location.clone());
        record.summary = record.summary.take().or_else(|| self.summary.clone());
        record.experience_years = record.experience_years.or(self.experience_years);
        for skill in &self.skills {
            record.add_skill(skill);
        }
    }
}

/// Judges whether a collected record is genuine and relevant
#[async_trait]
pub trait CandidateValidator: Send + Sync {
    /// Human-readable name for logs and quality reports
    fn name(&self) -> &'static str;

    async fn validate(
        &self,
        record: &CandidateRecord,
        criteria: &SearchCriteria,
    ) -> Result<Verdict, OracleError>;
}

/// Fills profile gaps from an external data provider
#[async_trait]
pub trait CandidateEnricher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enrich(&self, record: &CandidateRecord) -> Result<Enrichment, OracleError>;
}

// ============================================================================
// Heuristic validator
// ============================================================================

/// Deterministic validator requiring no network
///
/// A record passes if it resolves to an identity and carries either a name
/// or a platform username. Confidence grows with profile completeness but
/// never reaches the certainty a live check could provide.
pub struct HeuristicValidator;

const HEURISTIC_CONFIDENCE_BASE: f64 = 0.30;
const HEURISTIC_CONFIDENCE_SPAN: f64 = 0.60;
const HEURISTIC_CONFIDENCE_CAP: f64 = 0.95;

#[async_trait]
impl CandidateValidator for HeuristicValidator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn validate(
        &self,
        record: &CandidateRecord,
        _criteria: &SearchCriteria,
    ) -> Result<Verdict, OracleError> {
        if !record.has_identity() {
            return Ok(Verdict {
                is_valid: false,
                confidence: 0.9,
                reason: Some("no resolvable identity".to_string()),
                dimension_scores: None,
            });
        }

        let named = record.name.as_deref().is_some_and(|n| !n.trim().is_empty())
            || record
                .platform_username
                .as_deref()
                .is_some_and(|u| !u.trim().is_empty());
        if !named {
            return Ok(Verdict {
                is_valid: false,
                confidence: 0.8,
                reason: Some("neither name nor username present".to_string()),
                dimension_scores: None,
            });
        }

        let confidence = (HEURISTIC_CONFIDENCE_BASE
            + HEURISTIC_CONFIDENCE_SPAN * record.data_completeness())
        .min(HEURISTIC_CONFIDENCE_CAP);

        Ok(Verdict {
            is_valid: true,
            confidence,
            reason: None,
            dimension_scores: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn named_record() -> CandidateRecord {
        let mut record = CandidateRecord::new(Platform::Github, "github_user_search");
        record.set_name("Alan Turing");
        record.platform_username = Some("aturing".to_string());
        record
    }

    #[tokio::test]
    async fn test_heuristic_accepts_named_record() {
        let verdict = HeuristicValidator
            .validate(&named_record(), &SearchCriteria::new("logic", None))
            .await
            .unwrap();
        assert!(verdict.is_valid);
        assert!(verdict.confidence > 0.3);
        assert!(verdict.confidence <= 0.95);
    }

    #[tokio::test]
    async fn test_heuristic_rejects_identityless_record() {
        let record = CandidateRecord::new(Platform::Google, "web_search");
        let verdict = HeuristicValidator
            .validate(&record, &SearchCriteria::new("logic", None))
            .await
            .unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(verdict.reason.as_deref(), Some("no resolvable identity"));
    }

    #[tokio::test]
    async fn test_heuristic_confidence_grows_with_completeness() {
        let sparse = named_record();
        let mut full = named_record();
        full.title = Some("Mathematician".to_string());
        full.location = Some("Cambridge".to_string());
        full.summary = Some("Broke codes".to_string());
        full.email = Some("alan@example.org".to_string());
        full.add_skill("cryptanalysis");
        full.experience_years = Some(15.0);

        let criteria = SearchCriteria::new("logic", None);
        let sparse_v = HeuristicValidator.validate(&sparse, &criteria).await.unwrap();
        let full_v = HeuristicValidator.validate(&full, &criteria).await.unwrap();
        assert!(full_v.confidence > sparse_v.confidence);
    }

    #[test]
    fn test_enrichment_fills_only_gaps() {
        let mut record = named_record();
        record.title = Some("Fellow".to_string());

        let enrichment = Enrichment {
            email: Some("found@example.com".to_string()),
            title: Some("Professor".to_string()),
            location: None,
            summary: None,
            experience_years: Some(12.0),
            skills: vec!["turing machines".to_string()],
        };
        enrichment.apply_to(&mut record);

        // Existing title survives, missing fields are filled
        assert_eq!(record.title.as_deref(), Some("Fellow"));
        assert_eq!(record.email.as_deref(), Some("found@example.com"));
        assert_eq!(record.experience_years, Some(12.0));
        assert!(record.skills.iter().any(|s| s == "turing machines"));
    }

    #[test]
    fn test_neutral_verdict_accepts_with_half_confidence() {
        let verdict = Verdict::neutral();
        assert!(verdict.is_valid);
        assert_eq!(verdict.confidence, 0.5);
        assert!(verdict.dimension_scores.is_none());
    }
}
