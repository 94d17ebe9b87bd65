//! Core Types and Trait Definitions for SCOUT-CS
//!
//! Defines the base vocabulary for the sourcing pipeline:
//! - **Platform:** the six supported candidate sources
//! - **SearchCriteria:** normalized query passed to every adapter
//! - **SourceAdapter:** uniform trait all platform adapters implement
//! - **AdapterError:** per-source failure taxonomy (error isolation boundary)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::candidate::CandidateRecord;

// ============================================================================
// Platform
// ============================================================================

/// Candidate source platform
///
/// The tag is stable wire vocabulary: it appears in provenance records,
/// events, API responses, and the candidates table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Stackoverflow,
    Linkedin,
    Devto,
    Kaggle,
    Google,
}

impl Platform {
    /// All platforms in default priority order (used when history is empty)
    pub fn all() -> [Platform; 6] {
        [
            Platform::Github,
            Platform::Stackoverflow,
            Platform::Linkedin,
            Platform::Devto,
            Platform::Kaggle,
            Platform::Google,
        ]
    }

    /// Stable lowercase tag matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Stackoverflow => "stackoverflow",
            Platform::Linkedin => "linkedin",
            Platform::Devto => "devto",
            Platform::Kaggle => "kaggle",
            Platform::Google => "google",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Platform::Github),
            "stackoverflow" => Ok(Platform::Stackoverflow),
            "linkedin" => Ok(Platform::Linkedin),
            "devto" => Ok(Platform::Devto),
            "kaggle" => Ok(Platform::Kaggle),
            "google" | "websearch" => Ok(Platform::Google),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}

// ============================================================================
// Search Criteria
// ============================================================================

/// Default per-source truncation cap applied before validation
pub const DEFAULT_PER_SOURCE_CAP: usize = 25;

/// Query terms every adapter treats as narrowing modifiers, not skills
const MODIFIER_TERMS: &[&str] = &[
    "senior",
    "junior",
    "lead",
    "staff",
    "principal",
    "developer",
    "engineer",
    "programmer",
    "dev",
    "expert",
    "remote",
    "freelance",
    "contract",
    "fulltime",
    "full-time",
];

const STOP_TERMS: &[&str] = &[
    "a", "an", "the", "and", "or", "with", "for", "in", "at", "of", "to", "on",
];

/// Normalized search criteria passed to every source adapter
///
/// Built once per collection round. Fallback strategies produce adjusted
/// copies (broadened query, lower caps) rather than mutating in place, so a
/// round's inputs stay auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Raw query text as submitted (or rewritten by a fallback strategy)
    pub query: String,
    /// Optional location filter
    pub location: Option<String>,
    /// Lowercased skill tokens derived from the query, modifiers stripped
    pub skill_terms: Vec<String>,
    /// Maximum raw records accepted from one source in one round
    pub per_source_cap: usize,
}

impl SearchCriteria {
    /// Build criteria from raw query text
    ///
    /// Skill terms are the query tokens minus seniority/role modifiers and
    /// stopwords, lowercased and deduplicated. Token characters are limited
    /// to alphanumerics plus `+`, `#`, `.` and `-` so "C++", "C#" and
    /// "node.js" survive intact.
    pub fn new(query: &str, location: Option<String>) -> Self {
        let skill_terms = derive_skill_terms(query);
        Self {
            query: query.trim().to_string(),
            location: location.filter(|l| !l.trim().is_empty()),
            skill_terms,
            per_source_cap: DEFAULT_PER_SOURCE_CAP,
        }
    }

    /// Primary skill term, used by adapters that query one tag at a time
    pub fn primary_skill(&self) -> Option<&str> {
        self.skill_terms.first().map(|s| s.as_str())
    }

    /// Copy of these criteria with the query text replaced
    ///
    /// Skill terms are re-derived from the new query.
    pub fn with_query(&self, query: &str) -> Self {
        Self {
            query: query.trim().to_string(),
            location: self.location.clone(),
            skill_terms: derive_skill_terms(query),
            per_source_cap: self.per_source_cap,
        }
    }
}

fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '+' | '#' | '.' | '-'))
        .collect::<String>()
        .trim_matches('.')
        .to_lowercase()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '/' || c == ';')
        .map(normalize_token)
        .filter(|t| t.len() >= 2)
}

fn derive_skill_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for token in tokenize(query) {
        if MODIFIER_TERMS.contains(&token.as_str()) || STOP_TERMS.contains(&token.as_str()) {
            continue;
        }
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Whether `text` mentions `term` as a whole token
///
/// Tokenization matches skill-term derivation, so "go" never matches
/// "google" and "java" never matches "javascript".
pub(crate) fn text_mentions_term(text: &str, term: &str) -> bool {
    tokenize(text).any(|token| token == term)
}

// ============================================================================
// Source Adapter Trait
// ============================================================================

/// Source adapter trait
///
/// All platform adapters implement this trait for uniform parallel execution.
/// Each adapter maps provider responses into [`CandidateRecord`]s carrying
/// provenance; scores are filled in downstream by the tier scorer.
///
/// # Example
/// ```rust,ignore
/// use scout_cs::types::{SourceAdapter, SearchCriteria, AdapterError, Platform};
/// use scout_cs::models::candidate::CandidateRecord;
///
/// pub struct GithubAdapter { /* reqwest client, token */ }
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for GithubAdapter {
///     fn platform(&self) -> Platform { Platform::Github }
///
///     async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<CandidateRecord>, AdapterError> {
///         // Query the user search API, hydrate profiles, map to records
///         todo!()
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Platform this adapter collects from, used for provenance tracking
    fn platform(&self) -> Platform;

    /// Collect raw candidates for the given criteria
    ///
    /// # Arguments
    /// * `criteria` - Normalized query, location filter, and truncation cap
    ///
    /// # Returns
    /// Raw candidate records with identity and profile fields populated as
    /// far as the provider allows; scoring fields default to zero.
    ///
    /// # Errors
    /// Returns `AdapterError` on any provider failure. Errors never cross
    /// source boundaries; the caller records the failure and continues.
    async fn search(&self, criteria: &SearchCriteria)
        -> Result<Vec<CandidateRecord>, AdapterError>;
}

/// Errors a single source adapter can produce
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Network request failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider returned a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider response did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider rate limit hit
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Adapter requires credentials that are not configured
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Source exceeded its allocated slice of the time budget
    #[error("Source timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Requested platform has no adapter wired in
    #[error("No adapter registered for {0}")]
    NotConfigured(Platform),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serde_roundtrip() {
        let json = serde_json::to_string(&Platform::Stackoverflow).unwrap();
        assert_eq!(json, "\"stackoverflow\"");
        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Platform::Stackoverflow);
    }

    #[test]
    fn test_platform_from_str_accepts_known_tags() {
        assert_eq!(Platform::from_str("github").unwrap(), Platform::Github);
        assert_eq!(Platform::from_str("GOOGLE").unwrap(), Platform::Google);
        assert!(Platform::from_str("myspace").is_err());
    }

    #[test]
    fn test_skill_terms_strip_modifiers_and_stopwords() {
        let criteria = SearchCriteria::new("Senior Python developer with Django and AWS", None);
        assert_eq!(criteria.skill_terms, vec!["python", "django", "aws"]);
    }

    #[test]
    fn test_skill_terms_keep_symbolic_languages() {
        let criteria = SearchCriteria::new("C++ / C# engineer, node.js", None);
        assert_eq!(criteria.skill_terms, vec!["c++", "c#", "node.js"]);
    }

    #[test]
    fn test_skill_terms_deduplicate() {
        let criteria = SearchCriteria::new("rust rust RUST developer", None);
        assert_eq!(criteria.skill_terms, vec!["rust"]);
    }

    #[test]
    fn test_with_query_rederives_terms_and_keeps_location() {
        let criteria = SearchCriteria::new("senior golang developer", Some("Berlin".to_string()));
        let broadened = criteria.with_query("golang developer");
        assert_eq!(broadened.skill_terms, vec!["golang"]);
        assert_eq!(broadened.location.as_deref(), Some("Berlin"));
        assert_eq!(broadened.per_source_cap, DEFAULT_PER_SOURCE_CAP);
    }

    #[test]
    fn test_blank_location_treated_as_absent() {
        let criteria = SearchCriteria::new("rust", Some("   ".to_string()));
        assert!(criteria.location.is_none());
    }

    #[test]
    fn test_term_mentions_require_whole_tokens() {
        assert!(text_mentions_term("Writing Go services", "go"));
        assert!(!text_mentions_term("Going to conferences", "go"));
        assert!(!text_mentions_term("JavaScript fan", "java"));
        assert!(text_mentions_term("C++ since 1998.", "c++"));
    }
}
