//! Quality measurement
//!
//! A separate lens from the tier composite: where the composite ranks
//! candidates against each other, the quality score asks whether a record is
//! substantive enough to hand to a recruiter at all. Profile completeness
//! carries the largest share so that a thin, high-scoring record does not
//! pass for a vetted one.

use crate::models::candidate::CandidateRecord;

/// Blend shares for the quality score
const COMPLETENESS_SHARE: f64 = 0.30;
const SKILL_SHARE: f64 = 0.25;
const EXPERIENCE_SHARE: f64 = 0.25;
const REPUTATION_SHARE: f64 = 0.20;

/// Quality score on a 0-100 scale
///
/// `0.30·completeness + 0.25·skill_match + 0.25·experience + 0.20·reputation`
/// with completeness rescaled from its 0-1 range.
pub fn quality_score(record: &CandidateRecord) -> f64 {
    COMPLETENESS_SHARE * record.data_completeness() * 100.0
        + SKILL_SHARE * record.scores.skill_match
        + EXPERIENCE_SHARE * record.scores.experience
        + REPUTATION_SHARE * record.scores.reputation
}

/// Whether a record clears the quality bar
pub fn meets_quality(record: &CandidateRecord, threshold: f64) -> bool {
    quality_score(record) >= threshold
}
