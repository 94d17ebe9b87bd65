//! Data models for scout-cs (Candidate Sourcing microservice)

pub mod candidate;
pub mod search_session;

pub use candidate::{CandidateMetrics, CandidateRecord, DimensionScores, Tier};
pub use search_session::{
    SearchProgress, SearchSession, SessionError, SessionState, StateTransition,
};
