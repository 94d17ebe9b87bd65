//! Search workflow state machine
//!
//! A search session progresses through defined states:
//! COLLECTING → EVALUATING → (RETRYING → EVALUATING)* → SATISFIED | DEGRADED → DONE
//!
//! CANCELLED and FAILED are terminal escapes reachable from any active state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::budget::{DEFAULT_BUDGET_SECONDS, MAX_BUDGET_SECONDS, MIN_BUDGET_SECONDS};
use crate::types::Platform;

/// Search workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Source adapters fanning out, results flowing into the merge pool
    Collecting,
    /// Quality guarantor checking the pool against the guarantee
    Evaluating,
    /// A fallback strategy re-collecting after an unsatisfied evaluation
    Retrying,
    /// Guarantee met with the normal quality bar
    Satisfied,
    /// Guarantee not met; pool returned under relaxed quality
    Degraded,
    /// Results finalized and delivered
    Done,
    /// Search cancelled by user
    Cancelled,
    /// Search failed with a critical error
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Collecting => "COLLECTING",
            SessionState::Evaluating => "EVALUATING",
            SessionState::Retrying => "RETRYING",
            SessionState::Satisfied => "SATISFIED",
            SessionState::Degraded => "DEGRADED",
            SessionState::Done => "DONE",
            SessionState::Cancelled => "CANCELLED",
            SessionState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Non-fatal error accumulated during a session
///
/// Source failures and oracle timeouts land here instead of aborting the
/// search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    /// Pipeline stage that produced the error ("source:github", "oracle", ...)
    pub stage: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Progress tracking for SSE consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Sources completed in the current round
    pub sources_completed: usize,

    /// Sources launched in the current round
    pub sources_total: usize,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,

    /// Current operation description
    pub current_operation: String,

    /// Unique candidates found so far
    pub candidates_found: usize,

    /// Elapsed time (seconds)
    pub elapsed_seconds: u64,

    /// Estimated remaining time (seconds), None if unknown
    pub estimated_remaining_seconds: Option<u64>,
}

impl Default for SearchProgress {
    fn default() -> Self {
        Self {
            sources_completed: 0,
            sources_total: 0,
            percentage: 0.0,
            current_operation: String::from("Initializing..."),
            candidates_found: 0,
            elapsed_seconds: 0,
            estimated_remaining_seconds: None,
        }
    }
}

/// Search session (in-memory state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Current workflow state
    pub state: SessionState,

    /// Raw query text as submitted
    pub query: String,

    /// Optional location filter
    pub location: Option<String>,

    /// Platforms this session collects from
    pub requested_sources: Vec<Platform>,

    /// Wall-clock budget for the whole search, clamped to [30, 120]
    pub time_budget_seconds: u64,

    /// Minimum results the quality guarantee must meet
    pub minimum_results: usize,

    /// Progress tracking
    pub progress: SearchProgress,

    /// Accumulated non-fatal errors
    pub errors: Vec<SessionError>,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time (if done/cancelled/failed)
    pub ended_at: Option<DateTime<Utc>>,
}

impl SearchSession {
    /// Create a new search session
    ///
    /// The time budget is clamped into the supported range; a zero or absent
    /// request value becomes the default budget.
    pub fn new(
        query: String,
        location: Option<String>,
        requested_sources: Vec<Platform>,
        time_budget_seconds: Option<u64>,
        minimum_results: usize,
    ) -> Self {
        let budget = time_budget_seconds
            .unwrap_or(DEFAULT_BUDGET_SECONDS)
            .clamp(MIN_BUDGET_SECONDS, MAX_BUDGET_SECONDS);
        Self {
            session_id: Uuid::new_v4(),
            state: SessionState::Collecting,
            query,
            location,
            requested_sources,
            time_budget_seconds: budget,
            minimum_results,
            progress: SearchProgress::default(),
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: SessionState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal states
        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// Update progress counters
    pub fn update_progress(
        &mut self,
        sources_completed: usize,
        sources_total: usize,
        candidates_found: usize,
        operation: String,
    ) {
        self.progress.sources_completed = sources_completed;
        self.progress.sources_total = sources_total;
        self.progress.percentage = if sources_total > 0 {
            (sources_completed as f64 / sources_total as f64) * 100.0
        } else {
            0.0
        };
        self.progress.candidates_found = candidates_found;
        self.progress.current_operation = operation;

        let elapsed = (Utc::now() - self.started_at).num_seconds().max(0) as u64;
        self.progress.elapsed_seconds = elapsed;

        // Estimate remaining time from per-source rate
        if sources_completed > 0 && sources_total > sources_completed {
            let rate = elapsed as f64 / sources_completed as f64;
            let remaining = ((sources_total - sources_completed) as f64 * rate) as u64;
            self.progress.estimated_remaining_seconds = Some(remaining);
        } else {
            self.progress.estimated_remaining_seconds = None;
        }
    }

    /// Add a non-fatal error to the session
    pub fn add_error(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        self.errors.push(SessionError {
            stage: stage.into(),
            message: message.into(),
            occurred_at: Utc::now(),
        });
    }

    /// Check if the session is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SessionState::Done | SessionState::Cancelled | SessionState::Failed
        )
    }
}
