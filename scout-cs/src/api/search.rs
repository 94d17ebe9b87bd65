//! Search workflow API handlers
//!
//! POST /search/start, GET /search/status/{id}, POST /search/cancel/{id},
//! GET /search/results/{id}
//!
//! A start request is the one place malformed input is rejected outright;
//! everything past it degrades inside the pipeline and reaches the client
//! as result metadata.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scout_common::events::ScoutEvent;

use crate::error::{ApiError, ApiResult};
use crate::models::candidate::CandidateRecord;
use crate::models::search_session::{SearchProgress, SearchSession, SessionError, SessionState};
use crate::scoring::TierScorer;
use crate::services::{SearchMetadata, SearchOrchestrator};
use crate::types::Platform;
use crate::AppState;

/// Longest accepted query text; anything larger is rejected, not truncated
const MAX_QUERY_LENGTH: usize = 500;

/// POST /search/start request
#[derive(Debug, Deserialize)]
pub struct StartSearchRequest {
    pub query: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Platform tags to collect from; empty means every registered source
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub time_budget_seconds: Option<u64>,
    /// Overrides the configured guarantee minimum for this session
    #[serde(default)]
    pub minimum_results: Option<usize>,
}

/// POST /search/start response
#[derive(Debug, Serialize)]
pub struct StartSearchResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub time_budget_seconds: u64,
    pub sources: Vec<Platform>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /search/status response
#[derive(Debug, Serialize)]
pub struct SearchStatusResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub query: String,
    pub progress: SearchProgress,
    pub errors: Vec<SessionError>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /search/cancel response
#[derive(Debug, Serialize)]
pub struct CancelSearchResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub candidates_found: usize,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

/// GET /search/results response
#[derive(Debug, Serialize)]
pub struct SearchResultsResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub candidates: Vec<CandidateRecord>,
    pub metadata: Option<SearchMetadata>,
}

/// Validate a start request and persist the new session row
///
/// The single hard-rejection point of the whole pipeline: everything past
/// here degrades instead of erroring.
async fn admit_session(
    state: &AppState,
    request: &StartSearchRequest,
) -> ApiResult<SearchSession> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }
    if query.len() > MAX_QUERY_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Query exceeds {} characters",
            MAX_QUERY_LENGTH
        )));
    }

    let mut sources = Vec::with_capacity(request.sources.len());
    for tag in &request.sources {
        let platform = Platform::from_str(tag).map_err(ApiError::BadRequest)?;
        if !state.registry.contains(platform) {
            return Err(ApiError::BadRequest(format!(
                "Source not available: {}",
                platform
            )));
        }
        if !sources.contains(&platform) {
            sources.push(platform);
        }
    }
    if state.registry.is_empty() {
        return Err(ApiError::Internal(
            "No source adapters configured".to_string(),
        ));
    }

    if crate::db::sessions::has_running_session(&state.db).await? {
        return Err(ApiError::Conflict(
            "A search session is already running".to_string(),
        ));
    }

    let minimum_results = match request.minimum_results {
        Some(n) => n,
        None => crate::db::settings::get_minimum_results(&state.db).await?,
    };

    let session = SearchSession::new(
        query.to_string(),
        request.location.clone(),
        sources,
        request.time_budget_seconds,
        minimum_results,
    );
    crate::db::sessions::save_session(&state.db, &session).await?;
    Ok(session)
}

/// POST /search
///
/// Blocking variant: runs the whole session within the request and returns
/// the final candidate list. The session is still registered for
/// cancellation and visible on /events while it runs.
pub async fn run_search(
    State(state): State<AppState>,
    Json(request): Json<StartSearchRequest>,
) -> ApiResult<Json<SearchResultsResponse>> {
    let session = admit_session(&state, &request).await?;
    let session_id = session.session_id;

    let token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session_id, token.clone());

    tracing::info!(session_id = %session_id, query = %session.query, "Blocking search started");

    let outcome = execute_search(state.clone(), session, token).await;
    state.cancellation_tokens.write().await.remove(&session_id);

    let output = match outcome {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Search workflow failed");
            *state.last_error.write().await = Some(e.to_string());
            mark_failed(&state, session_id, &e).await;
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    let final_state = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .map(|s| s.state)
        .unwrap_or(SessionState::Done);

    Ok(Json(SearchResultsResponse {
        session_id,
        state: final_state,
        candidates: output.candidates,
        metadata: Some(output.metadata),
    }))
}

/// POST /search/start
///
/// Validates the request, persists a new session, and spawns the search
/// workflow in the background. Poll /search/status or subscribe to /events
/// for progress.
pub async fn start_search(
    State(state): State<AppState>,
    Json(request): Json<StartSearchRequest>,
) -> ApiResult<Json<StartSearchResponse>> {
    let session = admit_session(&state, &request).await?;

    let response = StartSearchResponse {
        session_id: session.session_id,
        state: session.state,
        time_budget_seconds: session.time_budget_seconds,
        sources: if session.requested_sources.is_empty() {
            state.registry.platforms()
        } else {
            session.requested_sources.clone()
        },
        started_at: session.started_at,
    };

    let token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session.session_id, token.clone());

    tracing::info!(
        session_id = %session.session_id,
        query = %session.query,
        "Search session started"
    );

    let state_clone = state.clone();
    tokio::spawn(async move {
        let session_id = session.session_id;
        if let Err(e) = execute_search(state_clone.clone(), session, token).await {
            tracing::error!(session_id = %session_id, error = %e, "Search workflow failed");
            *state_clone.last_error.write().await = Some(e.to_string());
            mark_failed(&state_clone, session_id, &e).await;
        }
        state_clone
            .cancellation_tokens
            .write()
            .await
            .remove(&session_id);
    });

    Ok(Json(response))
}

/// GET /search/status/{session_id}
pub async fn get_search_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SearchStatusResponse>> {
    let session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Search session not found: {}", session_id)))?;

    Ok(Json(SearchStatusResponse {
        session_id: session.session_id,
        state: session.state,
        query: session.query,
        progress: session.progress,
        errors: session.errors,
        started_at: session.started_at,
        ended_at: session.ended_at,
    }))
}

/// POST /search/cancel/{session_id}
///
/// Signals the running workflow through its cancellation token; the
/// orchestrator finalizes with whatever the pool holds. A session whose
/// task is gone (service restart) is transitioned directly.
pub async fn cancel_search(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelSearchResponse>> {
    let mut session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Search session not found: {}", session_id)))?;

    if session.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Search session already in terminal state: {}",
            session.state
        )));
    }

    let token = state.cancellation_tokens.read().await.get(&session_id).cloned();
    match token {
        Some(token) => {
            token.cancel();
            tracing::info!(session_id = %session_id, "Cancellation requested");
        }
        None => {
            // No live task for this session; close it out directly
            session.transition_to(SessionState::Cancelled);
            crate::db::sessions::save_session(&state.db, &session).await?;
            tracing::info!(session_id = %session_id, "Stale session cancelled directly");
        }
    }

    Ok(Json(CancelSearchResponse {
        session_id: session.session_id,
        state: session.state,
        candidates_found: session.progress.candidates_found,
        cancelled_at: session.ended_at.unwrap_or_else(chrono::Utc::now),
    }))
}

/// GET /search/results/{session_id}
///
/// Serves the persisted candidate list and output metadata once the session
/// has finished; 409 while it is still running.
pub async fn get_search_results(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SearchResultsResponse>> {
    let session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Search session not found: {}", session_id)))?;

    if !session.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Search session still running ({})",
            session.state
        )));
    }

    let candidates = crate::db::candidates::load_candidates(&state.db, session_id).await?;
    let metadata = crate::db::sessions::load_metadata(&state.db, session_id).await?;

    Ok(Json(SearchResultsResponse {
        session_id: session.session_id,
        state: session.state,
        candidates,
        metadata,
    }))
}

/// Background task for workflow execution
async fn execute_search(
    state: AppState,
    session: SearchSession,
    token: CancellationToken,
) -> anyhow::Result<crate::services::SearchOutput> {
    let guarantee = crate::db::settings::get_guarantee_config(&state.db).await?;
    let orchestrator = SearchOrchestrator::new(
        state.db.clone(),
        state.event_bus.clone(),
        std::sync::Arc::clone(&state.registry),
        std::sync::Arc::clone(&state.validator),
        state.enrichers.clone(),
        TierScorer::new(state.scoring.clone()),
        guarantee,
        std::sync::Arc::clone(&state.stats),
    );

    Ok(orchestrator.run(session, token).await?)
}

/// Last-resort failure handling: the session row must reach FAILED even if
/// the orchestrator died before its first transition
async fn mark_failed(state: &AppState, session_id: Uuid, error: &anyhow::Error) {
    match crate::db::sessions::load_session(&state.db, session_id).await {
        Ok(Some(mut session)) if !session.is_terminal() => {
            session.add_error("workflow", error.to_string());
            session.transition_to(SessionState::Failed);
            if let Err(save_err) = crate::db::sessions::save_session(&state.db, &session).await {
                tracing::error!(
                    session_id = %session_id,
                    error = %save_err,
                    "Failed to persist FAILED state"
                );
            }
            state.event_bus.emit_lossy(ScoutEvent::SearchFailed {
                session_id,
                error: error.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(_) => {}
        Err(db_err) => {
            tracing::error!(
                session_id = %session_id,
                error = %db_err,
                "Failed to load session while marking it failed"
            );
        }
    }
}

/// Build search workflow routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(run_search))
        .route("/search/start", post(start_search))
        .route("/search/status/:session_id", get(get_search_status))
        .route("/search/cancel/:session_id", post(cancel_search))
        .route("/search/results/:session_id", get(get_search_results))
}
