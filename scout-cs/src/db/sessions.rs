//! Search session persistence
//!
//! Sessions are upserted on every state transition and progress update so
//! status polls and restarts see a consistent row. The state column stores
//! the serde form of [`SessionState`] (quoted uppercase), so terminal-state
//! filters in SQL match the JSON representation.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use scout_common::{Error, Result};

use crate::models::search_session::{
    SearchProgress, SearchSession, SessionError, SessionState,
};
use crate::types::Platform;

/// Save or update a search session row
pub async fn save_session(pool: &SqlitePool, session: &SearchSession) -> Result<()> {
    let session_id = session.session_id.to_string();
    let state = serde_json::to_string(&session.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let requested_sources = serde_json::to_string(&session.requested_sources)
        .map_err(|e| Error::Internal(format!("Failed to serialize sources: {}", e)))?;
    let errors = serde_json::to_string(&session.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;
    let started_at = session.started_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO search_sessions (
            session_id, state, query, location, requested_sources,
            time_budget_seconds, minimum_results,
            sources_completed, sources_total, progress_percentage,
            current_operation, candidates_found, errors, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            state = excluded.state,
            sources_completed = excluded.sources_completed,
            sources_total = excluded.sources_total,
            progress_percentage = excluded.progress_percentage,
            current_operation = excluded.current_operation,
            candidates_found = excluded.candidates_found,
            errors = excluded.errors,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(&session_id)
    .bind(&state)
    .bind(&session.query)
    .bind(&session.location)
    .bind(&requested_sources)
    .bind(session.time_budget_seconds as i64)
    .bind(session.minimum_results as i64)
    .bind(session.progress.sources_completed as i64)
    .bind(session.progress.sources_total as i64)
    .bind(session.progress.percentage)
    .bind(&session.progress.current_operation)
    .bind(session.progress.candidates_found as i64)
    .bind(&errors)
    .bind(&started_at)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a search session row by id
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<SearchSession>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, state, query, location, requested_sources,
               time_budget_seconds, minimum_results,
               sources_completed, sources_total, progress_percentage,
               current_operation, candidates_found, errors, started_at, ended_at
        FROM search_sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(session_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Store the final output metadata for a finished session
///
/// Written once when the session reaches a terminal state; the results
/// endpoint serves it back alongside the persisted candidates.
pub async fn save_metadata(
    pool: &SqlitePool,
    session_id: Uuid,
    metadata: &crate::services::SearchMetadata,
) -> Result<()> {
    let json = serde_json::to_string(metadata)
        .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;

    sqlx::query("UPDATE search_sessions SET result_metadata = ? WHERE session_id = ?")
        .bind(&json)
        .bind(session_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Load the final output metadata, if the session has finished
pub async fn load_metadata(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<Option<crate::services::SearchMetadata>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT result_metadata FROM search_sessions WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(pool)
            .await?;

    match row.and_then(|(json,)| json) {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| Error::Internal(format!("Failed to deserialize metadata: {}", e))),
        None => Ok(None),
    }
}

/// True when any session is outside the terminal states
pub async fn has_running_session(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM search_sessions
        WHERE state NOT IN ('"DONE"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Mark sessions from a previous process run as cancelled
///
/// A non-terminal session at startup belongs to a dead background task and
/// will never progress.
pub async fn cleanup_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE search_sessions
        SET state = '"CANCELLED"',
            ended_at = ?,
            current_operation = 'Search cancelled - service was restarted'
        WHERE state NOT IN ('"DONE"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SearchSession> {
    let session_id_str: String = row.get("session_id");
    let session_id = Uuid::parse_str(&session_id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))?;

    let state: String = row.get("state");
    let state: SessionState = serde_json::from_str(&state)
        .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

    let requested_sources: String = row.get("requested_sources");
    let requested_sources: Vec<Platform> = serde_json::from_str(&requested_sources)
        .map_err(|e| Error::Internal(format!("Failed to deserialize sources: {}", e)))?;

    let errors: String = row.get("errors");
    let errors: Vec<SessionError> = serde_json::from_str(&errors)
        .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let elapsed_seconds = match ended_at {
        Some(end) => (end - started_at).num_seconds().max(0) as u64,
        None => (chrono::Utc::now() - started_at).num_seconds().max(0) as u64,
    };

    let progress = SearchProgress {
        sources_completed: row.get::<i64, _>("sources_completed") as usize,
        sources_total: row.get::<i64, _>("sources_total") as usize,
        percentage: row.get("progress_percentage"),
        current_operation: row.get("current_operation"),
        candidates_found: row.get::<i64, _>("candidates_found") as usize,
        elapsed_seconds,
        estimated_remaining_seconds: None, // Recalculated on demand
    };

    Ok(SearchSession {
        session_id,
        state,
        query: row.get("query"),
        location: row.get("location"),
        requested_sources,
        time_budget_seconds: row.get::<i64, _>("time_budget_seconds") as u64,
        minimum_results: row.get::<i64, _>("minimum_results") as usize,
        progress,
        errors,
        started_at,
        ended_at,
    })
}
