//! Database access for scout-cs
//!
//! Thin sqlx/SQLite persistence boundary: finalized candidates, session
//! rows for status polling across restarts, and the key/value settings
//! table backing runtime configuration. Search-time state lives in memory;
//! the database only records outcomes.

pub mod candidates;
pub mod sessions;
pub mod settings;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use scout_common::Result;

/// Open (or create) the service database and initialize its schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps status polls readable while a search session is writing
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the scout-cs tables when missing (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_sessions (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            query TEXT NOT NULL,
            location TEXT,
            requested_sources TEXT NOT NULL DEFAULT '[]',
            time_budget_seconds INTEGER NOT NULL,
            minimum_results INTEGER NOT NULL,
            sources_completed INTEGER NOT NULL DEFAULT 0,
            sources_total INTEGER NOT NULL DEFAULT 0,
            progress_percentage REAL NOT NULL DEFAULT 0.0,
            current_operation TEXT NOT NULL DEFAULT '',
            candidates_found INTEGER NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]',
            result_metadata TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Full record as JSON alongside the columns queries filter and sort on
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            session_id TEXT NOT NULL,
            identity_key TEXT NOT NULL,
            source_platform TEXT NOT NULL,
            tier TEXT NOT NULL,
            overall_score REAL NOT NULL,
            collected_at TEXT NOT NULL,
            record TEXT NOT NULL,
            PRIMARY KEY (session_id, identity_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database tables initialized (settings, search_sessions, candidates)");

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_tables(&pool).await.unwrap();
    pool
}
