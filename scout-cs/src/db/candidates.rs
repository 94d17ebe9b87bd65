//! Finalized candidate persistence
//!
//! One row per (session, identity key), written once when a session reaches
//! its terminal state. The full record is stored as JSON next to the scalar
//! columns result queries sort and filter on; re-running a search upserts
//! rather than duplicating.

use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use scout_common::{Error, Result};

use crate::fusion::IdentityKey;
use crate::models::candidate::CandidateRecord;

/// Upsert a session's final candidate pool
///
/// Records that somehow lost their identity fields are skipped with a
/// warning; the merge store should have rejected them long before this
/// point. Returns the number of rows written.
pub async fn save_candidates(
    pool: &SqlitePool,
    session_id: Uuid,
    candidates: &[CandidateRecord],
) -> Result<usize> {
    let session_id = session_id.to_string();
    let mut saved = 0;

    for candidate in candidates {
        let Some(key) = IdentityKey::derive(candidate) else {
            warn!(
                platform = %candidate.source_platform,
                "Skipping candidate without identity at persistence"
            );
            continue;
        };

        let record = serde_json::to_string(candidate)
            .map_err(|e| Error::Internal(format!("Failed to serialize candidate: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO candidates (
                session_id, identity_key, source_platform, tier,
                overall_score, collected_at, record
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id, identity_key) DO UPDATE SET
                source_platform = excluded.source_platform,
                tier = excluded.tier,
                overall_score = excluded.overall_score,
                collected_at = excluded.collected_at,
                record = excluded.record
            "#,
        )
        .bind(&session_id)
        .bind(key.as_str())
        .bind(candidate.source_platform.as_str())
        .bind(candidate.tier.as_str())
        .bind(candidate.overall_score)
        .bind(candidate.collected_at.to_rfc3339())
        .bind(&record)
        .execute(pool)
        .await?;

        saved += 1;
    }

    Ok(saved)
}

/// Load a session's candidates ordered by overall score descending
pub async fn load_candidates(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<CandidateRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT record
        FROM candidates
        WHERE session_id = ?
        ORDER BY overall_score DESC, identity_key ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let record: String = row.get("record");
            serde_json::from_str(&record)
                .map_err(|e| Error::Internal(format!("Failed to deserialize candidate: {}", e)))
        })
        .collect()
}

/// Count of stored candidates for one session
pub async fn count_candidates(pool: &SqlitePool, session_id: Uuid) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::candidate::Tier;
    use crate::types::Platform;

    fn scored_record(email: &str, overall: f64, tier: Tier) -> CandidateRecord {
        let mut r = CandidateRecord::new(Platform::Github, "test");
        r.email = Some(email.to_string());
        r.overall_score = overall;
        r.tier = tier;
        r
    }

    #[tokio::test]
    async fn test_save_and_load_ordered_by_score() {
        let pool = test_pool().await;
        let session_id = Uuid::new_v4();

        let candidates = vec![
            scored_record("low@example.com", 42.0, Tier::Bronze),
            scored_record("high@example.com", 88.5, Tier::Gold),
            scored_record("mid@example.com", 61.0, Tier::Silver),
        ];

        let saved = save_candidates(&pool, session_id, &candidates).await.unwrap();
        assert_eq!(saved, 3);
        assert_eq!(count_candidates(&pool, session_id).await.unwrap(), 3);

        let loaded = load_candidates(&pool, session_id).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].email.as_deref(), Some("high@example.com"));
        assert_eq!(loaded[0].tier, Tier::Gold);
        assert_eq!(loaded[2].email.as_deref(), Some("low@example.com"));
    }

    #[tokio::test]
    async fn test_resave_upserts_by_identity() {
        let pool = test_pool().await;
        let session_id = Uuid::new_v4();

        save_candidates(
            &pool,
            session_id,
            &[scored_record("ada@example.com", 50.0, Tier::Bronze)],
        )
        .await
        .unwrap();

        save_candidates(
            &pool,
            session_id,
            &[scored_record("ada@example.com", 80.0, Tier::Gold)],
        )
        .await
        .unwrap();

        let loaded = load_candidates(&pool, session_id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].overall_score, 80.0);
    }

    #[tokio::test]
    async fn test_identityless_record_is_skipped() {
        let pool = test_pool().await;
        let session_id = Uuid::new_v4();

        let anonymous = CandidateRecord::new(Platform::Google, "web_search");
        let saved = save_candidates(&pool, session_id, &[anonymous]).await.unwrap();
        assert_eq!(saved, 0);
        assert_eq!(count_candidates(&pool, session_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_candidates() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        save_candidates(
            &pool,
            first,
            &[scored_record("ada@example.com", 70.0, Tier::Silver)],
        )
        .await
        .unwrap();

        assert_eq!(count_candidates(&pool, first).await.unwrap(), 1);
        assert!(load_candidates(&pool, second).await.unwrap().is_empty());
    }
}
