//! Settings database operations
//!
//! Key/value accessors over the `settings` table. API keys land here
//! through the 3-tier resolution in `config` (database is authoritative);
//! the guarantee tunables get typed getters with compiled-in defaults.

use sqlx::{Pool, Sqlite};
use scout_common::{Error, Result};

use crate::services::quality_guarantor::{
    GuaranteeConfig, DEFAULT_MAX_RETRIES, DEFAULT_MINIMUM_RESULTS, DEFAULT_QUALITY_THRESHOLD,
};

/// Get a stored API key or endpoint value
///
/// Returns None when the key has never been set.
pub async fn get_api_key(db: &Pool<Sqlite>, name: &str) -> Result<Option<String>> {
    get_setting::<String>(db, name).await
}

/// Set an API key or endpoint value (authoritative tier)
pub async fn set_api_key(db: &Pool<Sqlite>, name: &str, value: String) -> Result<()> {
    set_setting(db, name, value).await
}

/// Minimum high-quality candidates the guarantee requires
///
/// **Default:** 10
pub async fn get_minimum_results(db: &Pool<Sqlite>) -> Result<usize> {
    get_setting(db, "cs_minimum_results")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MINIMUM_RESULTS))
}

/// Quality score a candidate must reach to count toward the guarantee
///
/// **Default:** 60.0
pub async fn get_quality_threshold(db: &Pool<Sqlite>) -> Result<f64> {
    get_setting(db, "cs_quality_threshold")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_QUALITY_THRESHOLD))
}

/// Fallback rounds allowed after the first evaluation fails
///
/// **Default:** 3
pub async fn get_max_retries(db: &Pool<Sqlite>) -> Result<u32> {
    get_setting(db, "cs_max_retries")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_RETRIES))
}

/// Load the guarantee tunables as one config object
pub async fn get_guarantee_config(db: &Pool<Sqlite>) -> Result<GuaranteeConfig> {
    Ok(GuaranteeConfig {
        minimum_results: get_minimum_results(db).await?,
        quality_threshold: get_quality_threshold(db).await?,
        max_retries: get_max_retries(db).await?,
    })
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_api_key_roundtrip() {
        let pool = test_pool().await;

        assert_eq!(get_api_key(&pool, "github_token").await.unwrap(), None);

        set_api_key(&pool, "github_token", "ghp_test123".to_string())
            .await
            .unwrap();
        assert_eq!(
            get_api_key(&pool, "github_token").await.unwrap(),
            Some("ghp_test123".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_api_key_updates_in_place() {
        let pool = test_pool().await;

        set_api_key(&pool, "llm_api_key", "old".to_string()).await.unwrap();
        set_api_key(&pool, "llm_api_key", "new".to_string()).await.unwrap();

        assert_eq!(
            get_api_key(&pool, "llm_api_key").await.unwrap(),
            Some("new".to_string())
        );

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'llm_api_key'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_guarantee_tunables_default_when_unset() {
        let pool = test_pool().await;

        let config = get_guarantee_config(&pool).await.unwrap();
        assert_eq!(config.minimum_results, DEFAULT_MINIMUM_RESULTS);
        assert_eq!(config.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_guarantee_tunables_read_stored_values() {
        let pool = test_pool().await;

        sqlx::query("INSERT INTO settings (key, value) VALUES ('cs_minimum_results', '5')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('cs_quality_threshold', '70.5')")
            .execute(&pool)
            .await
            .unwrap();

        let config = get_guarantee_config(&pool).await.unwrap();
        assert_eq!(config.minimum_results, 5);
        assert_eq!(config.quality_threshold, 70.5);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }
}
