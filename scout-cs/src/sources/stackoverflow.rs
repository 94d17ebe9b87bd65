//! Stack Overflow source adapter
//!
//! Prefers the tag top-answerers endpoint: people who answer well inside
//! the queried technology are exactly the profiles worth surfacing. With no
//! usable skill tag the adapter falls back to a reputation-sorted name
//! search. An API key raises the daily quota but is not required.
//!
//! Stack Exchange responses are always gzip compressed, handled by the
//! HTTP client transparently.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::types::{AdapterError, Platform, SearchCriteria, SourceAdapter};

const STACKEXCHANGE_API_URL: &str = "https://api.stackexchange.com/2.3";
const SITE: &str = "stackoverflow";
const HTTP_TIMEOUT_SECS: u64 = 20;
const REQUESTS_PER_MINUTE: u32 = 25;

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopAnswerer {
    user: ShallowUser,
    post_count: u64,
}

#[derive(Debug, Deserialize)]
struct ShallowUser {
    user_id: u64,
    display_name: String,
    #[serde(default)]
    reputation: Option<u64>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FullUser {
    user_id: u64,
    display_name: String,
    #[serde(default)]
    reputation: Option<u64>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    answer_count: Option<u64>,
    /// Epoch seconds
    #[serde(default)]
    last_access_date: Option<i64>,
}

/// Stack Overflow top-answerer adapter
pub struct StackoverflowAdapter {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    api_key: Option<String>,
}

impl StackoverflowAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        // Safe: REQUESTS_PER_MINUTE is non-zero
        let quota =
            governor::Quota::per_minute(std::num::NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap());

        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client (system error)"),
            rate_limiter: governor::RateLimiter::direct(quota),
            api_key,
        }
    }

    async fn get_items<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let mut query: Vec<(&str, String)> = vec![("site", SITE.to_string())];
        query.extend_from_slice(params);
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let response = self
            .http_client
            .get(format!("{}{}", STACKEXCHANGE_API_URL, path))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == 429 {
            return Err(AdapterError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ItemsResponse<T> = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        if let Some(message) = body.error_message {
            return Err(AdapterError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body.items)
    }

    async fn top_answerers(
        &self,
        tag: &str,
        cap: usize,
    ) -> Result<Vec<TopAnswerer>, AdapterError> {
        self.get_items(
            &format!("/tags/{}/top-answerers/all_time", tag),
            &[("pagesize", cap.to_string())],
        )
        .await
    }

    async fn users_by_name(&self, name: &str, cap: usize) -> Result<Vec<FullUser>, AdapterError> {
        self.get_items(
            "/users",
            &[
                ("inname", name.to_string()),
                ("order", "desc".to_string()),
                ("sort", "reputation".to_string()),
                ("pagesize", cap.to_string()),
            ],
        )
        .await
    }
}

#[async_trait::async_trait]
impl SourceAdapter for StackoverflowAdapter {
    fn platform(&self) -> Platform {
        Platform::Stackoverflow
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        if let Some(tag) = criteria.primary_skill() {
            debug!(tag = %tag, "Stack Overflow top answerers");
            let answerers = self.top_answerers(tag, criteria.per_source_cap).await?;
            if !answerers.is_empty() {
                return Ok(answerers
                    .iter()
                    .map(|a| record_from_answerer(a, tag))
                    .collect());
            }
        }

        debug!(query = %criteria.query, "Stack Overflow user name search");
        let users = self
            .users_by_name(&criteria.query, criteria.per_source_cap)
            .await?;
        Ok(users.into_iter().map(record_from_user).collect())
    }
}

fn record_from_answerer(answerer: &TopAnswerer, tag: &str) -> CandidateRecord {
    let mut record = CandidateRecord::new(Platform::Stackoverflow, "stackoverflow_top_answerers");
    record.platform_username = Some(answerer.user.user_id.to_string());
    record.set_name(&answerer.user.display_name);
    record.profile_url = answerer.user.link.clone();
    record.metrics.reputation_points = answerer.user.reputation;
    record.metrics.contributions = Some(answerer.post_count);
    record.add_skill(tag);
    record
}

fn record_from_user(user: FullUser) -> CandidateRecord {
    let mut record = CandidateRecord::new(Platform::Stackoverflow, "stackoverflow_user_search");
    record.platform_username = Some(user.user_id.to_string());
    record.set_name(&user.display_name);
    record.profile_url = user.link;
    record.location = user.location;
    record.metrics.reputation_points = user.reputation;
    record.metrics.contributions = user.answer_count;
    record.metrics.last_active = user
        .last_access_date
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    record
}
