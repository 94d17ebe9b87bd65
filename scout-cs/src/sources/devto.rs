//! Dev.to source adapter
//!
//! Indirect discovery: the Forem articles API has no people search, so the
//! adapter pulls recent articles for the primary skill tag and aggregates
//! their authors. Prolific authors collapse into one record carrying their
//! article count, latest publication date, and the union of tags they
//! write under. Requires no credentials.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::types::{AdapterError, Platform, SearchCriteria, SourceAdapter};

const DEVTO_API_URL: &str = "https://dev.to/api";
const HTTP_TIMEOUT_SECS: u64 = 20;
const REQUESTS_PER_MINUTE: u32 = 30;

/// Articles fetched per round; several usually share an author
const ARTICLE_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tag_list: Vec<String>,
    user: ArticleAuthor,
}

#[derive(Debug, Deserialize)]
struct ArticleAuthor {
    #[serde(default)]
    name: Option<String>,
    username: String,
}

/// Dev.to article-author adapter
pub struct DevtoAdapter {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DevtoAdapter {
    pub fn new() -> Self {
        // Safe: REQUESTS_PER_MINUTE is non-zero
        let quota =
            governor::Quota::per_minute(std::num::NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap());

        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client (system error)"),
            rate_limiter: governor::RateLimiter::direct(quota),
        }
    }

    async fn articles_for_tag(&self, tag: &str) -> Result<Vec<Article>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(format!("{}/articles", DEVTO_API_URL))
            .query(&[
                ("tag", tag),
                ("per_page", &ARTICLE_PAGE_SIZE.to_string()),
                ("top", "90"),
            ])
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

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

impl Default for DevtoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DevtoAdapter {
    fn platform(&self) -> Platform {
        Platform::Devto
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let Some(tag) = criteria.primary_skill() else {
            debug!("No skill tag in query, dev.to yields nothing");
            return Ok(Vec::new());
        };

        let articles = self.articles_for_tag(tag).await?;
        let records = aggregate_authors(articles, criteria.per_source_cap);
        debug!(tag = %tag, records = records.len(), "Dev.to authors aggregated");
        Ok(records)
    }
}

/// Collapse articles into one record per author, in first-seen order
fn aggregate_authors(articles: Vec<Article>, cap: usize) -> Vec<CandidateRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut by_author: HashMap<String, CandidateRecord> = HashMap::new();

    for article in articles {
        let username = article.user.username.clone();
        let record = by_author.entry(username.clone()).or_insert_with(|| {
            let mut record = CandidateRecord::new(Platform::Devto, "devto_articles");
            record.platform_username = Some(username.clone());
            record.profile_url = Some(format!("https://dev.to/{}", username));
            if let Some(name) = &article.user.name {
                record.set_name(name);
            }
            record.metrics.contributions = Some(0);
            order.push(username.clone());
            record
        });

        record.metrics.contributions = record.metrics.contributions.map(|c| c + 1);
        for tag in &article.tag_list {
            record.add_skill(tag);
        }
        if let Some(published) = article.published_at {
            let newer = record
                .metrics
                .last_active
                .map(|current| published > current)
                .unwrap_or(true);
            if newer {
                record.metrics.last_active = Some(published);
            }
        }
    }

    order
        .into_iter()
        .take(cap)
        .filter_map(|username| by_author.remove(&username))
        .collect()
}
