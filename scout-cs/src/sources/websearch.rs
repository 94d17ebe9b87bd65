//! General web search source
//!
//! Queries a SearxNG-compatible metasearch endpoint and mines people out of
//! ordinary result snippets. The lowest-fidelity source in the registry:
//! hits that do not surface a plausible person name are dropped outright,
//! since a record without identity can never merge.
//!
//! The underlying [`WebSearchClient`] is shared with the LinkedIn adapter,
//! which reuses the same endpoint with a site-restricted query.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::types::{text_mentions_term, AdapterError, Platform, SearchCriteria, SourceAdapter};

const HTTP_TIMEOUT_SECS: u64 = 20;

/// One search hit from the metasearch endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WebHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WebHit>,
}

/// Thin client for a SearxNG-style JSON search API
pub struct WebSearchClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl WebSearchClient {
    pub fn new(endpoint: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client (system error)");
        Self {
            http_client,
            endpoint,
        }
    }

    /// Run one query and return raw hits
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, AdapterError> {
        debug!(query = %query, "Querying web search endpoint");

        let response = self
            .http_client
            .get(format!("{}/search", self.endpoint.trim_end_matches('/')))
            .query(&[("q", query), ("format", "json")])
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

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(parsed.results.into_iter().take(limit).collect())
    }
}

/// Adapter turning general web hits into candidate records
pub struct WebSearchAdapter {
    client: std::sync::Arc<WebSearchClient>,
}

impl WebSearchAdapter {
    pub fn new(client: std::sync::Arc<WebSearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let mut query = criteria.query.clone();
        if let Some(location) = &criteria.location {
            query.push(' ');
            query.push_str(location);
        }

        let hits = self.client.search(&query, criteria.per_source_cap * 2).await?;
        let records = records_from_hits(&hits, criteria);
        debug!(hits = hits.len(), records = records.len(), "Web search mapped");
        Ok(records)
    }
}

fn records_from_hits(hits: &[WebHit], criteria: &SearchCriteria) -> Vec<CandidateRecord> {
    let mut records = Vec::new();
    for hit in hits {
        let Some(name) = extract_person_name(&hit.title) else {
            continue;
        };

        let mut record = CandidateRecord::new(Platform::Google, "web_search");
        record.set_name(&name);
        if !hit.url.is_empty() {
            record.profile_url = Some(hit.url.clone());
        }
        if !hit.content.is_empty() {
            record.summary = Some(hit.content.clone());
        }

        let haystack = format!("{} {}", hit.title, hit.content);
        for term in &criteria.skill_terms {
            if text_mentions_term(&haystack, term) {
                record.add_skill(term);
            }
        }

        records.push(record);
        if records.len() >= criteria.per_source_cap {
            break;
        }
    }
    records
}

/// Pull a plausible person name off the front of a result title
///
/// Accepts 2 to 4 words, each starting with an uppercase letter, before the
/// first title separator. "Top 10 Rust Developers" style listicles fail the
/// capitalization test on their numeric tokens and are skipped.
fn extract_person_name(title: &str) -> Option<String> {
    let head = title
        .split(" - ")
        .next()
        .and_then(|t| t.split(" | ").next())?
        .trim();

    if head.is_empty() || head.len() > 60 {
        return None;
    }

    let words: Vec<&str> = head.split_whitespace().collect();
    if !(2..=4).contains(&words.len()) {
        return None;
    }
    let looks_like_name = words.iter().all(|w| {
        w.chars()
            .next()
            .map(|c| c.is_alphabetic() && c.is_uppercase())
            .unwrap_or(false)
    });
    if looks_like_name {
        Some(head.to_string())
    } else {
        None
    }
}
