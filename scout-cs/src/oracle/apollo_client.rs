//! Apollo.io enrichment client
//!
//! Matches a candidate against Apollo's people database by name or email and
//! fills in title, contact, and employment history. A miss is not an error:
//! the enricher returns an empty enrichment and the record proceeds as-is.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::oracle::{CandidateEnricher, Enrichment, OracleError};

const APOLLO_MATCH_URL: &str = "https://api.apollo.io/api/v1/people/match";
const HTTP_TIMEOUT_SECS: u64 = 30;
const REQUESTS_PER_MINUTE: u32 = 50;

#[derive(Debug, Deserialize)]
struct MatchResponse {
    person: Option<ApolloPerson>,
}

#[derive(Debug, Deserialize)]
struct ApolloPerson {
    title: Option<String>,
    email: Option<String>,
    headline: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    #[serde(default)]
    employment_history: Vec<Employment>,
}

#[derive(Debug, Deserialize)]
struct Employment {
    start_date: Option<String>,
}

/// Apollo people-match API client
pub struct ApolloClient {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    api_key: String,
}

impl ApolloClient {
    pub fn new(api_key: String) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        // Safe: REQUESTS_PER_MINUTE is non-zero
        let quota =
            governor::Quota::per_minute(std::num::NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap());

        Ok(Self {
            http_client,
            rate_limiter: governor::RateLimiter::direct(quota),
            api_key,
        })
    }
}

#[async_trait]
impl CandidateEnricher for ApolloClient {
    fn name(&self) -> &'static str {
        "apollo"
    }

    async fn enrich(&self, record: &CandidateRecord) -> Result<Enrichment, OracleError> {
        // Apollo matches on name or email; nothing to send means nothing to gain
        if record.name.is_none() && record.email.is_none() {
            return Ok(Enrichment::default());
        }

        self.rate_limiter.until_ready().await;

        let body = json!({
            "name": record.name,
            "email": record.email,
        });

        debug!(name = ?record.name, "Querying Apollo people match");

        let response = self
            .http_client
            .post(APOLLO_MATCH_URL)
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == 404 {
            return Ok(Enrichment::default());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let matched: MatchResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        Ok(matched.person.map(enrichment_from).unwrap_or_default())
    }
}

fn enrichment_from(person: ApolloPerson) -> Enrichment {
    let location = join_location(&person.city, &person.state, &person.country);
    let experience_years = years_since_earliest_start(&person.employment_history);
    Enrichment {
        email: person.email,
        title: person.title,
        location,
        summary: person.headline,
        experience_years,
        skills: Vec::new(),
    }
}

fn join_location(
    city: &Option<String>,
    state: &Option<String>,
    country: &Option<String>,
) -> Option<String> {
    let parts: Vec<&str> = [city, state, country]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .filter(|p| !p.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Rough tenure from the earliest employment start year
fn years_since_earliest_start(history: &[Employment]) -> Option<f64> {
    let earliest_year = history
        .iter()
        .filter_map(|e| e.start_date.as_deref())
        .filter_map(|d| d.get(0..4)?.parse::<i32>().ok())
        .min()?;
    let years = (Utc::now().year() - earliest_year).max(0);
    Some(years as f64)
}
