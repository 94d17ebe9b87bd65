//! Perplexity web-research enricher
//!
//! Uses Perplexity's online models to research a candidate across the public
//! web and distill what it finds into the enrichment fields. Like the LLM
//! validator, an unparseable answer degrades to an empty enrichment rather
//! than failing the candidate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::candidate::CandidateRecord;
use crate::oracle::llm_validator::strip_code_fence;
use crate::oracle::{CandidateEnricher, Enrichment, OracleError};

const PERPLEXITY_CHAT_URL: &str = "https://api.perplexity.ai/chat/completions";
const PERPLEXITY_MODEL: &str = "sonar";
const HTTP_TIMEOUT_SECS: u64 = 45;
const REQUESTS_PER_MINUTE: u32 = 20;
const MAX_COMPLETION_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str = "You research software professionals on the public web. \
Respond with exactly one JSON object, no prose, no code fences: \
{\"title\": string or null, \"location\": string or null, \"summary\": string or null, \
\"experience_years\": number or null, \"skills\": [string]}. \
Include only facts you found; use null for anything uncertain.";

#[derive(Debug, Serialize)]
struct ResearchRequest {
    model: &'static str,
    messages: Vec<ResearchMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ResearchMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ResearchResponse {
    choices: Vec<ResearchChoice>,
}

#[derive(Debug, Deserialize)]
struct ResearchChoice {
    message: ResearchContent,
}

#[derive(Debug, Deserialize)]
struct ResearchContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EnrichmentPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    experience_years: Option<f64>,
    #[serde(default)]
    skills: Vec<String>,
}

/// Perplexity online-research client
pub struct PerplexityClient {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    api_key: String,
}

impl PerplexityClient {
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

    fn research_prompt(record: &CandidateRecord) -> String {
        let mut identifiers = Vec::new();
        if let Some(name) = &record.name {
            identifiers.push(format!("name: {name}"));
        }
        if let Some(username) = &record.platform_username {
            identifiers.push(format!(
                "{} username: {username}",
                record.source_platform.as_str()
            ));
        }
        if let Some(url) = &record.profile_url {
            identifiers.push(format!("profile: {url}"));
        }
        format!(
            "Research this software professional and report what you find. {}",
            identifiers.join(", ")
        )
    }
}

#[async_trait]
impl CandidateEnricher for PerplexityClient {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn enrich(&self, record: &CandidateRecord) -> Result<Enrichment, OracleError> {
        if record.name.is_none() && record.platform_username.is_none() {
            return Ok(Enrichment::default());
        }

        self.rate_limiter.until_ready().await;

        let request = ResearchRequest {
            model: PERPLEXITY_MODEL,
            messages: vec![
                ResearchMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ResearchMessage {
                    role: "user",
                    content: Self::research_prompt(record),
                },
            ],
            temperature: 0.1,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        debug!(name = ?record.name, "Requesting Perplexity research");

        let response = self
            .http_client
            .post(PERPLEXITY_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let research: ResearchResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let content = research
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        match parse_enrichment(content) {
            Some(enrichment) => Ok(enrichment),
            None => {
                warn!(content_len = content.len(), "Unparseable research answer, skipping enrichment");
                Ok(Enrichment::default())
            }
        }
    }
}

fn parse_enrichment(content: &str) -> Option<Enrichment> {
    let payload: EnrichmentPayload = serde_json::from_str(strip_code_fence(content)).ok()?;
    Some(Enrichment {
        email: None,
        title: payload.title,
        location: payload.location,
        summary: payload.summary,
        experience_years: payload.experience_years.filter(|y| y.is_finite() && *y >= 0.0),
        skills: payload.skills,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    #[test]
    fn test_parse_enrichment_payload() {
        let enrichment = parse_enrichment(
            r#"{"title": "SRE", "location": "Oslo", "summary": null,
                "experience_years": 7, "skills": ["go", "terraform"]}"#,
        )
        .unwrap();
        assert_eq!(enrichment.title.as_deref(), Some("SRE"));
        assert_eq!(enrichment.experience_years, Some(7.0));
        assert_eq!(enrichment.skills.len(), 2);
    }

    #[test]
    fn test_parse_rejects_prose_and_negative_years() {
        assert!(parse_enrichment("I could not find this person.").is_none());

        let enrichment =
            parse_enrichment(r#"{"experience_years": -3, "skills": []}"#).unwrap();
        assert!(enrichment.experience_years.is_none());
    }

    #[test]
    fn test_research_prompt_names_the_identifiers() {
        let mut record = CandidateRecord::new(Platform::Github, "github_user_search");
        record.set_name("Radia Perlman");
        record.platform_username = Some("rperlman".to_string());

        let prompt = PerplexityClient::research_prompt(&record);
        assert!(prompt.contains("Radia Perlman"));
        assert!(prompt.contains("github username: rperlman"));
    }
}
