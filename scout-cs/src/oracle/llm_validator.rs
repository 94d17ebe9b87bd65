//! LLM-backed candidate validator
//!
//! Sends a compact profile summary to an OpenAI-compatible chat completions
//! endpoint and parses a strict-JSON verdict. Anything the model returns
//! that does not parse is treated as no opinion: the neutral verdict, never
//! an error, so a chatty model cannot stall the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::candidate::{CandidateRecord, DimensionScores};
use crate::oracle::{CandidateValidator, OracleError, Verdict};
use crate::types::SearchCriteria;

const HTTP_TIMEOUT_SECS: u64 = 30;
const MAX_COMPLETION_TOKENS: u32 = 400;

const SYSTEM_PROMPT: &str = "You evaluate candidate profiles for a talent search. \
Respond with exactly one JSON object, no prose, no code fences: \
{\"is_valid\": bool, \"confidence\": number 0-1, \"reason\": string or null, \
\"scores\": {\"skill_match\": 0-100, \"experience\": 0-100, \"reputation\": 0-100, \
\"freshness\": 0-100, \"social_proof\": 0-100} or null}. \
is_valid means the profile describes a real person relevant to the query.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Verdict shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct VerdictPayload {
    is_valid: bool,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    scores: Option<DimensionScores>,
}

/// Chat-completions validator for any OpenAI-compatible endpoint
pub struct LlmValidator {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmValidator {
    pub fn new(endpoint: String, api_key: String, model: String) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
            model,
        })
    }

    fn profile_summary(record: &CandidateRecord, criteria: &SearchCriteria) -> String {
        json!({
            "query": criteria.query,
            "location": criteria.location,
            "candidate": {
                "name": record.name,
                "username": record.platform_username,
                "platform": record.source_platform.as_str(),
                "title": record.title,
                "location": record.location,
                "summary": record.summary,
                "skills": record.skills,
                "experience_years": record.experience_years,
                "followers": record.metrics.followers,
                "reputation_points": record.metrics.reputation_points,
            },
        })
        .to_string()
    }
}

#[async_trait]
impl CandidateValidator for LlmValidator {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn validate(
        &self,
        record: &CandidateRecord,
        criteria: &SearchCriteria,
    ) -> Result<Verdict, OracleError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::profile_summary(record, criteria),
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Requesting LLM verdict");

        let response = self
            .http_client
            .post(&self.endpoint)
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

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        match parse_verdict(content) {
            Some(verdict) => Ok(verdict),
            None => {
                warn!(content_len = content.len(), "Unparseable LLM verdict, treating as neutral");
                Ok(Verdict::neutral())
            }
        }
    }
}

/// Parse a model reply into a verdict, tolerating code fences
fn parse_verdict(content: &str) -> Option<Verdict> {
    let payload: VerdictPayload = serde_json::from_str(strip_code_fence(content)).ok()?;
    if !payload.confidence.is_finite() {
        return None;
    }
    Some(Verdict {
        is_valid: payload.is_valid,
        confidence: payload.confidence.clamp(0.0, 1.0),
        reason: payload.reason,
        dimension_scores: payload.scores,
    })
}

/// Strip a leading/trailing markdown code fence if the model added one
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json_verdict() {
        let verdict = parse_verdict(
            r#"{"is_valid": true, "confidence": 0.85, "reason": "active profile", "scores": null}"#,
        )
        .unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.confidence, 0.85);
        assert_eq!(verdict.reason.as_deref(), Some("active profile"));
        assert!(verdict.dimension_scores.is_none());
    }

    #[test]
    fn test_parse_fenced_verdict_with_scores() {
        let content = "```json\n{\"is_valid\": true, \"confidence\": 0.9, \"reason\": null, \
\"scores\": {\"skill_match\": 88, \"experience\": 70, \"reputation\": 60, \
\"freshness\": 95, \"social_proof\": 40}}\n```";
        let verdict = parse_verdict(content).unwrap();
        let scores = verdict.dimension_scores.unwrap();
        assert_eq!(scores.skill_match, 88.0);
        assert_eq!(scores.freshness, 95.0);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_verdict("The candidate looks valid to me.").is_none());
    }

    #[test]
    fn test_parse_clamps_out_of_range_confidence() {
        let verdict =
            parse_verdict(r#"{"is_valid": false, "confidence": 3.5}"#).unwrap();
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_strip_code_fence_passthrough() {
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }
}
