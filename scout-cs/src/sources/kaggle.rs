//! Kaggle source adapter
//!
//! Discovers data scientists through the datasets they publish: a dataset
//! search for the query terms, aggregated into one record per creator.
//! Kaggle's API requires an account key pair for every call, so the
//! registry only wires this adapter when both are configured.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::types::{text_mentions_term, AdapterError, Platform, SearchCriteria, SourceAdapter};

const KAGGLE_API_URL: &str = "https://www.kaggle.com/api/v1";
const HTTP_TIMEOUT_SECS: u64 = 20;
const REQUESTS_PER_MINUTE: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    creator_name: Option<String>,
    #[serde(default)]
    creator_url: Option<String>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Kaggle dataset-creator adapter
pub struct KaggleAdapter {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    username: String,
    api_key: String,
}

impl KaggleAdapter {
    pub fn new(username: String, api_key: String) -> Self {
        // Safe: REQUESTS_PER_MINUTE is non-zero
        let quota =
            governor::Quota::per_minute(std::num::NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap());

        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client (system error)"),
            rate_limiter: governor::RateLimiter::direct(quota),
            username,
            api_key,
        }
    }

    async fn list_datasets(&self, search: &str) -> Result<Vec<Dataset>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(format!("{}/datasets/list", KAGGLE_API_URL))
            .basic_auth(&self.username, Some(&self.api_key))
            .query(&[("search", search), ("page", "1")])
            .send()
            .await?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(AdapterError::MissingCredentials(
                "kaggle api rejected the configured key pair".to_string(),
            ));
        }
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

#[async_trait::async_trait]
impl SourceAdapter for KaggleAdapter {
    fn platform(&self) -> Platform {
        Platform::Kaggle
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let search = if criteria.skill_terms.is_empty() {
            criteria.query.clone()
        } else {
            criteria.skill_terms.join(" ")
        };

        let datasets = self.list_datasets(&search).await?;
        let records = aggregate_creators(datasets, criteria);
        debug!(search = %search, records = records.len(), "Kaggle creators aggregated");
        Ok(records)
    }
}

/// Collapse datasets into one record per creator, in first-seen order
fn aggregate_creators(datasets: Vec<Dataset>, criteria: &SearchCriteria) -> Vec<CandidateRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut by_creator: HashMap<String, CandidateRecord> = HashMap::new();

    for dataset in datasets {
        let Some(slug) = dataset.creator_url.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let slug = slug.to_string();

        let record = by_creator.entry(slug.clone()).or_insert_with(|| {
            let mut record = CandidateRecord::new(Platform::Kaggle, "kaggle_datasets");
            record.platform_username = Some(slug.clone());
            record.profile_url = Some(format!("https://www.kaggle.com/{}", slug));
            if let Some(name) = &dataset.creator_name {
                record.set_name(name);
            }
            record.metrics.contributions = Some(0);
            order.push(slug.clone());
            record
        });

        record.metrics.contributions = record.metrics.contributions.map(|c| c + 1);
        if let Some(title) = &dataset.title {
            for term in &criteria.skill_terms {
                if text_mentions_term(title, term) {
                    record.add_skill(term);
                }
            }
        }
        if let Some(updated) = dataset.last_updated {
            let newer = record
                .metrics
                .last_active
                .map(|current| updated > current)
                .unwrap_or(true);
            if newer {
                record.metrics.last_active = Some(updated);
            }
        }
    }

    order
        .into_iter()
        .take(criteria.per_source_cap)
        .filter_map(|slug| by_creator.remove(&slug))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(creator: &str, name: &str, title: &str, days_ago: i64) -> Dataset {
        Dataset {
            title: Some(title.to_string()),
            creator_name: Some(name.to_string()),
            creator_url: Some(creator.to_string()),
            last_updated: Some(Utc::now() - chrono::Duration::days(days_ago)),
        }
    }

    #[test]
    fn test_creators_collapse_and_pick_up_title_skills() {
        let datasets = vec![
            dataset("dsmith", "Dana Smith", "Pytorch image models", 10),
            dataset("dsmith", "Dana Smith", "Tabular pytorch benchmarks", 3),
            dataset("kv", "Kai Verma", "Weather history", 60),
        ];
        let criteria = SearchCriteria::new("pytorch", None);

        let records = aggregate_creators(datasets, &criteria);
        assert_eq!(records.len(), 2);

        let dana = &records[0];
        assert_eq!(dana.platform_username.as_deref(), Some("dsmith"));
        assert_eq!(dana.metrics.contributions, Some(2));
        assert_eq!(dana.skills, vec!["pytorch"]);
        assert_eq!(
            dana.profile_url.as_deref(),
            Some("https://www.kaggle.com/dsmith")
        );

        // No pytorch in Kai's titles
        assert!(records[1].skills.is_empty());
    }

    #[test]
    fn test_creatorless_datasets_are_skipped() {
        let datasets = vec![Dataset {
            title: Some("Orphan data".to_string()),
            creator_name: None,
            creator_url: None,
            last_updated: None,
        }];
        let criteria = SearchCriteria::new("data", None);
        assert!(aggregate_creators(datasets, &criteria).is_empty());
    }

    #[test]
    fn test_dataset_parses_camel_case_fields() {
        let json = r#"[{"ref": "u/d", "title": "Iris", "creatorName": "R. A. Fisher",
            "creatorUrl": "rafisher", "lastUpdated": "2023-11-10T08:00:00Z",
            "voteCount": 120}]"#;
        let datasets: Vec<Dataset> = serde_json::from_str(json).unwrap();
        assert_eq!(datasets[0].creator_url.as_deref(), Some("rafisher"));
        assert!(datasets[0].last_updated.is_some());
    }
}
