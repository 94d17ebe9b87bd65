//! LinkedIn source adapter
//!
//! LinkedIn has no public search API, so this adapter finds public profile
//! pages through the shared web search endpoint with a `site:` restricted
//! query. The profile slug from the URL becomes the platform username and
//! the result title is split into name and headline. Fidelity is lower
//! than the API-backed sources; the scorer's platform reliability constant
//! accounts for that.

use std::sync::Arc;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::sources::websearch::{WebHit, WebSearchClient};
use crate::types::{text_mentions_term, AdapterError, Platform, SearchCriteria, SourceAdapter};

/// Public-profile web search adapter
pub struct LinkedinAdapter {
    client: Arc<WebSearchClient>,
}

impl LinkedinAdapter {
    pub fn new(client: Arc<WebSearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for LinkedinAdapter {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let mut query = format!("site:linkedin.com/in {}", criteria.query);
        if let Some(location) = &criteria.location {
            query.push_str(&format!(" \"{}\"", location));
        }

        let hits = self.client.search(&query, criteria.per_source_cap * 2).await?;
        let records = records_from_hits(&hits, criteria);
        debug!(hits = hits.len(), records = records.len(), "LinkedIn profiles mapped");
        Ok(records)
    }
}

fn records_from_hits(hits: &[WebHit], criteria: &SearchCriteria) -> Vec<CandidateRecord> {
    let mut records = Vec::new();
    let mut seen_slugs: Vec<String> = Vec::new();

    for hit in hits {
        let Some(slug) = profile_slug(&hit.url) else {
            continue;
        };
        if seen_slugs.contains(&slug) {
            continue;
        }
        seen_slugs.push(slug.clone());

        let mut record = CandidateRecord::new(Platform::Linkedin, "linkedin_websearch");
        record.platform_username = Some(slug);
        record.profile_url = Some(hit.url.clone());

        if let Some((name, headline)) = split_profile_title(&hit.title) {
            record.set_name(name);
            if let Some(headline) = headline {
                record.title = Some(headline);
            }
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

/// Profile slug from a linkedin.com/in/<slug> URL, lowercased
fn profile_slug(url: &str) -> Option<String> {
    let after = url.split("linkedin.com/in/").nth(1)?;
    let slug: String = after
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#'))
        .collect();
    let slug = slug.trim().to_lowercase();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Split "Name - Headline | LinkedIn" into name and optional headline
fn split_profile_title(title: &str) -> Option<(String, Option<String>)> {
    let trimmed = title.trim();
    let without_site = trimmed
        .strip_suffix("| LinkedIn")
        .or_else(|| trimmed.strip_suffix("- LinkedIn"))
        .unwrap_or(trimmed)
        .trim();

    if without_site.is_empty() {
        return None;
    }

    match without_site.split_once(" - ") {
        Some((name, headline)) => {
            let name = name.trim();
            let headline = headline.trim();
            if name.is_empty() {
                None
            } else {
                Some((
                    name.to_string(),
                    (!headline.is_empty()).then(|| headline.to_string()),
                ))
            }
        }
        None => Some((without_site.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_extraction() {
        assert_eq!(
            profile_slug("https://www.linkedin.com/in/jane-doe-12345/"),
            Some("jane-doe-12345".to_string())
        );
        assert_eq!(
            profile_slug("https://de.linkedin.com/in/MaxM?trk=profile"),
            Some("maxm".to_string())
        );
        assert!(profile_slug("https://www.linkedin.com/company/acme").is_none());
        assert!(profile_slug("https://example.com/in/nobody").is_none());
    }

    #[test]
    fn test_title_split_with_headline() {
        let (name, headline) =
            split_profile_title("Jane Doe - Staff Engineer at Acme | LinkedIn").unwrap();
        assert_eq!(name, "Jane Doe");
        assert_eq!(headline.as_deref(), Some("Staff Engineer at Acme"));
    }

    #[test]
    fn test_title_split_name_only() {
        let (name, headline) = split_profile_title("Jane Doe | LinkedIn").unwrap();
        assert_eq!(name, "Jane Doe");
        assert!(headline.is_none());
    }

    #[test]
    fn test_hits_deduplicate_by_slug() {
        let hits = vec![
            WebHit {
                title: "Sam Lee - Data Engineer | LinkedIn".to_string(),
                url: "https://www.linkedin.com/in/samlee".to_string(),
                content: "Spark and airflow pipelines".to_string(),
            },
            WebHit {
                title: "Sam Lee - Data Engineer | LinkedIn".to_string(),
                url: "https://uk.linkedin.com/in/samlee?trk=x".to_string(),
                content: String::new(),
            },
        ];
        let criteria = SearchCriteria::new("spark", None);

        let records = records_from_hits(&hits, &criteria);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].platform_username.as_deref(), Some("samlee"));
        assert_eq!(records[0].title.as_deref(), Some("Data Engineer"));
        assert_eq!(records[0].skills, vec!["spark"]);
        assert!(records[0].has_identity());
    }
}
