//! GitHub source adapter
//!
//! Two-phase collection: the user search API finds logins matching the
//! skill terms, then the top hits are hydrated through the users API for
//! name, bio, location, email, and follower counts. Hydration is capped
//! well below the search cap because each profile is its own request and
//! the time budget is shared with every other source.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::types::{text_mentions_term, AdapterError, Platform, SearchCriteria, SourceAdapter};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "scout-cs/0.1.0 (candidate sourcing)";
const HTTP_TIMEOUT_SECS: u64 = 20;
const REQUESTS_PER_MINUTE: u32 = 30;

/// Profiles hydrated per round; each costs one API request
const HYDRATION_LIMIT: usize = 10;

/// Technologies recognized when scanning a bio for skills
const KNOWN_TECH: &[&str] = &[
    "rust", "python", "javascript", "typescript", "go", "golang", "java", "kotlin", "swift",
    "c++", "c#", "ruby", "php", "scala", "elixir", "react", "vue", "angular", "node",
    "django", "rails", "kubernetes", "docker", "terraform", "aws", "gcp", "azure",
    "postgres", "postgresql", "mysql", "redis", "kafka", "tensorflow", "pytorch",
];

#[derive(Debug, Deserialize)]
struct UserSearchResponse {
    #[serde(default)]
    items: Vec<UserSearchItem>,
}

#[derive(Debug, Deserialize)]
struct UserSearchItem {
    login: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    login: String,
    name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    html_url: String,
    followers: Option<u64>,
    public_repos: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// GitHub user search adapter
pub struct GithubAdapter {
    http_client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    token: Option<String>,
}

impl GithubAdapter {
    pub fn new(token: Option<String>) -> Self {
        // Safe: REQUESTS_PER_MINUTE is non-zero
        let quota =
            governor::Quota::per_minute(std::num::NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap());

        Self {
            http_client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client (system error)"),
            rate_limiter: governor::RateLimiter::direct(quota),
            token,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, AdapterError> {
        self.rate_limiter.until_ready().await;

        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == 403 || status == 429 {
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

    async fn hydrate(&self, login: &str) -> Result<UserProfile, AdapterError> {
        self.get_json(&format!("{}/users/{}", GITHUB_API_URL, login), &[])
            .await
    }
}

#[async_trait::async_trait]
impl SourceAdapter for GithubAdapter {
    fn platform(&self) -> Platform {
        Platform::Github
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let query = build_search_query(criteria);
        debug!(query = %query, "GitHub user search");

        let search: UserSearchResponse = self
            .get_json(
                &format!("{}/search/users", GITHUB_API_URL),
                &[
                    ("q", query),
                    ("per_page", criteria.per_source_cap.to_string()),
                ],
            )
            .await?;

        let mut records = Vec::with_capacity(search.items.len());
        for (index, item) in search.items.iter().enumerate() {
            if index < HYDRATION_LIMIT {
                match self.hydrate(&item.login).await {
                    Ok(profile) => {
                        records.push(record_from_profile(profile, criteria));
                        continue;
                    }
                    Err(e) => {
                        debug!(login = %item.login, error = %e, "Profile hydration failed, keeping search stub");
                    }
                }
            }
            records.push(record_from_stub(item));
        }

        debug!(count = records.len(), "GitHub search complete");
        Ok(records)
    }
}

/// Search qualifier string: skill terms against bio, plus location
fn build_search_query(criteria: &SearchCriteria) -> String {
    let mut query = if criteria.skill_terms.is_empty() {
        criteria.query.clone()
    } else {
        criteria.skill_terms.join(" ")
    };
    query.push_str(" type:user");
    if let Some(location) = &criteria.location {
        query.push_str(&format!(" location:\"{}\"", location));
    }
    query
}

fn record_from_stub(item: &UserSearchItem) -> CandidateRecord {
    let mut record = CandidateRecord::new(Platform::Github, "github_user_search");
    record.platform_username = Some(item.login.clone());
    record.profile_url = Some(item.html_url.clone());
    record
}

fn record_from_profile(profile: UserProfile, criteria: &SearchCriteria) -> CandidateRecord {
    let mut record = CandidateRecord::new(Platform::Github, "github_user_search");
    record.platform_username = Some(profile.login);
    record.profile_url = Some(profile.html_url);
    record.email = profile.email;
    record.location = profile.location;
    if let Some(name) = profile.name {
        record.set_name(name);
    }

    if let Some(bio) = &profile.bio {
        record.summary = Some(bio.clone());
        for skill in skills_from_bio(bio, criteria) {
            record.add_skill(&skill);
        }
    }

    record.metrics.followers = profile.followers;
    record.metrics.contributions = profile.public_repos;
    record.metrics.last_active = profile.updated_at;

    // Account age bounds years in the field from below
    if let Some(created) = profile.created_at {
        let years = (Utc::now().year() - created.year()).max(0);
        record.experience_years = Some(years as f64);
    }

    record
}

/// Skills a bio mentions: query terms first, then well-known technologies
fn skills_from_bio(bio: &str, criteria: &SearchCriteria) -> Vec<String> {
    let mut skills = Vec::new();
    for term in &criteria.skill_terms {
        if text_mentions_term(bio, term) && !skills.contains(term) {
            skills.push(term.clone());
        }
    }
    for tech in KNOWN_TECH {
        if text_mentions_term(bio, tech) && !skills.iter().any(|s| s == tech) {
            skills.push((*tech).to_string());
        }
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_uses_skill_terms_and_location() {
        let criteria =
            SearchCriteria::new("senior rust developer", Some("Berlin".to_string()));
        assert_eq!(build_search_query(&criteria), "rust type:user location:\"Berlin\"");
    }

    #[test]
    fn test_query_falls_back_to_raw_text() {
        let mut criteria = SearchCriteria::new("developer", None);
        criteria.skill_terms.clear();
        assert_eq!(build_search_query(&criteria), "developer type:user");
    }

    #[test]
    fn test_profile_maps_to_record() {
        let profile = UserProfile {
            login: "octocat".to_string(),
            name: Some("Mona Octocat".to_string()),
            email: Some("mona@example.com".to_string()),
            bio: Some("Rust and Kubernetes, some Python".to_string()),
            location: Some("San Francisco".to_string()),
            html_url: "https://github.com/octocat".to_string(),
            followers: Some(4200),
            public_repos: Some(88),
            created_at: Some(Utc::now() - chrono::Duration::days(6 * 365)),
            updated_at: Some(Utc::now()),
        };
        let criteria = SearchCriteria::new("rust", None);

        let record = record_from_profile(profile, &criteria);
        assert_eq!(record.name.as_deref(), Some("Mona Octocat"));
        assert_eq!(record.platform_username.as_deref(), Some("octocat"));
        assert!(record.skills.contains(&"rust".to_string()));
        assert!(record.skills.contains(&"kubernetes".to_string()));
        assert_eq!(record.metrics.followers, Some(4200));
        assert!(record.experience_years.unwrap() >= 5.0);
        assert!(record.has_identity());
    }

    #[test]
    fn test_stub_record_still_carries_identity() {
        let item = UserSearchItem {
            login: "ghost".to_string(),
            html_url: "https://github.com/ghost".to_string(),
        };
        let record = record_from_stub(&item);
        assert!(record.has_identity());
        assert!(record.name.is_none());
    }

    #[test]
    fn test_bio_skills_put_query_terms_first() {
        let criteria = SearchCriteria::new("kubernetes", None);
        let skills = skills_from_bio("Python and kubernetes at scale", &criteria);
        assert_eq!(skills[0], "kubernetes");
        assert!(skills.contains(&"python".to_string()));
    }

    #[test]
    fn test_bio_skills_need_whole_tokens() {
        let criteria = SearchCriteria::new("go", None);
        let skills = skills_from_bio("Going places with category theory", &criteria);
        assert!(skills.is_empty());
    }

    #[test]
    fn test_search_response_parses_github_shape() {
        let json = r#"{"total_count": 2, "incomplete_results": false,
            "items": [{"login": "a", "html_url": "https://github.com/a", "id": 1},
                      {"login": "b", "html_url": "https://github.com/b", "id": 2}]}"#;
        let parsed: UserSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].login, "a");
    }
}
