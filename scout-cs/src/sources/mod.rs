//! Source adapters
//!
//! One adapter per supported platform, all behind [`SourceAdapter`], plus
//! the registry the orchestrator fans out over. Adapters are registered at
//! startup based on which credentials the configuration provides; a
//! platform without its prerequisites simply never enters the registry.
//!
//! `fetch_one` is the single place a source attempt happens: it races the
//! adapter against its allocated timeout and always yields an outcome, so
//! one slow or broken provider can neither block nor poison the round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use scout_common::config::TomlConfig;

use crate::models::candidate::CandidateRecord;
use crate::types::{AdapterError, Platform, SearchCriteria, SourceAdapter};

pub mod devto;
pub mod github;
pub mod kaggle;
pub mod linkedin;
pub mod stackoverflow;
pub mod websearch;

pub use devto::DevtoAdapter;
pub use github::GithubAdapter;
pub use kaggle::KaggleAdapter;
pub use linkedin::LinkedinAdapter;
pub use stackoverflow::StackoverflowAdapter;
pub use websearch::{WebSearchAdapter, WebSearchClient};

/// Result of one source attempt, success or not
#[derive(Debug)]
pub struct SourceOutcome {
    pub platform: Platform,
    pub result: Result<Vec<CandidateRecord>, AdapterError>,
    pub latency: Duration,
}

impl SourceOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self.result, Err(AdapterError::Timeout(_)))
    }
}

/// Platform-keyed adapter collection
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire up every adapter the configuration has credentials for
    ///
    /// GitHub, Stack Overflow, and Dev.to work without credentials (at
    /// reduced rate limits where applicable). Kaggle requires an API
    /// key pair; the web search and LinkedIn adapters require a search
    /// endpoint.
    pub fn from_config(config: &TomlConfig) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(GithubAdapter::new(config.github_token.clone())));
        registry.register(Arc::new(StackoverflowAdapter::new(
            config.stackexchange_key.clone(),
        )));
        registry.register(Arc::new(DevtoAdapter::new()));

        match (&config.kaggle_username, &config.kaggle_key) {
            (Some(username), Some(key)) => {
                registry.register(Arc::new(KaggleAdapter::new(username.clone(), key.clone())));
            }
            _ => warn!("Kaggle credentials not configured, kaggle source disabled"),
        }

        match &config.websearch_endpoint {
            Some(endpoint) => {
                let client = Arc::new(WebSearchClient::new(endpoint.clone()));
                registry.register(Arc::new(WebSearchAdapter::new(Arc::clone(&client))));
                registry.register(Arc::new(LinkedinAdapter::new(client)));
            }
            None => warn!(
                "Web search endpoint not configured, google and linkedin sources disabled"
            ),
        }

        info!(
            sources = ?registry.platforms().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            "Source adapters registered"
        );
        registry
    }

    /// Register an adapter under the platform it reports
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.adapters.contains_key(&platform)
    }

    /// Registered platforms in default priority order
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::all()
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Run one adapter against its allocated timeout
    ///
    /// Never panics and never blocks past the timeout. Latency is measured
    /// here so success and failure feed the same statistics.
    pub async fn fetch_one(
        &self,
        platform: Platform,
        criteria: &SearchCriteria,
        timeout: Duration,
    ) -> SourceOutcome {
        let started = Instant::now();
        let result = match self.adapters.get(&platform) {
            Some(adapter) => {
                match tokio::time::timeout(timeout, adapter.search(criteria)).await {
                    Ok(result) => result,
                    Err(_) => Err(AdapterError::Timeout(timeout)),
                }
            }
            None => Err(AdapterError::NotConfigured(platform)),
        };
        SourceOutcome {
            platform,
            result,
            latency: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdapter {
        platform: Platform,
        delay: Duration,
        count: usize,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for FixedAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn search(
            &self,
            _criteria: &SearchCriteria,
        ) -> Result<Vec<CandidateRecord>, AdapterError> {
            tokio::time::sleep(self.delay).await;
            Ok((0..self.count)
                .map(|i| {
                    let mut r = CandidateRecord::new(self.platform, "test");
                    r.set_name(format!("Person {i}"));
                    r
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_fetch_one_returns_records_within_timeout() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FixedAdapter {
            platform: Platform::Github,
            delay: Duration::from_millis(5),
            count: 3,
        }));

        let outcome = registry
            .fetch_one(
                Platform::Github,
                &SearchCriteria::new("rust", None),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(outcome.platform, Platform::Github);
        assert!(!outcome.timed_out());
        assert_eq!(outcome.result.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_one_times_out_slow_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FixedAdapter {
            platform: Platform::Devto,
            delay: Duration::from_secs(5),
            count: 1,
        }));

        let outcome = registry
            .fetch_one(
                Platform::Devto,
                &SearchCriteria::new("rust", None),
                Duration::from_millis(20),
            )
            .await;

        assert!(outcome.timed_out());
        assert!(outcome.latency < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_fetch_one_reports_unregistered_platform() {
        let registry = AdapterRegistry::new();
        let outcome = registry
            .fetch_one(
                Platform::Kaggle,
                &SearchCriteria::new("rust", None),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(
            outcome.result,
            Err(AdapterError::NotConfigured(Platform::Kaggle))
        ));
    }

    #[test]
    fn test_platforms_follow_priority_order() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FixedAdapter {
            platform: Platform::Google,
            delay: Duration::ZERO,
            count: 0,
        }));
        registry.register(Arc::new(FixedAdapter {
            platform: Platform::Github,
            delay: Duration::ZERO,
            count: 0,
        }));

        assert_eq!(registry.platforms(), vec![Platform::Github, Platform::Google]);
    }
}
