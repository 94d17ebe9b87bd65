//! scout-cs library interface
//!
//! Exposes the pipeline and HTTP surface for integration testing.

pub mod api;
pub mod budget;
pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod models;
pub mod oracle;
pub mod scoring;
pub mod services;
pub mod sources;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use scout_common::config::TomlConfig;
use scout_common::events::EventBus;

use crate::budget::StatsRegistry;
use crate::oracle::{
    ApolloClient, CandidateEnricher, CandidateValidator, HeuristicValidator, LlmValidator,
    PerplexityClient,
};
use crate::scoring::ScoringConfig;
use crate::sources::AdapterRegistry;

/// Model used when the validation endpoint is configured without one
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Application state shared across handlers
///
/// The registry, validator, and enrichers are wired once at startup from the
/// resolved configuration; every search session reads them through the state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Source adapters available to sessions
    pub registry: Arc<AdapterRegistry>,
    /// Validation oracle (LLM-backed or the deterministic fallback)
    pub validator: Arc<dyn CandidateValidator>,
    /// Enrichment oracles, applied in order
    pub enrichers: Vec<Arc<dyn CandidateEnricher>>,
    /// Scoring weights, bonuses, and tier thresholds
    pub scoring: ScoringConfig,
    /// Process-lifetime per-platform performance statistics
    pub stats: Arc<StatsRegistry>,
    /// Cancellation tokens for active search sessions
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        registry: Arc<AdapterRegistry>,
        validator: Arc<dyn CandidateValidator>,
        enrichers: Vec<Arc<dyn CandidateEnricher>>,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry,
            validator,
            enrichers,
            scoring: ScoringConfig::default(),
            stats: Arc::new(StatsRegistry::new()),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Wire the pipeline components the resolved configuration supports
///
/// Missing credentials downgrade rather than fail: no LLM endpoint means the
/// deterministic validator, a missing enrichment key means that enricher is
/// simply absent.
pub fn wire_pipeline(
    config: &TomlConfig,
) -> (
    Arc<AdapterRegistry>,
    Arc<dyn CandidateValidator>,
    Vec<Arc<dyn CandidateEnricher>>,
) {
    let registry = Arc::new(AdapterRegistry::from_config(config));

    let validator: Arc<dyn CandidateValidator> =
        match (&config.llm_endpoint, &config.llm_api_key) {
            (Some(endpoint), Some(key)) => {
                let model = config
                    .llm_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
                match LlmValidator::new(endpoint.clone(), key.clone(), model) {
                    Ok(v) => Arc::new(v),
                    Err(e) => {
                        warn!("LLM validator unavailable ({}), using heuristic validator", e);
                        Arc::new(HeuristicValidator)
                    }
                }
            }
            _ => {
                warn!("LLM endpoint not configured, using heuristic validator");
                Arc::new(HeuristicValidator)
            }
        };

    let mut enrichers: Vec<Arc<dyn CandidateEnricher>> = Vec::new();
    if let Some(key) = &config.apollo_api_key {
        match ApolloClient::new(key.clone()) {
            Ok(client) => enrichers.push(Arc::new(client)),
            Err(e) => warn!("Apollo enricher unavailable: {}", e),
        }
    }
    if let Some(key) = &config.perplexity_api_key {
        match PerplexityClient::new(key.clone()) {
            Ok(client) => enrichers.push(Arc::new(client)),
            Err(e) => warn!("Perplexity enricher unavailable: {}", e),
        }
    }

    (registry, validator, enrichers)
}

/// Build application router
///
/// CORS is permissive: the UI is served from its own origin and this API
/// carries no cookies or ambient credentials.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::search_routes())
        .route("/events", get(api::event_stream))
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
