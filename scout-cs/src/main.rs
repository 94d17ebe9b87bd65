//! scout-cs - Candidate Sourcing microservice
//!
//! Fans out over public developer platforms under a wall-clock budget,
//! deduplicates and scores what comes back, and guarantees a minimum
//! result set or degrades explicitly. HTTP REST + SSE on port 5740.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scout_common::config::{
    default_config_path, ensure_directory_exists, load_toml_config, resolve_root_folder,
};
use scout_common::events::EventBus;
use scout_cs::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Bootstrap configuration before logging so the log level applies
    let config_path = default_config_path("scout-cs")?;
    let toml_config = load_toml_config(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(toml_config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting scout-cs (Candidate Sourcing) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    let root_folder = resolve_root_folder("SCOUT_ROOT_FOLDER", &toml_config);
    ensure_directory_exists(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = root_folder.join("scout-cs.db");
    info!("Database: {}", db_path.display());
    let db_pool = scout_cs::db::init_database(&db_path).await?;

    // Sessions left mid-flight by a previous process can never finish
    let stale = scout_cs::db::sessions::cleanup_stale_sessions(&db_pool).await?;
    if stale > 0 {
        info!("Closed {} stale search sessions from a previous run", stale);
    }

    // Database is authoritative for API keys; ENV and TOML values migrate in
    let config = scout_cs::config::resolve_config(&db_pool, &toml_config).await?;

    let event_bus = EventBus::new(100);
    let (registry, validator, enrichers) = scout_cs::wire_pipeline(&config);
    info!("{} source adapters registered", registry.len());

    let state = AppState::new(db_pool, event_bus, registry, validator, enrichers);
    let app = scout_cs::build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
