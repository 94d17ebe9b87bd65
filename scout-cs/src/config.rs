//! Configuration resolution for scout-cs
//!
//! Multi-tier resolution with Database → ENV → TOML priority for every API
//! key and endpoint the adapters and oracles use. All keys are optional:
//! a missing key disables or downgrades the feature it serves instead of
//! failing startup. Keys found in a lower tier are written back to the
//! database so the settings API shows the effective configuration.

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use scout_common::config::TomlConfig;
use scout_common::Result;

/// One resolvable configuration key
///
/// `name` doubles as the settings-table key; `env_var` is its environment
/// override.
#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub name: &'static str,
    pub env_var: &'static str,
}

/// Every key the 3-tier resolution covers, in settings-API display order
pub const CONFIG_KEYS: &[KeySpec] = &[
    KeySpec { name: "github_token", env_var: "SCOUT_GITHUB_TOKEN" },
    KeySpec { name: "stackexchange_key", env_var: "SCOUT_STACKEXCHANGE_KEY" },
    KeySpec { name: "kaggle_username", env_var: "SCOUT_KAGGLE_USERNAME" },
    KeySpec { name: "kaggle_key", env_var: "SCOUT_KAGGLE_KEY" },
    KeySpec { name: "apollo_api_key", env_var: "SCOUT_APOLLO_API_KEY" },
    KeySpec { name: "perplexity_api_key", env_var: "SCOUT_PERPLEXITY_API_KEY" },
    KeySpec { name: "llm_api_key", env_var: "SCOUT_LLM_API_KEY" },
    KeySpec { name: "llm_endpoint", env_var: "SCOUT_LLM_ENDPOINT" },
    KeySpec { name: "llm_model", env_var: "SCOUT_LLM_MODEL" },
    KeySpec { name: "websearch_endpoint", env_var: "SCOUT_WEBSEARCH_ENDPOINT" },
];

/// Validate a key value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Look up a key spec by name
pub fn key_spec(name: &str) -> Option<&'static KeySpec> {
    CONFIG_KEYS.iter().find(|spec| spec.name == name)
}

fn toml_value<'a>(config: &'a TomlConfig, name: &str) -> Option<&'a String> {
    match name {
        "github_token" => config.github_token.as_ref(),
        "stackexchange_key" => config.stackexchange_key.as_ref(),
        "kaggle_username" => config.kaggle_username.as_ref(),
        "kaggle_key" => config.kaggle_key.as_ref(),
        "apollo_api_key" => config.apollo_api_key.as_ref(),
        "perplexity_api_key" => config.perplexity_api_key.as_ref(),
        "llm_api_key" => config.llm_api_key.as_ref(),
        "llm_endpoint" => config.llm_endpoint.as_ref(),
        "llm_model" => config.llm_model.as_ref(),
        "websearch_endpoint" => config.websearch_endpoint.as_ref(),
        _ => None,
    }
}

/// Resolve one key through the Database → ENV → TOML tiers
///
/// Warns when the key is configured in more than one tier, and migrates an
/// ENV/TOML-sourced value into the database so the next resolution finds it
/// in the authoritative tier.
pub async fn resolve_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    spec: &KeySpec,
) -> Result<Option<String>> {
    let db_value = crate::db::settings::get_api_key(db, spec.name)
        .await?
        .filter(|v| is_valid_key(v));
    let env_value = std::env::var(spec.env_var).ok().filter(|v| is_valid_key(v));
    let toml_val = toml_value(toml_config, spec.name)
        .filter(|v| is_valid_key(v))
        .cloned();

    let mut sources = Vec::new();
    if db_value.is_some() {
        sources.push("database");
    }
    if env_value.is_some() {
        sources.push("environment");
    }
    if toml_val.is_some() {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            spec.name,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(value) = db_value {
        return Ok(Some(value));
    }

    let (value, source) = match (env_value, toml_val) {
        (Some(v), _) => (v, "environment"),
        (None, Some(v)) => (v, "TOML"),
        (None, None) => return Ok(None),
    };

    // Write back so the database tier is authoritative from now on
    crate::db::settings::set_api_key(db, spec.name, value.clone()).await?;
    info!("{} loaded from {} and migrated to database", spec.name, source);

    Ok(Some(value))
}

/// Resolve every key and return the effective configuration
///
/// The returned config carries the bootstrap fields (port, logging, root
/// folder) unchanged and each key field replaced with its resolved value.
pub async fn resolve_config(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<TomlConfig> {
    let mut resolved = toml_config.clone();

    for spec in CONFIG_KEYS {
        let value = resolve_key(db, toml_config, spec).await?;
        match spec.name {
            "github_token" => resolved.github_token = value,
            "stackexchange_key" => resolved.stackexchange_key = value,
            "kaggle_username" => resolved.kaggle_username = value,
            "kaggle_key" => resolved.kaggle_key = value,
            "apollo_api_key" => resolved.apollo_api_key = value,
            "perplexity_api_key" => resolved.perplexity_api_key = value,
            "llm_api_key" => resolved.llm_api_key = value,
            "llm_endpoint" => resolved.llm_endpoint = value,
            "llm_model" => resolved.llm_model = value,
            "websearch_endpoint" => resolved.websearch_endpoint = value,
            other => warn!("Unhandled config key in resolution: {}", other),
        }
    }

    Ok(resolved)
}

/// Mask a stored secret for display: first 4 characters plus length
///
/// Endpoints and model names are configuration rather than secrets; they
/// are returned unmasked by the settings API.
pub fn mask_key(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}… ({} chars)", visible, value.chars().count())
}

/// True when a key's value is safe to show unmasked
pub fn is_public_key(name: &str) -> bool {
    matches!(name, "llm_endpoint" | "llm_model" | "websearch_endpoint" | "kaggle_username")
}
