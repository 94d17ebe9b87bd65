//! Settings API
//!
//! GET /api/settings lists the effective configuration with secrets masked;
//! POST /api/settings/{name} writes one value to the database, the
//! authoritative configuration tier.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{is_public_key, is_valid_key, key_spec, mask_key, CONFIG_KEYS};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Guarantee tunables adjustable at runtime, with their accepted ranges
const TUNABLE_KEYS: &[(&str, f64, f64)] = &[
    ("cs_minimum_results", 1.0, 100.0),
    ("cs_quality_threshold", 0.0, 100.0),
    ("cs_max_retries", 0.0, 10.0),
];

/// One entry in the settings listing
#[derive(Debug, Serialize)]
pub struct SettingEntry {
    pub name: String,
    pub configured: bool,
    /// Masked for secrets, plain for endpoints and tunables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// GET /api/settings response
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub keys: Vec<SettingEntry>,
    pub guarantee: GuaranteeSettings,
}

/// Current guarantee tunables
#[derive(Debug, Serialize)]
pub struct GuaranteeSettings {
    pub minimum_results: usize,
    pub quality_threshold: f64,
    pub max_retries: u32,
}

/// POST /api/settings/{name} request
#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

/// POST /api/settings/{name} response
#[derive(Debug, Serialize)]
pub struct SetSettingResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/settings
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    let mut keys = Vec::with_capacity(CONFIG_KEYS.len());
    for spec in CONFIG_KEYS {
        let stored = crate::db::settings::get_api_key(&state.db, spec.name).await?;
        let entry = match stored {
            Some(value) => SettingEntry {
                name: spec.name.to_string(),
                configured: true,
                value: Some(if is_public_key(spec.name) {
                    value
                } else {
                    mask_key(&value)
                }),
            },
            None => SettingEntry {
                name: spec.name.to_string(),
                configured: false,
                value: None,
            },
        };
        keys.push(entry);
    }

    let guarantee = GuaranteeSettings {
        minimum_results: crate::db::settings::get_minimum_results(&state.db).await?,
        quality_threshold: crate::db::settings::get_quality_threshold(&state.db).await?,
        max_retries: crate::db::settings::get_max_retries(&state.db).await?,
    };

    Ok(Json(SettingsResponse { keys, guarantee }))
}

/// POST /api/settings/{name}
///
/// Accepts the API keys and endpoints from the 3-tier resolution plus the
/// guarantee tunables. Unknown names and out-of-range tunables are rejected.
pub async fn set_setting(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<SetSettingRequest>,
) -> ApiResult<Json<SetSettingResponse>> {
    if !is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(
            "Value cannot be empty or whitespace-only".to_string(),
        ));
    }

    if let Some((key, min, max)) = TUNABLE_KEYS.iter().find(|(k, _, _)| *k == name) {
        let parsed: f64 = payload.value.parse().map_err(|_| {
            ApiError::BadRequest(format!("{} must be a number", key))
        })?;
        if parsed < *min || parsed > *max {
            return Err(ApiError::BadRequest(format!(
                "{} must be between {} and {}",
                key, min, max
            )));
        }
        // The count tunables are read back as integers
        if *key != "cs_quality_threshold" && parsed.fract() != 0.0 {
            return Err(ApiError::BadRequest(format!("{} must be an integer", key)));
        }
    } else if key_spec(&name).is_none() {
        return Err(ApiError::BadRequest(format!("Unknown setting: {}", name)));
    }

    crate::db::settings::set_api_key(&state.db, &name, payload.value.trim().to_string())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save setting: {}", e)))?;

    info!(setting = %name, "Setting updated via API");

    Ok(Json(SetSettingResponse {
        success: true,
        message: format!("{} configured successfully", name),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list_settings))
        .route("/api/settings/:name", post(set_setting))
}
