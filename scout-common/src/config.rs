//! Configuration loading and root folder resolution
//!
//! Two-tier configuration: a small TOML bootstrap file (data folder, port,
//! logging, API key fallbacks) plus the database `settings` table for
//! runtime-editable values. Resolution priority for the data folder:
//!
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from a TOML file
///
/// These settings cannot change during runtime. The service must restart to
/// pick up changes to the TOML file. API keys placed here are fallbacks; the
/// database `settings` table remains authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database and any on-disk artifacts (optional)
    ///
    /// If not specified, resolution falls back to environment → OS default.
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// GitHub personal access token (raises unauthenticated rate limits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Stack Exchange application key (raises request quota)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackexchange_key: Option<String>,

    /// Kaggle API username (paired with `kaggle_key`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaggle_username: Option<String>,

    /// Kaggle API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaggle_key: Option<String>,

    /// Apollo.io API key for contact enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apollo_api_key: Option<String>,

    /// Perplexity API key for web-grounded enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perplexity_api_key: Option<String>,

    /// API key for the OpenAI-compatible validation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible validation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_endpoint: Option<String>,

    /// Model name passed to the validation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,

    /// JSON web-search endpoint (SearxNG-compatible) for the web adapters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websearch_endpoint: Option<String>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            github_token: None,
            stackexchange_key: None,
            kaggle_username: None,
            kaggle_key: None,
            apollo_api_key: None,
            perplexity_api_key: None,
            llm_api_key: None,
            llm_endpoint: None,
            llm_model: None,
            websearch_endpoint: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_port() -> u16 {
    5740
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the root (data) folder following the priority order:
/// 1. Environment variable
/// 2. TOML config file `root_folder`
/// 3. OS-dependent compiled default
pub fn resolve_root_folder(env_var_name: &str, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 2: TOML config file
    if let Some(root_folder) = &toml_config.root_folder {
        return root_folder.clone();
    }

    // Priority 3: OS-dependent compiled default
    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/scout (or /var/lib/scout for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("scout"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/scout"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/scout
        dirs::data_dir()
            .map(|d| d.join("scout"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/scout"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\scout
        dirs::data_local_dir()
            .map(|d| d.join("scout"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\scout"))
    } else {
        PathBuf::from("./scout_data")
    }
}

/// Get the default configuration file path for a module
///
/// Linux: `~/.config/scout/<module>.toml`, falling back to
/// `/etc/scout/<module>.toml` for system-wide installs.
pub fn default_config_path(module_name: &str) -> Result<PathBuf> {
    let file_name = format!("{}.toml", module_name);

    if cfg!(target_os = "linux") {
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("scout").join(&file_name)) {
            if user_config.exists() {
                return Ok(user_config);
            }
            let system_config = PathBuf::from("/etc/scout").join(&file_name);
            if system_config.exists() {
                return Ok(system_config);
            }
            // Neither exists yet; the user path is where new config is written
            return Ok(user_config);
        }
        return Err(Error::Config(
            "Could not determine config directory".to_string(),
        ));
    }

    dirs::config_dir()
        .map(|d| d.join("scout").join(&file_name))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load TOML config from the given path
///
/// A missing file is not an error; defaults are returned so first runs work
/// without any configuration.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config {}: {}", path.display(), e)))
}

/// Write TOML config to the given path
///
/// Writes to a temporary sibling first, then renames, so a crash mid-write
/// never leaves a truncated config behind.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Create the directory if it does not exist, verifying it is writable
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_values() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5740);
        assert_eq!(config.logging.level, "info");
        assert!(config.root_folder.is_none());
        assert!(config.github_token.is_none());
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            github_token = "ghp_example"

            [logging]
            level = "debug"
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.port, 5740);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.github_token.as_deref(), Some("ghp_example"));
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_write_then_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scout-cs.toml");

        let mut config = TomlConfig::default();
        config.port = 6001;
        config.apollo_api_key = Some("apollo-key".to_string());

        write_toml_config(&config, &path).expect("write should succeed");
        let loaded = load_toml_config(&path).expect("load should succeed");

        assert_eq!(loaded.port, 6001);
        assert_eq!(loaded.apollo_api_key.as_deref(), Some("apollo-key"));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded =
            load_toml_config(&dir.path().join("does-not-exist.toml")).expect("defaults expected");
        assert_eq!(loaded.port, 5740);
    }

    #[test]
    #[serial]
    fn test_resolve_root_folder_env_beats_toml() {
        let mut config = TomlConfig::default();
        config.root_folder = Some(PathBuf::from("/from/toml"));

        std::env::set_var("SCOUT_TEST_ROOT", "/from/env");
        let resolved = resolve_root_folder("SCOUT_TEST_ROOT", &config);
        std::env::remove_var("SCOUT_TEST_ROOT");

        assert_eq!(resolved, PathBuf::from("/from/env"));
    }

    #[test]
    #[serial]
    fn test_resolve_root_folder_toml_beats_default() {
        let mut config = TomlConfig::default();
        config.root_folder = Some(PathBuf::from("/from/toml"));

        std::env::remove_var("SCOUT_TEST_ROOT");
        let resolved = resolve_root_folder("SCOUT_TEST_ROOT", &config);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }
}
