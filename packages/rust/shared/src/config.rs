//! Application configuration for Newsloom.
//!
//! User config lives at `~/.newsloom/newsloom.toml`. The API credential is
//! never stored in the file; only the name of the env var holding it is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsloomError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsloom.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsloom";

// ---------------------------------------------------------------------------
// Config structs (matching newsloom.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider selection.
    #[serde(default)]
    pub provider: ProviderSelection,

    /// Cloud provider settings.
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Local model server settings.
    #[serde(default)]
    pub local: LocalConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Enrichment worker tuning.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Which inference backend to use. Chosen once at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Cloud,
    Local,
}

/// `[provider]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Backend kind: "cloud" (default) or "local".
    #[serde(default)]
    pub kind: ProviderKind,
}

/// `[cloud]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL. Overridable for tests.
    #[serde(default = "default_cloud_base_url")]
    pub base_url: String,

    /// Generation model.
    #[serde(default = "default_cloud_model")]
    pub model: String,

    /// Embedding model (768 dimensions).
    #[serde(default = "default_cloud_embed_model")]
    pub embed_model: String,

    /// Requests-per-minute budget enforced by the rate limiter.
    #[serde(default = "default_rpm_limit")]
    pub rpm_limit: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_cloud_base_url(),
            model: default_cloud_model(),
            embed_model: default_cloud_embed_model(),
            rpm_limit: default_rpm_limit(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_cloud_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_cloud_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_cloud_embed_model() -> String {
    "text-embedding-004".into()
}
fn default_rpm_limit() -> u32 {
    15
}

/// `[local]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Base URL of the local model server.
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Generation model.
    #[serde(default = "default_local_model")]
    pub model: String,

    /// Embedding model (768 dimensions).
    #[serde(default = "default_local_embed_model")]
    pub embed_model: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            model: default_local_model(),
            embed_model: default_local_embed_model(),
        }
    }
}

fn default_local_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_local_model() -> String {
    "llama3.1:latest".into()
}
fn default_local_embed_model() -> String {
    "nomic-embed-text".into()
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.newsloom/newsloom.db".into()
}

/// `[worker]` section — enrichment loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Records fetched per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Courtesy delay between records, in seconds.
    #[serde(default = "default_record_delay_secs")]
    pub record_delay_secs: u64,

    /// Sleep for early idle cycles, in seconds.
    #[serde(default = "default_idle_sleep_secs")]
    pub idle_sleep_secs: u64,

    /// Sleep once the idle threshold is reached, in seconds.
    #[serde(default = "default_idle_backoff_secs")]
    pub idle_backoff_secs: u64,

    /// Consecutive idle fetches before the longer sleep kicks in.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold: u32,

    /// Pause after a loop-level error, in seconds.
    #[serde(default = "default_error_sleep_secs")]
    pub error_sleep_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            record_delay_secs: default_record_delay_secs(),
            idle_sleep_secs: default_idle_sleep_secs(),
            idle_backoff_secs: default_idle_backoff_secs(),
            idle_threshold: default_idle_threshold(),
            error_sleep_secs: default_error_sleep_secs(),
        }
    }
}

fn default_batch_size() -> u32 {
    10
}
fn default_record_delay_secs() -> u64 {
    5
}
fn default_idle_sleep_secs() -> u64 {
    10
}
fn default_idle_backoff_secs() -> u64 {
    20
}
fn default_idle_threshold() -> u32 {
    3
}
fn default_error_sleep_secs() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsloom/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsloomError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsloom/newsloom.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file
/// does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsloomError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NewsloomError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsloomError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsloomError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsloomError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in a configured path against the user's home.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("batch_size"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.provider.kind, ProviderKind::Cloud);
        assert_eq!(parsed.cloud.rpm_limit, 15);
        assert_eq!(parsed.worker.batch_size, 10);
    }

    #[test]
    fn provider_kind_parses_lowercase() {
        let toml_str = r#"
[provider]
kind = "local"

[local]
base_url = "http://models.internal:11434"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.provider.kind, ProviderKind::Local);
        assert_eq!(config.local.base_url, "http://models.internal:11434");
        // Unspecified sections fall back to defaults.
        assert_eq!(config.cloud.model, "gemini-2.5-flash");
    }

    #[test]
    fn worker_defaults_match_reference_deployment() {
        let w = WorkerConfig::default();
        assert_eq!(w.batch_size, 10);
        assert_eq!(w.record_delay_secs, 5);
        assert_eq!(w.idle_sleep_secs, 10);
        assert_eq!(w.idle_backoff_secs, 20);
        assert_eq!(w.idle_threshold, 3);
        assert_eq!(w.error_sleep_secs, 5);
    }

    #[test]
    fn expand_home_passthrough() {
        assert_eq!(expand_home("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
    }
}
