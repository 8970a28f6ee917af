//! Configuration for the Freedompro bridge.
//!
//! A TOML file in the platform config directory, overridden by
//! `FREEDOMPRO_*` environment variables, with API key resolution
//! (env var + plaintext) and translation to `freedompro_core::BridgeConfig`.
//! The core crate never reads files; this crate is the only place that does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use freedompro_core::{BridgeConfig, DEFAULT_BASE_URL, DeviceSource, ReconnectConfig};

/// Environment variable consulted when no `api_key_env` is configured
/// or it is unset.
pub const API_KEY_ENV: &str = "FREEDOMPRO_API_KEY";

const ENV_PREFIX: &str = "FREEDOMPRO_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured (set FREEDOMPRO_API_KEY, `api_key_env`, or `api_key`)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Cloud connection settings.
    #[serde(default)]
    pub cloud: CloudSettings,

    /// Stream and polling tuning.
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CloudSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (plaintext, prefer an environment variable).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Path to an extra CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// REST request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// `devices` or the legacy flat `accessories` list.
    #[serde(default)]
    pub device_source: DeviceSource,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: None,
            ca_cert: None,
            timeout: default_timeout(),
            device_source: DeviceSource::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Consume the live event feed.
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Reconnect delay after a clean end-of-stream, and backoff base.
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Backoff cap after stream errors.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Per-accessory poll period; 0 disables.
    #[serde(default = "default_accessory_poll_secs")]
    pub accessory_poll_secs: u64,

    /// Global poll period; 0 disables.
    #[serde(default = "default_global_poll_secs")]
    pub global_poll_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            stream: true,
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            accessory_poll_secs: default_accessory_poll_secs(),
            global_poll_secs: default_global_poll_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_reconnect_initial_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_accessory_poll_secs() -> u64 {
    60
}
fn default_global_poll_secs() -> u64 {
    5
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("eu", "freedompro", "freedompro-bridge")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for persisted bridge data (the accessory store).
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("freedompro-bridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` (missing file means defaults) + environment.
///
/// Nested keys use a double underscore: `FREEDOMPRO_SYNC__GLOBAL_POLL_SECS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API key: `api_key_env` → `FREEDOMPRO_API_KEY` → plaintext.
pub fn resolve_api_key(cloud: &CloudSettings) -> Result<SecretString, ConfigError> {
    resolve_api_key_with(cloud, |name| std::env::var(name).ok())
}

fn resolve_api_key_with(
    cloud: &CloudSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Configured env var name
    if let Some(val) = cloud.api_key_env.as_deref().and_then(&lookup) {
        return Ok(SecretString::from(val));
    }

    // 2. Well-known env var
    if let Some(val) = lookup(API_KEY_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. Plaintext in config
    if let Some(ref key) = cloud.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials)
}

// ── Translation ─────────────────────────────────────────────────────

/// Check values serde cannot: URL shape and non-zero timings.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let url: url::Url = cfg
        .cloud
        .base_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "cloud.base_url".into(),
            reason: format!("invalid URL: {}", cfg.cloud.base_url),
        })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "cloud.base_url".into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if cfg.cloud.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "cloud.timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let sync = &cfg.sync;
    if sync.reconnect_initial_ms == 0 {
        return Err(ConfigError::Validation {
            field: "sync.reconnect_initial_ms".into(),
            reason: "must be greater than 0".into(),
        });
    }
    if sync.reconnect_max_ms < sync.reconnect_initial_ms {
        return Err(ConfigError::Validation {
            field: "sync.reconnect_max_ms".into(),
            reason: format!(
                "{} is below reconnect_initial_ms ({})",
                sync.reconnect_max_ms, sync.reconnect_initial_ms
            ),
        });
    }

    Ok(())
}

/// Validate and build the runtime `BridgeConfig`, resolving the API key.
pub fn to_bridge_config(cfg: &Config) -> Result<BridgeConfig, ConfigError> {
    validate(cfg)?;
    let api_key = resolve_api_key(&cfg.cloud)?;
    Ok(build_bridge_config(cfg, api_key))
}

/// Like [`to_bridge_config`], with an API key supplied by the caller.
pub fn to_bridge_config_with_key(
    cfg: &Config,
    api_key: SecretString,
) -> Result<BridgeConfig, ConfigError> {
    validate(cfg)?;
    Ok(build_bridge_config(cfg, api_key))
}

fn build_bridge_config(cfg: &Config, api_key: SecretString) -> BridgeConfig {
    let mut bridge = BridgeConfig::new(api_key);
    bridge.base_url.clone_from(&cfg.cloud.base_url);
    bridge.ca_cert.clone_from(&cfg.cloud.ca_cert);
    bridge.timeout = Duration::from_secs(cfg.cloud.timeout);
    bridge.device_source = cfg.cloud.device_source;
    bridge.stream_enabled = cfg.sync.stream;
    bridge.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(cfg.sync.reconnect_initial_ms),
        max_delay: Duration::from_millis(cfg.sync.reconnect_max_ms),
    };
    bridge.accessory_poll_interval = Duration::from_secs(cfg.sync.accessory_poll_secs);
    bridge.global_poll_interval = Duration::from_secs(cfg.sync.global_poll_secs);
    bridge
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.cloud.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.cloud.timeout, 30);
        assert_eq!(cfg.sync.global_poll_secs, 5);
        assert_eq!(cfg.sync.accessory_poll_secs, 60);
        assert!(cfg.sync.stream);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[cloud]
api_key = "from-file"
device_source = "accessories"

[sync]
stream = false
global_poll_secs = 0
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.cloud.api_key.as_deref(), Some("from-file"));
        assert_eq!(cfg.cloud.device_source, DeviceSource::Accessories);
        assert!(!cfg.sync.stream);
        assert_eq!(cfg.sync.global_poll_secs, 0);
        assert_eq!(cfg.sync.accessory_poll_secs, 60);
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.cloud.api_key_env = Some("MY_FREEDOMPRO_TOKEN".into());
        cfg.sync.accessory_poll_secs = 120;

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.cloud.api_key_env.as_deref(), Some("MY_FREEDOMPRO_TOKEN"));
        assert_eq!(loaded.sync.accessory_poll_secs, 120);
    }

    #[test]
    fn api_key_chain_prefers_named_env_then_default_env_then_plaintext() {
        let cloud = CloudSettings {
            api_key: Some("plain".into()),
            api_key_env: Some("CUSTOM".into()),
            ..CloudSettings::default()
        };

        let both = |name: &str| match name {
            "CUSTOM" => Some("custom".to_string()),
            API_KEY_ENV => Some("default".to_string()),
            _ => None,
        };
        let default_only = |name: &str| (name == API_KEY_ENV).then(|| "default".to_string());
        let none = |_: &str| None;

        let key = resolve_api_key_with(&cloud, both).unwrap();
        assert_eq!(key.expose_secret(), "custom");
        let key = resolve_api_key_with(&cloud, default_only).unwrap();
        assert_eq!(key.expose_secret(), "default");
        let key = resolve_api_key_with(&cloud, none).unwrap();
        assert_eq!(key.expose_secret(), "plain");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let result = resolve_api_key_with(&CloudSettings::default(), |_| None);
        assert!(matches!(result, Err(ConfigError::NoCredentials)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.cloud.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation { .. })));

        let mut cfg = Config::default();
        cfg.cloud.base_url = "ftp://example.com/".into();
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.sync.reconnect_max_ms = 10;
        assert!(validate(&cfg).is_err());

        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn bridge_config_carries_tuning() {
        let mut cfg = Config::default();
        cfg.cloud.timeout = 12;
        cfg.sync.global_poll_secs = 0;
        cfg.sync.reconnect_initial_ms = 250;

        let bridge = to_bridge_config_with_key(&cfg, SecretString::from("k".to_string())).unwrap();

        assert_eq!(bridge.timeout, Duration::from_secs(12));
        assert!(bridge.global_poll_interval.is_zero());
        assert_eq!(bridge.accessory_poll_interval, Duration::from_secs(60));
        assert_eq!(bridge.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(bridge.base_url, DEFAULT_BASE_URL);
    }
}
