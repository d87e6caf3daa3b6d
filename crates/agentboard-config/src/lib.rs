//! Shared configuration for the agentboard CLI and other consumers.
//!
//! TOML profiles plus environment overrides, resolved into
//! `agentboard_core::RealtimeConfig`. Layering, lowest to highest:
//! built-in defaults, `config.toml`, `AGENTBOARD_*` variables, and finally
//! `DASHBOARD_PORT`, which the plugin host sets for the backend it spawns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use agentboard_core::{CoreError, RealtimeConfig};

/// Variable the plugin host uses to announce the dashboard backend port.
pub const PORT_ENV: &str = "DASHBOARD_PORT";

/// Prefix for nested overrides, e.g. `AGENTBOARD_DEFAULTS__POLLING_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "AGENTBOARD_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named dashboard backends.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

/// Connection tuning shared by every profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub host: String,
    pub port: u16,
    pub http_fallback: bool,
    pub reconnect_max_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub polling_interval_ms: u64,
    pub heartbeat_interval_secs: u64,
    /// Snapshot request timeout, seconds.
    pub timeout: u64,
    /// CLI output: "pretty" or "json".
    pub output: String,
    /// CLI color: "auto", "always", or "never".
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            http_fallback: true,
            reconnect_max_attempts: 5,
            reconnect_delay_ms: 3000,
            polling_interval_ms: 10_000,
            heartbeat_interval_secs: 30,
            timeout: 30,
            output: "pretty".into(),
            color: "auto".into(),
        }
    }
}

/// A named dashboard backend. Unset fields fall back to [`Defaults`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Profile {
    pub host: Option<String>,
    pub port: Option<u16>,

    /// Full realtime URL (`ws://` or `wss://`); wins over host and port.
    pub url: Option<String>,

    /// Snapshot API base URL. Derived from the realtime URL when unset.
    pub api_url: Option<String>,

    pub http_fallback: Option<bool>,
    pub reconnect_max_attempts: Option<u32>,
    pub timeout: Option<u64>,
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is
    /// `None`.
    ///
    /// A missing *default* profile resolves to an empty one so a bare
    /// install talks to the local backend. A missing *named* profile is an
    /// error.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, Profile), ConfigError> {
        if let Some(name) = name {
            return self
                .profiles
                .get(name)
                .map(|p| (name, p.clone()))
                .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() });
        }

        let name = self.default_profile.as_deref().unwrap_or("default");
        Ok((name, self.profiles.get(name).cloned().unwrap_or_default()))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "agentboard", "agentboard").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("agentboard");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered figment for the config file at `path`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(Env::raw().only(&[PORT_ENV]).map(|_| "defaults.port".into()))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is not
/// an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = figment(path).extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

/// Build a validated `RealtimeConfig` from a profile and the defaults.
pub fn resolve_realtime_config(
    cfg: &Config,
    profile_name: Option<&str>,
) -> Result<RealtimeConfig, ConfigError> {
    let (name, profile) = cfg.profile(profile_name)?;
    debug!(profile = name, "resolving realtime config");
    profile_to_realtime_config(&profile, &cfg.defaults)
}

/// Merge one profile over the defaults.
pub fn profile_to_realtime_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<RealtimeConfig, ConfigError> {
    let mut config = match profile.url.as_deref() {
        Some(raw) => RealtimeConfig::from_ws_url(parse_url("url", raw)?),
        None => {
            let host = profile.host.as_deref().unwrap_or(&defaults.host);
            let port = profile.port.unwrap_or(defaults.port);
            RealtimeConfig::for_host(&format!("{host}:{port}"))
        }
    }
    .map_err(|e| validation("url", &e))?;

    if let Some(raw) = profile.api_url.as_deref() {
        config.api_url = parse_url("api_url", raw)?;
    }

    config.http_fallback = profile.http_fallback.unwrap_or(defaults.http_fallback);
    config.reconnect_max_attempts = profile
        .reconnect_max_attempts
        .unwrap_or(defaults.reconnect_max_attempts);
    config.reconnect_delay = Duration::from_millis(defaults.reconnect_delay_ms);
    config.polling_interval = Duration::from_millis(defaults.polling_interval_ms);
    config.heartbeat_interval = Duration::from_secs(defaults.heartbeat_interval_secs);
    config.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    config.validate().map_err(|e| validation("config", &e))?;
    Ok(config)
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn validation(field: &str, err: &CoreError) -> ConfigError {
    let reason = match err {
        CoreError::Config { message } => message.clone(),
        other => other.to_string(),
    };
    ConfigError::Validation {
        field: field.into(),
        reason,
    }
}
