//! CLI configuration: thin wrapper around `agentboard_config` that applies
//! `GlobalOpts` flag overrides (--url, --timeout, --no-fallback).

use agentboard_config::ConfigError;
use agentboard_core::RealtimeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use agentboard_config::{
    Config, Defaults, Profile, config_path, load_config, profile_to_realtime_config,
    save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Build a `RealtimeConfig` from the config file, profile, and CLI flags.
///
/// Flags take priority over profile values, which take priority over
/// `[defaults]`.
pub fn resolve_realtime_config(global: &GlobalOpts) -> Result<RealtimeConfig, CliError> {
    let cfg = load_config()?;

    let (name, mut profile) = match cfg.profile(global.profile.as_deref()) {
        Ok(found) => found,
        Err(ConfigError::UnknownProfile { name }) => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(&cfg),
                name,
            });
        }
        Err(other) => return Err(other.into()),
    };
    tracing::debug!(profile = name, "using profile");

    if let Some(ref url) = global.url {
        profile.url = Some(url.clone());
        profile.api_url = None;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if global.no_fallback {
        profile.http_fallback = Some(false);
    }

    Ok(profile_to_realtime_config(&profile, &cfg.defaults)?)
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
