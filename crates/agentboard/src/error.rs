//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use agentboard_config::ConfigError;
use agentboard_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to dashboard backend at {url}")]
    #[diagnostic(
        code(agentboard::connection_failed),
        help(
            "Check that the dashboard backend is running.\n\
             Reason: {reason}\n\
             Try: agentboard --url ws://HOST:PORT/ws/dashboard status"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Timed out waiting for {what}")]
    #[diagnostic(
        code(agentboard::timeout),
        help("Increase the wait with --wait or --timeout, or check backend responsiveness.")
    )]
    Timeout { what: String },

    #[error("Backend returned HTTP {status} for {url}")]
    #[diagnostic(code(agentboard::http_status))]
    HttpStatus { status: u16, url: String },

    #[error("No {resource} data available")]
    #[diagnostic(
        code(agentboard::no_data),
        help("The backend answered but had nothing for this resource yet.")
    )]
    NoData { resource: String },

    #[error("Unexpected payload: {message}")]
    #[diagnostic(code(agentboard::decode))]
    Decode { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(agentboard::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(agentboard::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: agentboard config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(agentboard::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(agentboard::config))]
    Config(Box<figment::Error>),

    #[error("Failed to write configuration: {0}")]
    #[diagnostic(code(agentboard::config_write))]
    ConfigWrite(#[from] toml::ser::Error),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(agentboard::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(agentboard::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoData { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout => CliError::Timeout {
                what: "a snapshot request".into(),
            },
            CoreError::Status { status, url } => CliError::HttpStatus { status, url },
            CoreError::Decode { message } => CliError::Decode { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<agentboard_api::Error> for CliError {
    fn from(err: agentboard_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(run: agentboard config show)".into(),
            },
            ConfigError::Serialization(e) => CliError::ConfigWrite(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
