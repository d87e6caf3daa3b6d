// ── Core error types ──
//
// Errors surfaced by agentboard-core. Transport failures on the realtime
// channel never reach callers (they become state transitions); these are
// for construction, configuration, and explicit one-shot operations.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach dashboard backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Backend returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed payload: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<agentboard_api::Error> for CoreError {
    fn from(err: agentboard_api::Error) -> Self {
        match err {
            agentboard_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            agentboard_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            agentboard_api::Error::Status { status, url } => CoreError::Status { status, url },
            agentboard_api::Error::ClientBuild(msg) => CoreError::Internal(msg),
            agentboard_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            agentboard_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decode {
            message: err.to_string(),
        }
    }
}
