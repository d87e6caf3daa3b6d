use thiserror::Error;

/// Top-level error type for the `agentboard-api` crate.
///
/// Covers every failure mode of the two backend surfaces: the realtime
/// WebSocket channel and the HTTP snapshot endpoints.
/// `agentboard-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The snapshot endpoint answered with a non-success status.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// Building the HTTP client failed.
    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }
}
