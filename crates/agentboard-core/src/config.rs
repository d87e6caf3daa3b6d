// ── Runtime realtime configuration ──
//
// Describes *where* the dashboard backend lives and how the connection
// manager paces reconnects, heartbeats, and polling. Never touches disk:
// the CLI (via agentboard-config) constructs a `RealtimeConfig` and hands
// it in.

use std::time::Duration;

use agentboard_api::TransportConfig;
use url::Url;

use crate::error::CoreError;

/// Host the dashboard plugin serves on when nothing else is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1:8000";

/// Path of the realtime endpoint on the dashboard host.
pub const WS_PATH: &str = "/ws/dashboard";

/// Configuration for the realtime connection manager.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
    /// Realtime channel endpoint (e.g. `ws://127.0.0.1:8000/ws/dashboard`).
    pub ws_url: Url,
    /// Base URL for the HTTP snapshot endpoints.
    pub api_url: Url,
    /// Fall back to HTTP polling once reconnect attempts are exhausted.
    pub http_fallback: bool,
    /// Reconnect attempts before giving up on the live channel.
    pub reconnect_max_attempts: u32,
    /// Base backoff delay; attempt `n` waits `reconnect_delay * 1.5^n`.
    pub reconnect_delay: Duration,
    /// Snapshot polling period while in fallback.
    pub polling_interval: Duration,
    /// Liveness ping period while connected.
    pub heartbeat_interval: Duration,
    /// Per-request timeout for snapshot fetches.
    pub request_timeout: Duration,
}

impl RealtimeConfig {
    /// Build a config for a `host[:port]`, deriving both endpoints from it.
    pub fn for_host(host: &str) -> Result<Self, CoreError> {
        let ws_url = Url::parse(&format!("ws://{host}{WS_PATH}")).map_err(|e| {
            CoreError::Config {
                message: format!("invalid host '{host}': {e}"),
            }
        })?;
        Self::from_ws_url(ws_url)
    }

    /// Build a config from an explicit realtime URL. The snapshot base is
    /// the same origin over HTTP(S).
    pub fn from_ws_url(ws_url: Url) -> Result<Self, CoreError> {
        let api_url = derive_api_url(&ws_url)?;
        Ok(Self {
            ws_url,
            api_url,
            http_fallback: true,
            reconnect_max_attempts: 5,
            reconnect_delay: Duration::from_millis(3000),
            polling_interval: Duration::from_millis(10_000),
            heartbeat_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Backoff delay before reconnect attempt number `attempt` (0-based).
    ///
    /// Saturates at `Duration::MAX` rather than overflowing.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.reconnect_delay.as_secs_f64() * 1.5_f64.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Transport settings for the snapshot client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.request_timeout)
    }

    /// Reject configurations the connection manager cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.ws_url.scheme(), "ws" | "wss") {
            return Err(CoreError::Config {
                message: format!("ws_url must use ws:// or wss://, got '{}'", self.ws_url),
            });
        }
        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(CoreError::Config {
                message: format!("api_url must use http:// or https://, got '{}'", self.api_url),
            });
        }
        for (name, value) in [
            ("polling_interval", self.polling_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(CoreError::Config {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::for_host(DEFAULT_HOST).expect("default host is a valid URL")
    }
}

/// `ws://host/ws/dashboard` -> `http://host/`, `wss://` -> `https://`.
fn derive_api_url(ws_url: &Url) -> Result<Url, CoreError> {
    let scheme = match ws_url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => {
            return Err(CoreError::Config {
                message: format!("unsupported realtime scheme '{other}'"),
            });
        }
    };

    let mut api = ws_url.clone();
    api.set_scheme(scheme).map_err(|()| CoreError::Config {
        message: format!("cannot derive HTTP base from '{ws_url}'"),
    })?;
    api.set_path("/");
    api.set_query(None);
    api.set_fragment(None);
    Ok(api)
}
