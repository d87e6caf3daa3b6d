// ── Connection state ──
//
// Immutable snapshots of the connection manager's state machine. Each
// transition is a pure function from one snapshot to the next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// `error_message` while serving data from the HTTP polling fallback.
pub const POLLING_FALLBACK_MESSAGE: &str = "Using HTTP polling fallback";

/// `error_message` after a channel-level error.
pub const CONNECTION_FAILED_MESSAGE: &str = "WebSocket connection failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<DateTime<Utc>>,
    /// Consecutive reconnects since the channel was last open.
    pub reconnect_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Connected, but through the HTTP polling fallback.
    pub fn is_polling(&self) -> bool {
        self.is_connected() && self.error_message.as_deref() == Some(POLLING_FALLBACK_MESSAGE)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Opening the channel; `attempts` counts reconnects so far.
    pub(crate) fn connecting(&self, attempts: u32) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            reconnect_attempts: attempts,
            error_message: None,
            ..self.clone()
        }
    }

    pub(crate) fn opened(at: DateTime<Utc>) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            last_connected: Some(at),
            reconnect_attempts: 0,
            error_message: None,
        }
    }

    pub(crate) fn failed(&self, message: &str) -> Self {
        Self {
            status: ConnectionStatus::Error,
            error_message: Some(message.to_owned()),
            ..self.clone()
        }
    }

    pub(crate) fn closed(&self) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            ..self.clone()
        }
    }

    pub(crate) fn polling(&self) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            error_message: Some(POLLING_FALLBACK_MESSAGE.to_owned()),
            ..self.clone()
        }
    }

    /// Explicit disconnect: back to the initial state, keeping history.
    pub(crate) fn reset(&self) -> Self {
        Self {
            last_connected: self.last_connected,
            ..Self::default()
        }
    }
}
