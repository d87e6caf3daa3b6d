//! JSON wire protocol spoken over the realtime channel.
//!
//! Inbound frames carry typed updates for one of three logical channels
//! multiplexed over the single WebSocket, plus liveness pings. Outbound
//! frames are only liveness traffic (`ping` heartbeats and `pong` replies).
//!
//! ```json
//! { "type": "update", "channel": "tasks", "data": { "total": 3 }, "timestamp": 1760000000000 }
//! { "type": "ping", "timestamp": 1760000000000 }
//! ```

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::Error;

// ── Channel ──────────────────────────────────────────────────────────

/// Logical data stream multiplexed over the realtime connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// Agent/task collaboration graph.
    Collaboration,
    /// Task status summary.
    Tasks,
    /// Token and request throughput telemetry.
    Performance,
}

impl Channel {
    /// Every channel, in snapshot-fetch order.
    pub const ALL: [Channel; 3] = [Channel::Collaboration, Channel::Tasks, Channel::Performance];

    /// Path of the HTTP snapshot endpoint serving this channel, relative
    /// to the API base URL.
    pub fn snapshot_path(self) -> &'static str {
        match self {
            Self::Collaboration => "api/collaboration",
            Self::Tasks => "api/tasks",
            Self::Performance => "api/performance",
        }
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Discriminator of a realtime frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    Update,
    Ping,
    Pong,
    Error,
}

/// A frame received from the server.
///
/// Only `update` frames carrying both `channel` and `data` are routed to
/// subscribers. `data: null` deserializes to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Sender's stamp, kept as sent. Usually epoch milliseconds, but
    /// senders also use fractional or string forms; routing ignores it.
    #[serde(default)]
    pub timestamp: serde_json::Value,
}

impl InboundMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }

    /// Build an `update` frame. Mostly useful for tests and local fakes.
    pub fn update(channel: Channel, data: serde_json::Value) -> Self {
        Self {
            kind: MessageType::Update,
            channel: Some(channel),
            data: Some(data),
            timestamp: now_millis().into(),
        }
    }

    /// The routable `(channel, data)` pair of an `update` frame.
    pub fn into_update(self) -> Option<(Channel, serde_json::Value)> {
        if self.kind != MessageType::Update {
            return None;
        }
        Some((self.channel?, self.data?))
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A frame sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Heartbeat.
    Ping { timestamp: i64 },
    /// Reply to a server `ping`.
    Pong { timestamp: i64 },
}

impl OutboundMessage {
    pub fn ping_now() -> Self {
        Self::Ping {
            timestamp: now_millis(),
        }
    }

    pub fn pong_now() -> Self {
        Self::Pong {
            timestamp: now_millis(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Ping { timestamp } | Self::Pong { timestamp } => *timestamp,
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> String {
        // Two-variant enum of integers: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ── Tests ────────────────────────────────────────────────────────────
