//! Realtime WebSocket transport.
//!
//! A [`Connector`] opens one physical connection and hands back a
//! [`WsConnection`]: an outbound sender for text frames and an inbound
//! receiver of [`TransportEvent`]s. Reconnection policy lives above this
//! layer (in `agentboard-core`); a connection here is single-use.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentboard_api::websocket::{Connector, TransportEvent, TungsteniteConnector};
//! use url::Url;
//!
//! let url = Url::parse("ws://127.0.0.1:8000/ws/dashboard")?;
//! let conn = TungsteniteConnector.connect(&url).await?;
//! let (outbound, mut inbound) = conn.into_parts();
//!
//! while let Some(event) = inbound.recv().await {
//!     if let TransportEvent::Message(text) = event {
//!         println!("{text}");
//!     }
//! }
//! drop(outbound);
//! ```

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use url::Url;

use crate::error::Error;

// ── TransportEvent ───────────────────────────────────────────────────

/// Something that happened on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server.
    Message(String),
    /// A protocol or I/O error. Always followed by [`TransportEvent::Closed`].
    Error(String),
    /// The connection is gone; no further events follow.
    Closed { code: Option<u16>, reason: String },
}

// ── WsConnection ─────────────────────────────────────────────────────

/// An open realtime connection.
///
/// Dropping the outbound sender closes the socket; dropping the inbound
/// receiver stops the reader.
#[derive(Debug)]
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl WsConnection {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        (self.outbound, self.inbound)
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens realtime connections. The seam between the connection manager
/// and the physical transport.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<WsConnection, Error>>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<WsConnection, Error>> {
        let url = url.clone();
        Box::pin(async move { open(url).await })
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a WebSocket connection and spawn its reader and writer tasks.
async fn open(url: Url) -> Result<WsConnection, Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("WebSocket connected");

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                tracing::debug!(error = %e, "WebSocket write failed");
                break;
            }
        }
        // Owner dropped the sender (or the socket broke): close politely.
        let _ = write.close().await;
        tracing::debug!("WebSocket writer exiting");
    });

    tokio::spawn(async move {
        loop {
            let event = match read.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    TransportEvent::Message(text.as_str().to_owned())
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!("WebSocket ping");
                    continue;
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(cf) => (Some(u16::from(cf.code)), cf.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    tracing::info!(?code, reason = %reason, "WebSocket close frame received");
                    let _ = in_tx.send(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                    continue;
                }
                Some(Err(e)) => {
                    let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                    let _ = in_tx.send(TransportEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    });
                    break;
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    let _ = in_tx.send(TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    });
                    break;
                }
            };

            if in_tx.send(event).is_err() {
                // Owner went away.
                break;
            }
        }
        tracing::debug!("WebSocket reader exiting");
    });

    Ok(WsConnection::new(out_tx, in_rx))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_parts_round_trip() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = WsConnection::new(out_tx, in_rx);

        let (outbound, mut inbound) = conn.into_parts();
        outbound.send("hello".into()).unwrap();
        in_tx.send(TransportEvent::Message("world".into())).unwrap();

        assert_eq!(out_rx.recv().await.unwrap(), "hello");
        assert_eq!(
            inbound.recv().await.unwrap(),
            TransportEvent::Message("world".into())
        );
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        // Port 9 (discard) is essentially never listening on loopback.
        let url = Url::parse("ws://127.0.0.1:9/ws/dashboard").unwrap();
        let err = TungsteniteConnector.connect(&url).await.unwrap_err();
        assert!(matches!(err, Error::WebSocketConnect(_)));
    }
}
