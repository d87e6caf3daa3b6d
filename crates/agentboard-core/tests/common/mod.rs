// Shared fixtures for agentboard-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use agentboard_api::{Connector, Error as ApiError, TransportEvent, WsConnection};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// What the next connection attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fail,
    Accept,
}

/// The server's half of an accepted mock connection.
pub struct ServerEnd {
    pub to_client: mpsc::UnboundedSender<TransportEvent>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn send_text(&self, text: &str) {
        self.to_client
            .send(TransportEvent::Message(text.to_owned()))
            .unwrap();
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    pub fn close(&self) {
        self.to_client
            .send(TransportEvent::Closed {
                code: Some(1000),
                reason: "bye".into(),
            })
            .unwrap();
    }

    /// Next frame the client sent, decoded.
    pub async fn recv_json(&mut self) -> Value {
        let text = self.from_client.recv().await.unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Scripted in-memory transport. Attempts beyond the script fail.
pub struct MockConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: Mutex<Vec<Instant>>,
    servers: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = Step>) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
            servers,
        });
        (connector, accepted)
    }

    /// When each connection attempt was made.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

impl Connector for MockConnector {
    fn connect(&self, _url: &Url) -> BoxFuture<'static, Result<WsConnection, ApiError>> {
        self.attempts.lock().push(Instant::now());
        let step = self.script.lock().pop_front().unwrap_or(Step::Fail);

        let result = match step {
            Step::Fail => Err(ApiError::WebSocketConnect("connection refused".into())),
            Step::Accept => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let _ = self.servers.send(ServerEnd {
                    to_client: in_tx,
                    from_client: out_rx,
                });
                Ok(WsConnection::new(out_tx, in_rx))
            }
        };
        Box::pin(async move { result })
    }
}

/// Poll `condition` every millisecond until it holds or `limit` elapses.
/// Works with both real and paused time.
pub async fn wait_for(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// A handler that records every payload it sees.
pub fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |v: &Value| sink.lock().push(v.clone()))
}
