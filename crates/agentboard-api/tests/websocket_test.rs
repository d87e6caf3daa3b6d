// Integration tests for `TungsteniteConnector` against a local server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use agentboard_api::{Connector, TransportEvent, TungsteniteConnector};

const WAIT: Duration = Duration::from_secs(5);

/// Bind a loopback listener and return it with the `ws://` URL pointing at it.
async fn listener() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/ws/dashboard")).unwrap();
    (listener, url)
}

#[tokio::test]
async fn test_frames_flow_both_ways() {
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::text(r#"{"type":"ping","timestamp":1}"#))
            .await
            .unwrap();

        // Wait for the client's reply, then hang up.
        let reply = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break text.as_str().to_owned(),
                _ => {}
            }
        };
        ws.close(None).await.unwrap();
        reply
    });

    let conn = TungsteniteConnector.connect(&url).await.unwrap();
    let (outbound, mut inbound) = conn.into_parts();

    let first = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(
        first,
        TransportEvent::Message(r#"{"type":"ping","timestamp":1}"#.into())
    );

    outbound
        .send(r#"{"type":"pong","timestamp":2}"#.into())
        .unwrap();

    let closed = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    assert!(
        matches!(closed, TransportEvent::Closed { .. }),
        "expected Closed, got {closed:?}"
    );

    let reply = server.await.unwrap();
    assert_eq!(reply, r#"{"type":"pong","timestamp":2}"#);
}

#[tokio::test]
async fn test_dropping_outbound_closes_socket() {
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // The client closing shows up as a Close frame or end of stream.
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    });

    let conn = TungsteniteConnector.connect(&url).await.unwrap();
    let (outbound, _inbound) = conn.into_parts();
    drop(outbound);

    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}
