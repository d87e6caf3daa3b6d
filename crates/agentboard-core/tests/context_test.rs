// End-to-end: snapshot load, live updates, and shutdown through DashboardContext.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use agentboard_core::bridge::CONNECTION_KEY;
use agentboard_core::context::CONNECTION_EVENT;
use agentboard_core::{Channel, ConnectionState, ConnectionStatus, DashboardContext, RealtimeConfig};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{MockConnector, Step, wait_for};

const WAIT: Duration = Duration::from_secs(5);

async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collaboration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodes": [
                { "id": "planner", "name": "Planner", "type": "agent", "status": "working" },
                { "id": "coder", "name": "Coder", "type": "agent", "status": "idle" }
            ],
            "edges": [
                { "id": "e1", "source": "planner", "target": "coder", "type": "delegates" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [{ "id": "t1", "name": "index", "status": "running" }],
            "total": 1,
            "running": 1
        })))
        .mount(&server)
        .await;
    // /api/performance is left unmounted.
    server
}

#[tokio::test]
async fn start_loads_snapshot_and_follows_updates() {
    let server = backend().await;
    let config = RealtimeConfig::for_host(&server.address().to_string()).unwrap();
    let (connector, mut servers) = MockConnector::new([Step::Accept]);
    let ctx = DashboardContext::with_connector(config, connector).unwrap();

    assert_eq!(ctx.start().await, 2);

    let flow = ctx.collaboration().unwrap();
    assert_eq!(flow.nodes.len(), 2);
    assert_eq!(flow.busy_nodes().count(), 1);
    assert_eq!(ctx.tasks().unwrap().running, 1);
    assert!(ctx.performance().is_none());

    let server_end = tokio::time::timeout(WAIT, servers.recv()).await.unwrap().unwrap();
    assert!(wait_for(WAIT, || ctx.connection().is_connected()).await);

    let stored: ConnectionState = ctx.store().get_state(CONNECTION_KEY).unwrap();
    assert_eq!(stored.status, ConnectionStatus::Connected);
    assert!(stored.last_connected.is_some());

    server_end.send_json(&json!({
        "type": "update",
        "channel": Channel::Performance.to_string(),
        "data": { "current": { "tpm": 900, "rpm": 3 } },
        "timestamp": 1
    }));
    assert!(wait_for(WAIT, || ctx.performance().is_some()).await);
    let perf = ctx.performance().unwrap();
    assert!((perf.current.tpm - 900.0).abs() < f64::EPSILON);

    // A payload that does not fit the model leaves the previous value.
    server_end.send_json(&json!({
        "type": "update",
        "channel": "tasks",
        "data": { "tasks": "not a list" },
        "timestamp": 2
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.tasks().unwrap().running, 1);

    ctx.shutdown();
    assert_eq!(ctx.connection().status, ConnectionStatus::Disconnected);
    assert_eq!(ctx.realtime().subscriber_count(Channel::Tasks), 0);

    // State survives shutdown.
    assert!(ctx.performance().is_some());
}

#[tokio::test]
async fn start_twice_binds_once() {
    let server = backend().await;
    let config = RealtimeConfig::for_host(&server.address().to_string()).unwrap();
    let (connector, _servers) = MockConnector::new([Step::Accept]);
    let ctx = DashboardContext::with_connector(config, connector).unwrap();

    ctx.start().await;
    let bound: Vec<usize> = Channel::ALL
        .iter()
        .map(|c| ctx.realtime().subscriber_count(*c))
        .collect();
    assert!(bound.iter().all(|n| *n > 0));

    ctx.start().await;
    for (channel, count) in Channel::ALL.into_iter().zip(bound) {
        assert_eq!(ctx.realtime().subscriber_count(channel), count);
    }
    ctx.shutdown();
}

#[tokio::test]
async fn bus_queues_listened_events_until_flushed() {
    let server = backend().await;
    let config = RealtimeConfig::for_host(&server.address().to_string()).unwrap();
    let (connector, mut servers) = MockConnector::new([Step::Accept]);
    let ctx = DashboardContext::with_connector(config, connector).unwrap();

    let tasks = Arc::new(Mutex::new(Vec::<Value>::new()));
    let statuses = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&tasks);
    ctx.events().on("tasks", move |data: &Value| sink.lock().push(data.clone()));
    let sink = Arc::clone(&statuses);
    ctx.events().on(CONNECTION_EVENT, move |state: &Value| {
        sink.lock().push(state["status"].as_str().unwrap_or_default().to_owned());
    });

    ctx.start().await;
    let _server_end = tokio::time::timeout(WAIT, servers.recv()).await.unwrap().unwrap();
    assert!(wait_for(WAIT, || ctx.connection().is_connected()).await);

    // Nothing is delivered until the bus is flushed.
    assert!(tasks.lock().is_empty());
    // Collaboration has no listener, so only tasks and the state changes
    // are waiting.
    assert_eq!(ctx.events().queue_len(), 3);

    ctx.events().flush();
    assert_eq!(tasks.lock().len(), 1);
    assert_eq!(tasks.lock()[0]["running"], 1);
    assert_eq!(*statuses.lock(), vec!["connecting", "connected"]);

    ctx.shutdown();
    assert_eq!(statuses.lock().last().map(String::as_str), Some("disconnected"));
    assert_eq!(ctx.events().queue_len(), 0);
}
