//! Stream live updates until interrupted.
//!
//! Channel payloads and state transitions are queued on the dashboard
//! context's event bus as they arrive and rendered in batches on every
//! tick, so a burst of updates never stalls the connection's tasks on
//! stdout.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use agentboard_api::Channel;
use agentboard_core::context::CONNECTION_EVENT;
use agentboard_core::{ConnectionState, DashboardContext, RealtimeConfig, Subscription};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

/// One rendered line of `watch` output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum WatchEvent {
    Update {
        channel: Channel,
        data: Value,
        received_at: DateTime<Local>,
    },
    State {
        state: ConnectionState,
        received_at: DateTime<Local>,
    },
}

impl WatchEvent {
    fn render(&self, renderer: Renderer) -> Result<String, CliError> {
        if !renderer.is_pretty() {
            return renderer.json(self);
        }
        Ok(match self {
            Self::Update {
                channel,
                data,
                received_at,
            } => format!(
                "{} {}",
                received_at.format("%H:%M:%S"),
                renderer.channel_line(*channel, data)
            ),
            Self::State { state, received_at } => format!(
                "{} {}",
                received_at.format("%H:%M:%S"),
                renderer.state_line(state)
            ),
        })
    }
}

fn print(event: &WatchEvent, renderer: Renderer, quiet: bool) {
    match event.render(renderer) {
        Ok(line) => output::print_output(&line, quiet),
        Err(e) => warn!(error = %e, "could not render event"),
    }
}

pub async fn handle(
    config: RealtimeConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
    renderer: Renderer,
) -> Result<(), CliError> {
    let ctx = DashboardContext::new(config)?;
    let quiet = global.quiet;

    let mut listeners: Vec<Subscription> = args
        .channels()
        .into_iter()
        .map(|channel| {
            ctx.events().on(channel.as_ref(), move |data: &Value| {
                let event = WatchEvent::Update {
                    channel,
                    data: data.clone(),
                    received_at: Local::now(),
                };
                print(&event, renderer, quiet);
            })
        })
        .collect();

    listeners.push(ctx.events().on(CONNECTION_EVENT, move |payload: &Value| {
        match ConnectionState::deserialize(payload) {
            Ok(state) => print(
                &WatchEvent::State {
                    state,
                    received_at: Local::now(),
                },
                renderer,
                quiet,
            ),
            Err(e) => warn!(error = %e, "unexpected connection event payload"),
        }
    }));

    if args.no_snapshot {
        ctx.connect();
    } else {
        let loaded = ctx.start().await;
        info!(resources = loaded, "initial snapshot loaded");
    }

    let mut tick = tokio::time::interval(Duration::from_millis(args.tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let stop = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            () = &mut stop => break,
            _ = tick.tick() => ctx.events().flush(),
        }
    }

    // Renders whatever arrived since the last tick, including the final
    // disconnect.
    ctx.shutdown();
    for listener in &listeners {
        listener.unsubscribe();
    }
    Ok(())
}
