//! Check the realtime channel once.

use std::time::Duration;

use agentboard_core::{ConnectionState, ConnectionStatus, RealtimeConfig, RealtimeManager};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(
    mut config: RealtimeConfig,
    args: &StatusArgs,
    global: &GlobalOpts,
    renderer: Renderer,
) -> Result<(), CliError> {
    // A status check reports the first attempt; retries and polling would only
    // delay the answer.
    config.reconnect_max_attempts = 0;
    config.http_fallback = false;
    let url = config.ws_url.to_string();

    let manager = RealtimeManager::new(config)?;
    let mut states = manager.watch_state();
    manager.connect();

    let wait = Duration::from_secs(args.wait);
    let settled = tokio::time::timeout(wait, async {
        let mut state = states.current().clone();
        while !is_settled(&state) {
            match states.changed().await {
                Some(next) => state = next,
                None => break,
            }
        }
        state
    })
    .await;
    manager.disconnect();

    let state = settled.map_err(|_| CliError::Timeout {
        what: format!("the realtime channel ({}s)", args.wait),
    })?;

    let out = if renderer.is_pretty() {
        renderer.state_line(&state)
    } else {
        renderer.json(&state)?
    };
    output::print_output(&out, global.quiet);

    if state.is_connected() {
        Ok(())
    } else {
        Err(CliError::ConnectionFailed {
            url,
            reason: state
                .error_message
                .unwrap_or_else(|| "connection closed".into()),
        })
    }
}

fn is_settled(state: &ConnectionState) -> bool {
    matches!(
        state.status,
        ConnectionStatus::Connected | ConnectionStatus::Error
    )
}
