//! One-shot fetch of the snapshot endpoints.

use serde_json::{Map, Value};
use tracing::warn;

use agentboard_api::{Channel, SnapshotClient};
use agentboard_core::RealtimeConfig;

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(
    config: &RealtimeConfig,
    args: &SnapshotArgs,
    global: &GlobalOpts,
    renderer: Renderer,
) -> Result<(), CliError> {
    let client = SnapshotClient::new(config.api_url.clone(), &config.transport())?;

    if let Some(channel) = args.channel {
        let channel = Channel::from(channel);
        let data = match client.fetch(channel).await {
            Ok(data) if !data.is_null() => data,
            // A null body or an endpoint the backend doesn't serve.
            Ok(_) => return Err(no_data(channel)),
            Err(e) if e.is_not_found() => return Err(no_data(channel)),
            Err(e) => return Err(e.into()),
        };
        let out = if renderer.is_pretty() {
            renderer.channel_line(channel, &data)
        } else {
            renderer.json(&data)?
        };
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    // Each resource stands alone: one failing endpoint doesn't hide the rest.
    let mut doc = Map::new();
    let mut lines = Vec::with_capacity(Channel::ALL.len());
    let mut available = 0usize;
    let mut last_error = None;

    for (channel, result) in client.fetch_all().await {
        match result {
            Ok(data) if !data.is_null() => {
                available += 1;
                lines.push(renderer.channel_line(channel, &data));
                doc.insert(channel.to_string(), data);
            }
            Ok(_) => {
                lines.push(renderer.note_line(channel, "no data"));
                doc.insert(channel.to_string(), Value::Null);
            }
            Err(e) => {
                warn!(%channel, error = %e, "snapshot fetch failed");
                lines.push(renderer.note_line(channel, &format!("unavailable ({e})")));
                doc.insert(channel.to_string(), Value::Null);
                last_error = Some(e);
            }
        }
    }

    if available == 0 {
        return Err(last_error.map_or_else(
            || CliError::NoData {
                resource: "snapshot".into(),
            },
            CliError::from,
        ));
    }

    let out = if renderer.is_pretty() {
        lines.join("\n")
    } else {
        renderer.json(&doc)?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn no_data(channel: Channel) -> CliError {
    CliError::NoData {
        resource: channel.to_string(),
    }
}
