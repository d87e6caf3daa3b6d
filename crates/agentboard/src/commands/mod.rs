//! Command dispatch: bridges CLI args -> core -> output formatting.

pub mod config_cmd;
pub mod snapshot;
pub mod status;
pub mod watch;

use agentboard_core::RealtimeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Renderer;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: RealtimeConfig,
    global: &GlobalOpts,
    renderer: Renderer,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, &args, global, renderer).await,
        Command::Snapshot(args) => snapshot::handle(&config, &args, global, renderer).await,
        Command::Status(args) => status::handle(config, &args, global, renderer).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
