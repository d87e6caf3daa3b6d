//! Clap derive structures for the `agentboard` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

use agentboard_api::Channel;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// agentboard -- follow an agent-collaboration dashboard from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "agentboard",
    version,
    about = "Watch agent collaboration, tasks, and performance from a dashboard backend",
    long_about = "Connects to a dashboard backend's realtime channel and snapshot API.\n\n\
        Live updates arrive over a WebSocket; when it cannot be kept open the\n\
        client falls back to polling the snapshot endpoints.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "AGENTBOARD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Realtime URL, e.g. ws://127.0.0.1:8000/ws/dashboard (overrides profile)
    #[arg(long, short = 'u', env = "AGENTBOARD_URL", global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AGENTBOARD_OUTPUT",
        default_value = "pretty",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Snapshot request timeout in seconds (overrides profile)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Never fall back to HTTP polling
    #[arg(long, global = true)]
    pub no_fallback: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summaries (default)
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// One JSON document per line (streaming)
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelArg {
    Collaboration,
    Tasks,
    Performance,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Collaboration => Channel::Collaboration,
            ChannelArg::Tasks => Channel::Tasks,
            ChannelArg::Performance => Channel::Performance,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream channel updates and connection changes
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Fetch the current state of each resource once
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Check whether the realtime channel can be opened
    Status(StatusArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show these channels (repeatable; default all)
    #[arg(long, short = 'c', value_enum)]
    pub channel: Vec<ChannelArg>,

    /// Stop after this many seconds
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,

    /// How often queued events are rendered, in milliseconds
    #[arg(long, default_value = "250", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Skip the initial snapshot fetch
    #[arg(long)]
    pub no_snapshot: bool,
}

impl WatchArgs {
    pub fn channels(&self) -> Vec<Channel> {
        if self.channel.is_empty() {
            Channel::ALL.to_vec()
        } else {
            self.channel.iter().map(|&c| c.into()).collect()
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Fetch a single resource
    #[arg(long, short = 'c', value_enum)]
    pub channel: Option<ChannelArg>,
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Seconds to wait for the first connection attempt to settle
    #[arg(long, short = 'w', default_value = "10")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration (file + environment)
    Show,

    /// Write a config file with one profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Backend host
        #[arg(long, conflicts_with = "ws_url")]
        host: Option<String>,

        /// Backend port
        #[arg(long, conflicts_with = "ws_url")]
        port: Option<u16>,

        /// Full realtime URL
        #[arg(long)]
        ws_url: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
