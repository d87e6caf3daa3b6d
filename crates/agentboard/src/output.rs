//! Output formatting: human-readable summaries or JSON.
//!
//! Pretty output is one short line per resource, colored with
//! `owo-colors` when enabled. JSON output serializes the raw payloads.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use agentboard_api::Channel;
use agentboard_core::model::{CollaborationFlow, PerformanceSnapshot, TaskSummary};
use agentboard_core::{ConnectionState, ConnectionStatus};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Renders payloads for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub format: OutputFormat,
    pub color: bool,
}

impl Renderer {
    pub fn new(format: OutputFormat, color: ColorMode) -> Self {
        Self {
            format,
            color: should_color(color),
        }
    }

    pub fn is_pretty(self) -> bool {
        self.format == OutputFormat::Pretty
    }

    /// Serialize per the chosen JSON style. Pretty callers should use the
    /// typed summaries instead.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Result<String, CliError> {
        let text = match self.format {
            OutputFormat::JsonCompact => serde_json::to_string(data)?,
            OutputFormat::Json | OutputFormat::Pretty => serde_json::to_string_pretty(data)?,
        };
        Ok(text)
    }

    // ── Pretty summaries ─────────────────────────────────────────────

    /// One line describing a channel payload.
    pub fn channel_line(self, channel: Channel, data: &serde_json::Value) -> String {
        let summary = summarize(channel, data);
        format!("{} {summary}", self.label(channel.as_ref()))
    }

    /// A channel label followed by a dimmed note, for missing data.
    pub fn note_line(self, channel: Channel, note: &str) -> String {
        let note = if self.color {
            note.dimmed().to_string()
        } else {
            note.to_owned()
        };
        format!("{} {note}", self.label(channel.as_ref()))
    }

    /// One line describing a connection state.
    pub fn state_line(self, state: &ConnectionState) -> String {
        let status = state.status.to_string();
        let status = if self.color {
            match state.status {
                ConnectionStatus::Connected => status.green().to_string(),
                ConnectionStatus::Connecting => status.yellow().to_string(),
                ConnectionStatus::Error => status.red().to_string(),
                ConnectionStatus::Disconnected => status.dimmed().to_string(),
            }
        } else {
            status
        };

        let mut line = format!("{} {status}", self.label("connection"));
        if state.reconnect_attempts > 0 {
            line.push_str(&format!(" (attempt {})", state.reconnect_attempts));
        }
        if let Some(ref message) = state.error_message {
            line.push_str(&format!(": {message}"));
        }
        if let Some(at) = state.last_connected {
            line.push_str(&format!(" [last connected {}]", at.format("%H:%M:%S")));
        }
        line
    }

    /// `label` padded and, when enabled, bolded.
    fn label(self, label: &str) -> String {
        let padded = format!("{label:<13}");
        if self.color {
            padded.bold().to_string()
        } else {
            padded
        }
    }
}

/// Decode a payload with its channel's model and describe it. Payloads that
/// do not fit the model are described as such instead of failing.
pub fn summarize(channel: Channel, data: &serde_json::Value) -> String {
    let summary = match channel {
        Channel::Collaboration => {
            serde_json::from_value::<CollaborationFlow>(data.clone()).map(|flow| {
                format!(
                    "{} nodes ({} busy), {} edges",
                    flow.nodes.len(),
                    flow.busy_nodes().count(),
                    flow.edges.len()
                )
            })
        }
        Channel::Tasks => serde_json::from_value::<TaskSummary>(data.clone()).map(|tasks| {
            format!(
                "{} total: {} running, {} pending, {} completed, {} failed",
                tasks.total, tasks.running, tasks.pending, tasks.completed, tasks.failed
            )
        }),
        Channel::Performance => {
            serde_json::from_value::<PerformanceSnapshot>(data.clone()).map(|perf| {
                let mut line = format!(
                    "{:.0} tokens/min, {:.0} requests/min",
                    perf.current.tpm, perf.current.rpm
                );
                if let Some(peak) = perf.history.peak_tpm() {
                    line.push_str(&format!(", peak {peak:.0} tokens/min"));
                }
                line
            })
        }
    };
    summary.unwrap_or_else(|e| format!("unrecognized payload ({e})"))
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
