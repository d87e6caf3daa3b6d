//! Config subcommand handlers.

use std::collections::HashMap;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub fn handle(args: ConfigArgs, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Show: effective config after env overrides ──────────────
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = if renderer.is_pretty() {
                toml::to_string_pretty(&cfg)?
            } else {
                renderer.json(&cfg)?
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Init: write a single-profile config ─────────────────────
        ConfigCommand::Init {
            name,
            host,
            port,
            ws_url,
            force,
        } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let profile = Profile {
                host,
                port,
                url: ws_url,
                ..Profile::default()
            };
            // Validate before writing anything.
            config::profile_to_realtime_config(&profile, &Defaults::default())?;

            let mut profiles = HashMap::new();
            profiles.insert(name.clone(), profile);
            let cfg = Config {
                default_profile: Some(name.clone()),
                defaults: Defaults::default(),
                profiles,
            };

            let written = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", written.display());
                eprintln!("  Active profile: {name}");
                eprintln!("\n  Test it: agentboard status");
            }
            Ok(())
        }
    }
}
