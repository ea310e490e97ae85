//! Config subcommand handlers.

use std::fmt::Write;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// TOML-like view of the resolved configuration.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out);
    let r = &cfg.reconcile;
    let _ = writeln!(out, "[reconcile]");
    let _ = writeln!(out, "shared_partition = \"{}\"", r.shared_partition);
    let _ = writeln!(out, "marker_data_group = \"{}\"", r.marker_data_group);
    let _ = writeln!(out, "script_name = \"{}\"", r.script_name);
    if let Some(ms) = r.gslb_delay_ms {
        let _ = writeln!(out, "gslb_delay_ms = {ms}");
    }
    if !r.topology_rank.is_empty() {
        let quoted: Vec<String> = r.topology_rank.iter().map(|t| format!("\"{t}\"")).collect();
        let _ = writeln!(out, "topology_rank = [{}]", quoted.join(", "));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::active_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote default configuration to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let format = config::output_format(global, &cfg)?;
            let out = output::render_single(format, &cfg, format_config)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::active_path(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}
