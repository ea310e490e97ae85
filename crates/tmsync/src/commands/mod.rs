//! Command handlers.

pub mod compile;
pub mod config_cmd;
pub mod diff;
pub mod topology;
pub mod util;

use tmsync_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Diff(args) => diff::handle(args, cfg, global).await,
        Command::Compile(args) => compile::handle(args, cfg, global).await,
        Command::Topology(args) => topology::handle(args, cfg, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Ok(()),
    }
}
