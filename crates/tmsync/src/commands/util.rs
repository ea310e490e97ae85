//! Shared helpers for command handlers.

use std::path::Path;

use tmsync_config::Config;
use tmsync_core::source::{load_common_state, load_tree, save_common_state};
use tmsync_core::{CommonState, ConfigTree, DiffContext, FileSource, fetch_current};

use crate::cli::InputArgs;
use crate::error::CliError;

/// Everything a diff or compile reads from disk.
#[derive(Debug)]
pub struct Inputs {
    pub current: ConfigTree,
    pub desired: ConfigTree,
    pub common: CommonState,
}

/// Read a tree, distinguishing a missing file from an unreadable one.
async fn read_tree(path: &Path, flag: &str) -> Result<ConfigTree, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound {
            path: path.display().to_string(),
            flag: flag.into(),
        });
    }
    load_tree(path).await.map_err(|source| CliError::Input {
        what: "configuration tree".into(),
        path: path.display().to_string(),
        source,
    })
}

/// Load desired, current and shared state for one scope.
///
/// Without `--current` or `--current-dir` the device is treated as empty.
pub async fn load_inputs(input: &InputArgs) -> Result<Inputs, CliError> {
    let desired = read_tree(&input.desired, "desired").await?;

    let current = match (&input.current, &input.current_dir) {
        (Some(path), _) => read_tree(path, "current").await?,
        (None, Some(dir)) => fetch_current(&FileSource::new(dir), &input.scope).await?,
        (None, None) => ConfigTree::new(),
    };

    let common = match &input.common {
        Some(path) => load_common_state(path).await.map_err(|source| CliError::Input {
            what: "shared-object state".into(),
            path: path.display().to_string(),
            source,
        })?,
        None => CommonState::new(),
    };

    tracing::debug!(
        desired = desired.len(),
        current = current.len(),
        "inputs loaded"
    );
    Ok(Inputs {
        current,
        desired,
        common,
    })
}

/// Differ parameters for the scope and pass on the command line.
pub fn diff_context(cfg: &Config, input: &InputArgs) -> Result<DiffContext, CliError> {
    Ok(cfg.reconcile.diff_context(&input.scope, input.pass.into())?)
}

/// Write the updated counts back when `--save-common` was given.
pub async fn persist_common(input: &InputArgs, common: &CommonState) -> Result<(), CliError> {
    if let (true, Some(path)) = (input.save_common, &input.common) {
        save_common_state(path, common).await?;
        tracing::info!(path = %path.display(), "shared-object state saved");
    }
    Ok(())
}
