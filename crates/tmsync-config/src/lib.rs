//! Configuration for tmsync.
//!
//! A TOML file in the platform config directory, overlaid with `TMSYNC_*`
//! environment variables, translated into the core crate's diff and
//! compile parameters.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tmsync_core::compiler::{DEFAULT_MARKER_DATA_GROUP, DEFAULT_SCRIPT_NAME};
use tmsync_core::differ::DEFAULT_SHARED_PARTITION;
use tmsync_core::{CompileSettings, DiffContext, Pass, RankTable};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Output defaults for the CLI.
    #[serde(default)]
    pub defaults: Defaults,

    /// Reconciliation parameters.
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcileSettings {
    /// Partition holding reference-counted shared objects.
    #[serde(default = "default_shared_partition")]
    pub shared_partition: String,

    /// Data-group the generated script reports failures into.
    #[serde(default = "default_marker")]
    pub marker_data_group: String,

    #[serde(default = "default_script_name")]
    pub script_name: String,

    /// Pause after GSLB datacenter changes, in milliseconds.
    pub gslb_delay_ms: Option<u64>,

    /// Topology record types, most specific first. Empty means the
    /// built-in order.
    #[serde(default)]
    pub topology_rank: Vec<String>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            shared_partition: default_shared_partition(),
            marker_data_group: default_marker(),
            script_name: default_script_name(),
            gslb_delay_ms: None,
            topology_rank: Vec::new(),
        }
    }
}

fn default_shared_partition() -> String {
    DEFAULT_SHARED_PARTITION.into()
}
fn default_marker() -> String {
    DEFAULT_MARKER_DATA_GROUP.into()
}
fn default_script_name() -> String {
    DEFAULT_SCRIPT_NAME.into()
}

fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.contains(['/', ' ']) {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("'{value}' must be a non-empty name without '/' or spaces"),
        });
    }
    Ok(())
}

impl ReconcileSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_name("shared_partition", &self.shared_partition)?;
        validate_name("marker_data_group", &self.marker_data_group)?;
        validate_name("script_name", &self.script_name)?;
        self.rank_table().map(|_| ())
    }

    pub fn rank_table(&self) -> Result<RankTable, ConfigError> {
        if self.topology_rank.is_empty() {
            return Ok(RankTable::default());
        }
        RankTable::from_names(&self.topology_rank).map_err(|e| ConfigError::Validation {
            field: "topology_rank".into(),
            reason: e.to_string(),
        })
    }

    /// Differ parameters for one scope and pass.
    pub fn diff_context(&self, scope: &str, pass: Pass) -> Result<DiffContext, ConfigError> {
        Ok(DiffContext::new(scope)
            .with_pass(pass)
            .with_shared_partition(self.shared_partition.clone())
            .with_rank_table(self.rank_table()?))
    }

    pub fn compile_settings(&self) -> CompileSettings {
        CompileSettings {
            shared_partition: self.shared_partition.clone(),
            marker_data_group: self.marker_data_group.clone(),
            script_name: self.script_name.clone(),
            gslb_delay_ms: self.gslb_delay_ms,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "tmsync", "tmsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tmsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error; nested keys use `__` in variable names
/// (`TMSYNC_RECONCILE__SHARED_PARTITION`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TMSYNC_").split("__"));

    let config: Config = figment.extract()?;
    config.reconcile.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}
