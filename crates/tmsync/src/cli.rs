//! Clap derive structures for the `tmsync` CLI.
//!
//! Defines the command tree, global flags, and shared argument groups.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use tmsync_core::Pass;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tmsync -- reconcile declared tmsh configuration with a device
#[derive(Debug, Parser)]
#[command(
    name = "tmsync",
    version,
    about = "Diff declared tmsh configuration and compile transactional update scripts",
    long_about = "Compares a tenant's running configuration tree with the desired one,\n\
        tracks references to shared nodes and virtual-addresses, and compiles\n\
        the difference into a single cli script with rollback.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the config file's setting)
    #[arg(long, short = 'o', env = "TMSYNC_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output (defaults to the config file's setting)
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
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
pub enum PassArg {
    /// Shared-scope first pass: releases are deferred
    First,
    /// Regular pass
    Final,
}

impl From<PassArg> for Pass {
    fn from(arg: PassArg) -> Self {
        match arg {
            PassArg::First => Self::First,
            PassArg::Final => Self::Final,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the typed differences between current and desired trees
    #[command(alias = "d")]
    Diff(DiffArgs),

    /// Compile the differences into a transactional cli script
    #[command(alias = "c")]
    Compile(CompileArgs),

    /// Parse and order GSLB topology records
    #[command(alias = "topo")]
    Topology(TopologyArgs),

    /// Manage tmsync configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Input Arguments ───────────────────────────────────────────

/// Where the trees and shared-object state come from.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Desired configuration tree (JSON)
    #[arg(long)]
    pub desired: PathBuf,

    /// Current configuration tree (JSON); omitted means an empty device
    #[arg(long, conflicts_with = "current_dir")]
    pub current: Option<PathBuf>,

    /// Directory of `<scope>.json` snapshots to read the current tree from
    #[arg(long)]
    pub current_dir: Option<PathBuf>,

    /// Persisted shared-object reference counts (JSON)
    #[arg(long)]
    pub common: Option<PathBuf>,

    /// Write updated reference counts back to --common
    #[arg(long, requires = "common")]
    pub save_common: bool,

    /// Scope (tenant partition) being reconciled
    #[arg(long, short = 't', alias = "tenant")]
    pub scope: String,

    /// Reconciliation pass
    #[arg(long, default_value = "final")]
    pub pass: PassArg,
}

// ── Diff ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

// ── Compile ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Fixed task id for shadow import names (random by default)
    #[arg(long)]
    pub task_id: Option<String>,

    /// Show the structured plan instead of the script text
    #[arg(long)]
    pub plan: bool,
}

// ── Topology ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopologyArgs {
    #[command(subcommand)]
    pub command: TopologyCommand,
}

#[derive(Debug, Subcommand)]
pub enum TopologyCommand {
    /// Parse match expressions into normalized records
    Parse {
        /// Expressions such as "region /Common/r1" or "not country US"
        #[arg(required = true)]
        expressions: Vec<String>,
    },

    /// Order a JSON list of records by specificity
    Order {
        /// File with `[{ "source", "destination", "weight" }]`
        file: PathBuf,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
