//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tmsync_config::ConfigError;
use tmsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const UNPROCESSABLE: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Declaration ──────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(tmsync::unprocessable),
        help("The declaration asks for a change the device cannot make in place; no script was produced.")
    )]
    Unprocessable { message: String },

    // ── Inputs ───────────────────────────────────────────────────────

    #[error("Input file not found: {path}")]
    #[diagnostic(code(tmsync::not_found), help("Check the path passed to --{flag}."))]
    NotFound { path: String, flag: String },

    #[error("Could not read {what} from {path}")]
    #[diagnostic(code(tmsync::input), help("The file must contain a JSON {what}."))]
    Input {
        what: String,
        path: String,
        #[source]
        source: CoreError,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tmsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(tmsync::config_exists),
        help("Use --force to overwrite it.\nLocation: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(tmsync::config))]
    Config(Box<figment::Error>),

    // ── Core ─────────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(tmsync::core))]
    Core(CoreError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(tmsync::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(tmsync::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unprocessable { .. } => exit_code::UNPROCESSABLE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError / ConfigError → CliError mapping ───────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_validation() {
            return Self::Unprocessable {
                message: err.to_string(),
            };
        }
        Self::Core(err)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Figment(inner) => Self::Config(inner),
            ConfigError::Io(e) => Self::Io(e),
            ConfigError::Serialization(e) => Self::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_change_is_unprocessable() {
        let err: CliError = CoreError::ImmutableProperty {
            command: "ltm virtual-address".into(),
            path: "/T/A/va".into(),
            property: "address".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::UNPROCESSABLE);
        assert!(err.to_string().contains("/T/A/va"));
    }

    #[test]
    fn operational_errors_are_general() {
        let err: CliError = CoreError::Internal("boom".into()).into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_validation_is_usage() {
        let err: CliError = ConfigError::Validation {
            field: "topology_rank".into(),
            reason: "unknown".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
