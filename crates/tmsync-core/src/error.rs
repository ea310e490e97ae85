// ── Core error types ──
//
// Errors surfaced by the differ, the compiler and the current-state
// boundary. Validation failures abort a compile before any script text
// exists; callers map them to a user-facing "unprocessable" result.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation errors ────────────────────────────────────────────
    #[error(
        "The {property} of {command} {path} cannot be modified. \
         Delete the {command} and recreate it with the new {property} instead"
    )]
    ImmutableProperty {
        command: String,
        path: String,
        property: String,
    },

    #[error("Invalid topology expression '{text}': {reason}")]
    InvalidTopology { text: String, reason: String },

    #[error("Invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    // ── Shared resource errors ───────────────────────────────────────
    #[error(
        "Reference count for {full_path} would drop below zero \
         (stored {stored}, releasing {released})"
    )]
    ReferenceUnderflow {
        full_path: String,
        stored: i64,
        released: i64,
    },

    // ── Boundary errors ──────────────────────────────────────────────
    #[error("Current state for tenant '{tenant}' could not be loaded: {message}")]
    Source { tenant: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error is a declaration-level validation failure
    /// (the equivalent of an HTTP 422) rather than an operational one.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ImmutableProperty { .. } | Self::InvalidTopology { .. } | Self::InvalidPath { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_property_message_names_object_and_remedy() {
        let err = CoreError::ImmutableProperty {
            command: "ltm virtual-address".into(),
            path: "/Common/10.0.1.10".into(),
            property: "address".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/Common/10.0.1.10"));
        assert!(msg.contains("cannot be modified"));
        assert!(msg.contains("recreate"));
        assert!(err.is_validation());
    }

    #[test]
    fn underflow_is_not_a_validation_error() {
        let err = CoreError::ReferenceUnderflow {
            full_path: "/Common/n1".into(),
            stored: 0,
            released: 1,
        };
        assert!(!err.is_validation());
    }
}
