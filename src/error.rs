//! Error types for Pilot operations.
//!
//! This module defines [`PilotError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `PilotError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `PilotError::Other`) for unexpected errors
//! - Failures inside a run (variable resolution, handler errors) are data on
//!   the run record, not process errors; they never surface through this type

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Pilot operations.
#[derive(Debug, Error)]
pub enum PilotError {
    /// Test case file not found at expected location.
    #[error("Test case not found: {path}")]
    CaseNotFound { path: PathBuf },

    /// Failed to parse a test case file.
    #[error("Failed to parse test case at {path}: {message}")]
    CaseParseError { path: PathBuf, message: String },

    /// Invalid test case structure or values.
    #[error("Invalid test case: {message}")]
    CaseValidationError { message: String },

    /// A step references a type tag no handler is registered for.
    #[error("Step {index} uses unsupported action type '{type_tag}'")]
    UnsupportedAction { index: usize, type_tag: String },

    /// A run id was not found in the registry.
    #[error("Unknown run: {run_id}")]
    UnknownRun { run_id: String },

    /// The run worker thread could not be spawned.
    #[error("Failed to launch run {run_id}: {message}")]
    RunLaunchError { run_id: String, message: String },

    /// Browser session acquisition failed before any step ran.
    #[error("Could not acquire browser session: {message}")]
    SessionError { message: String },

    /// Automation sidecar bridge failure outside a run (e.g. bad endpoint).
    #[error("Bridge configuration error: {message}")]
    BridgeConfigError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Pilot operations.
pub type Result<T> = std::result::Result<T, PilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_not_found_displays_path() {
        let err = PilotError::CaseNotFound {
            path: PathBuf::from("/cases/login.yml"),
        };
        assert!(err.to_string().contains("/cases/login.yml"));
    }

    #[test]
    fn case_parse_error_displays_path_and_message() {
        let err = PilotError::CaseParseError {
            path: PathBuf::from("/cases/bad.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/cases/bad.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn unsupported_action_displays_index_and_tag() {
        let err = PilotError::UnsupportedAction {
            index: 3,
            type_tag: "teleport".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("teleport"));
    }

    #[test]
    fn unknown_run_displays_id() {
        let err = PilotError::UnknownRun {
            run_id: "run_123_abc".into(),
        };
        assert!(err.to_string().contains("run_123_abc"));
    }

    #[test]
    fn session_error_displays_message() {
        let err = PilotError::SessionError {
            message: "no browser available".into(),
        };
        assert!(err.to_string().contains("no browser available"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PilotError = io_err.into();
        assert!(matches!(err, PilotError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(PilotError::CaseValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
