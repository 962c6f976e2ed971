//! Error types for preflight operations.
//!
//! This module defines [`PreflightError`], the error type used throughout
//! the library, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Per-prerequisite failures (a check that exits non-zero, an install that
//!   runs out of attempts) are *values*, folded into statuses and results.
//! - `PreflightError` is reserved for configuration-level problems that the
//!   caller must fix: malformed cache keys, invalid config, unknown ids.
//! - Use `anyhow::Error` (via `PreflightError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for preflight operations.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A cache key component was empty or could collide with the separator.
    #[error("Malformed cache key component '{component}': {reason}")]
    MalformedCacheKey { component: String, reason: String },

    /// Referenced prerequisite is not declared in the configuration.
    #[error("Unknown prerequisite: {id}")]
    UnknownPrerequisite { id: String },

    /// The prerequisite has no install recipe.
    #[error("Prerequisite '{id}' has no install recipe")]
    NotInstallable { id: String },

    /// A progress unifier was driven outside its state machine.
    #[error("Progress for '{operation}' is {state}, expected {expected}")]
    ProgressState {
        operation: String,
        state: String,
        expected: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for preflight operations.
pub type Result<T> = std::result::Result<T, PreflightError>;
