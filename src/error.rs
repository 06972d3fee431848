//! Error types and result handling for pg-audit-trail.
//!
//! Two kinds of failure exist in this crate. [`Error`] covers the crate's own
//! operations (configuration, settings, tooling). [`HostError`] is the value a
//! backend entry point raises while executing a statement; hooks propagate
//! it unchanged.
//!
//! # Example
//!
//! ```rust
//! use pg_audit_trail::{Error, HostError};
//!
//! let err = Error::PermissionDenied {
//!     name: "pg_audit_trail.log_nested_statements".to_string(),
//! };
//! let raised = HostError::from(err);
//! assert_eq!(raised.sqlstate, "42501");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for pg-audit-trail operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from an invalid file or environment variable.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// JSON error when reading a session script or encoding log records.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from reading a session script.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(String),

    /// A setting name that was never defined.
    #[error("unrecognized configuration parameter \"{name}\"")]
    UnknownSetting {
        /// Name that was looked up
        name: String,
    },

    /// The session is not allowed to change the setting.
    #[error("permission denied to set parameter \"{name}\"")]
    PermissionDenied {
        /// Name of the protected setting
        name: String,
    },

    /// The value could not be parsed for the setting's type.
    #[error("parameter \"{name}\" requires a Boolean value, got \"{value}\"")]
    InvalidValue {
        /// Name of the setting
        name: String,
        /// Rejected input
        value: String,
    },
}

impl Error {
    /// SQLSTATE reported when this error is raised inside a statement.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            Error::UnknownSetting { .. } => sqlstate::UNDEFINED_OBJECT,
            Error::PermissionDenied { .. } => sqlstate::INSUFFICIENT_PRIVILEGE,
            Error::InvalidValue { .. } => sqlstate::INVALID_PARAMETER_VALUE,
            _ => sqlstate::INTERNAL_ERROR,
        }
    }
}

/// A convenient Result type alias for pg-audit-trail operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SQLSTATE codes raised by the backend model.
pub mod sqlstate {
    pub const INTERNAL_ERROR: &str = "XX000";
    pub const UNDEFINED_OBJECT: &str = "42704";
    pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
    pub const INVALID_PARAMETER_VALUE: &str = "22023";
    pub const DIVISION_BY_ZERO: &str = "22012";
}

/// An error raised by a backend entry point while a statement executes.
///
/// This is what an `ERROR`-level report unwinds with. Hooks never inspect
/// or recover from it; they restore their own state and hand the same value
/// back to their caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct HostError {
    /// Five-character SQLSTATE code
    pub sqlstate: String,
    /// Primary error message
    pub message: String,
}

impl HostError {
    pub fn new(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }

    /// An `XX000` error for states the executor should never reach.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(sqlstate::INTERNAL_ERROR, message)
    }
}

impl From<Error> for HostError {
    fn from(err: Error) -> Self {
        HostError::new(err.sqlstate(), err.to_string())
    }
}

/// Result of a backend entry point.
pub type HostResult<T> = std::result::Result<T, HostError>;
