//! Result and error types for Navcov.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Navcov operations
pub type NavcovResult<T> = Result<T, NavcovError>;

/// Errors that can occur in Navcov
///
/// Only `Argument` and `InvalidState` ever escape `setup`. Everything raised
/// while preserving or snapshotting coverage is recovered locally and turned
/// into a report entry.
#[derive(Debug, Error)]
pub enum NavcovError {
    /// Malformed configuration, target binding or call argument
    #[error("ArgumentError: {message}")]
    Argument {
        /// Error message
        message: String,
    },

    /// Missing or unusable remote driver
    #[error("InterfaceError: {message}")]
    Interface {
        /// Error message
        message: String,
    },

    /// The remote script ran but failed
    #[error("ScriptExecutionError: {message}")]
    ScriptExecution {
        /// Error message
        message: String,
    },

    /// Durable write of a coverage snapshot failed
    #[error("WriteError: failed to write {}: {message}", path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A wrapped original function failed
    #[error("target function failed: {message}")]
    Target {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong lifecycle state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl NavcovError {
    /// Create an argument error
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create an interface error
    #[must_use]
    pub fn interface(message: impl Into<String>) -> Self {
        Self::Interface {
            message: message.into(),
        }
    }

    /// Create a script execution error
    #[must_use]
    pub fn script_execution(message: impl Into<String>) -> Self {
        Self::ScriptExecution {
            message: message.into(),
        }
    }

    /// Create a write error for `path`
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a target function error
    #[must_use]
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Short taxonomy name, matching the `Display` prefix of the variant
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Argument { .. } => "ArgumentError",
            Self::Interface { .. } => "InterfaceError",
            Self::ScriptExecution { .. } => "ScriptExecutionError",
            Self::Write { .. } => "WriteError",
            Self::Target { .. } => "TargetError",
            Self::InvalidState { .. } => "InvalidStateError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
            Self::Yaml(_) => "YamlError",
        }
    }
}
