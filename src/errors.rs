// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// Bad command-line input. Raised before any side effect.
    #[error("usage: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unreadable or corrupt descriptor, or an unreadable drop zone.
    #[error("drop zone error at {path:?}: {message}")]
    StoreIo { path: PathBuf, message: String },

    /// Module or type resolution failed.
    #[error("could not load '{type_name}' from '{module_path}': {message}")]
    Load {
        module_path: String,
        type_name: String,
        message: String,
    },

    /// The resolved type does not satisfy the `RemoteCommand` contract.
    #[error("type '{0}' is not a remote command")]
    Interface(String),

    /// The work unit returned `Failed` or panicked.
    #[error("execution of '{type_name}' failed: {message}")]
    Execution { type_name: String, message: String },

    #[error("{what} did not finish within {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("materialization failed: {0}")]
    Materialize(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunnerError {
    pub(crate) fn store_io(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RunnerError::StoreIo {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
