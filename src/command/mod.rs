// src/command/mod.rs

//! The work-unit capability contract and everything needed to invoke a work
//! unit by name.
//!
//! - [`loader`] resolves `(module_path, type_name)` to a [`loader::ResolvedType`]
//!   and instantiates it behind [`RemoteCommand`].
//! - [`manifest`] is a module source whose modules are TOML manifests
//!   describing external programs.
//! - [`transaction`] decides whether an automatic unit of work wraps the call.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

pub mod loader;
pub mod manifest;
pub mod transaction;

pub use loader::{
    CommandFactory, CommandLoader, LoadedModule, ModuleRegistry, ModuleSource, ResolvedType,
    TypeEntry, TypeKind, TypeLoadFailure,
};
pub use manifest::{ManifestSource, ShellCommand};
pub use transaction::{determine_policy, run_in_transaction, TransactionPolicy};

/// Tri-state outcome of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Succeeded,
    Cancelled,
    Failed,
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandResult::Succeeded => "succeeded",
            CommandResult::Cancelled => "cancelled",
            CommandResult::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Transaction metadata a work-unit type may declare.
///
/// Parsed case-insensitively, both from manifests and from strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TransactionMode {
    /// The runner opens a unit of work, commits on success and rolls back
    /// otherwise.
    Automatic,
    /// The work unit manages its own units of work.
    Manual,
}

impl FromStr for TransactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "automatic" => Ok(TransactionMode::Automatic),
            "manual" => Ok(TransactionMode::Manual),
            other => Err(format!(
                "invalid transaction mode: {other} (expected \"automatic\" or \"manual\")"
            )),
        }
    }
}

impl TryFrom<String> for TransactionMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Handle to an open document in the host application.
///
/// The host's document model is opaque to the runner; it only needs the
/// document's path (to match jobs) and a way to open, commit and roll back a
/// unit of work on it.
pub trait Document {
    /// Path the host opened the document from. Jobs are matched against it.
    fn path_name(&self) -> &str;

    fn begin_transaction(&mut self, name: &str) -> anyhow::Result<()>;
    fn commit_transaction(&mut self) -> anyhow::Result<()>;
    fn rollback_transaction(&mut self) -> anyhow::Result<()>;
}

/// A unit of work that can be invoked by name against an open document.
pub trait RemoteCommand {
    fn run_remotely(&mut self, document: &mut dyn Document, args: &[String]) -> CommandResult;
}
