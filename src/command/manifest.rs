// src/command/manifest.rs

//! Modules described by TOML manifests.
//!
//! ```toml
//! [[types]]
//! name = "Exports.Sheets.SheetExport"
//! transaction = "automatic"
//! program = "export-sheets"
//! args = ["--input", "{document}"]
//! cancel_exit_code = 2
//!
//! [[types]]
//! name = "Exports.Sheets.Formatting"   # no program: not a command
//! ```
//!
//! Each `[[types]]` entry is decoded on its own, so one broken entry becomes
//! a [`TypeLoadFailure`] instead of hiding the rest of the module.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::command::loader::{LoadedModule, ModuleSource, TypeEntry, TypeLoadFailure};
use crate::command::{CommandResult, Document, RemoteCommand, TransactionMode};
use crate::fs::FileSystem;

/// Environment variable carrying the document path into manifest programs.
pub const DOCUMENT_ENV_VAR: &str = "REMOTE_RUNNER_DOCUMENT";

#[derive(Debug, Clone, Deserialize)]
struct ManifestType {
    name: String,
    #[serde(default)]
    transaction: Option<TransactionMode>,
    #[serde(default)]
    program: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cancel_exit_code: Option<i32>,
}

/// Loads `*.toml` module paths as manifests.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    fs: Arc<dyn FileSystem>,
}

impl ManifestSource {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ModuleSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn handles(&self, module_path: &str) -> bool {
        Path::new(module_path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
    }

    fn load(&self, module_path: &str) -> anyhow::Result<LoadedModule> {
        let text = self.fs.read_to_string(Path::new(module_path))?;
        let table: toml::Table =
            toml::from_str(&text).with_context(|| format!("parsing manifest {module_path}"))?;

        let entries = match table.get("types") {
            Some(toml::Value::Array(entries)) => entries,
            Some(_) => return Err(anyhow!("`types` in {module_path} must be an array of tables")),
            None => return Err(anyhow!("manifest {module_path} declares no [[types]]")),
        };

        let mut module = LoadedModule::default();
        for (idx, value) in entries.iter().enumerate() {
            match ManifestType::deserialize(value.clone()) {
                Ok(decl) => module.types.push(decl.into_entry()),
                Err(e) => module.failures.push(TypeLoadFailure {
                    name: value
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string)
                        .or_else(|| Some(format!("types[{idx}]"))),
                    reason: e.to_string(),
                }),
            }
        }

        debug!(
            module = module_path,
            types = module.types.len(),
            failures = module.failures.len(),
            "manifest loaded"
        );
        Ok(module)
    }
}

impl ManifestType {
    fn into_entry(self) -> TypeEntry {
        match self.program {
            Some(program) => {
                let command = ShellCommand {
                    type_name: self.name.clone(),
                    program,
                    args: self.args,
                    cancel_exit_code: self.cancel_exit_code,
                };
                TypeEntry::command_fn(self.name, self.transaction, move || {
                    Box::new(command.clone())
                })
            }
            None => {
                let mut entry = TypeEntry::plain(self.name);
                entry.transaction = self.transaction;
                entry
            }
        }
    }
}

/// Work unit that runs an external program against the document.
///
/// `{document}` in the configured args is replaced by the document path;
/// job args are appended after them.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    type_name: String,
    program: String,
    args: Vec<String>,
    cancel_exit_code: Option<i32>,
}

impl ShellCommand {
    pub fn new(type_name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            program: program.into(),
            args: Vec::new(),
            cancel_exit_code: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancel_exit_code(mut self, code: i32) -> Self {
        self.cancel_exit_code = Some(code);
        self
    }

    fn classify(&self, code: Option<i32>) -> CommandResult {
        match code {
            Some(0) => CommandResult::Succeeded,
            Some(c) if Some(c) == self.cancel_exit_code => CommandResult::Cancelled,
            _ => CommandResult::Failed,
        }
    }
}

impl RemoteCommand for ShellCommand {
    fn run_remotely(&mut self, document: &mut dyn Document, args: &[String]) -> CommandResult {
        let doc_path = document.path_name().to_string();
        let argv: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{document}", &doc_path))
            .chain(args.iter().cloned())
            .collect();

        info!(
            type_name = %self.type_name,
            program = %self.program,
            ?argv,
            "starting command process"
        );

        let output = Command::new(&self.program)
            .args(&argv)
            .env(DOCUMENT_ENV_VAR, &doc_path)
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => {
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    debug!(type_name = %self.type_name, "stdout: {}", line);
                }
                for line in String::from_utf8_lossy(&output.stderr).lines() {
                    debug!(type_name = %self.type_name, "stderr: {}", line);
                }
                let code = output.status.code();
                let result = self.classify(code);
                info!(
                    type_name = %self.type_name,
                    exit_code = code.unwrap_or(-1),
                    %result,
                    "command process exited"
                );
                result
            }
            Err(err) => {
                error!(
                    type_name = %self.type_name,
                    program = %self.program,
                    error = %err,
                    "failed to spawn command process"
                );
                CommandResult::Failed
            }
        }
    }
}
