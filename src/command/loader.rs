// src/command/loader.rs

//! Resolving work units by `(module_path, type_name)`.
//!
//! A module is anything a [`ModuleSource`] can turn into a list of
//! [`TypeEntry`]s. The [`CommandLoader`] asks its sources in order, picks the
//! requested type (exact name first, then the first name ending with the
//! requested suffix) and instantiates it behind [`RemoteCommand`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::{RemoteCommand, TransactionMode};
use crate::errors::{Result, RunnerError};

/// Default-constructs a work unit.
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn RemoteCommand> + Send + Sync>;

/// What a type in a module is.
#[derive(Clone)]
pub enum TypeKind {
    /// Satisfies the `RemoteCommand` contract.
    Command(CommandFactory),
    /// Exported by the module but not a work unit.
    Plain,
}

impl fmt::Debug for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Command(_) => f.write_str("Command(..)"),
            TypeKind::Plain => f.write_str("Plain"),
        }
    }
}

/// A named type exported by a module, with its declared metadata.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub full_name: String,
    pub transaction: Option<TransactionMode>,
    pub kind: TypeKind,
}

impl TypeEntry {
    /// A work-unit type built with `T::default()`.
    pub fn command<T>(full_name: impl Into<String>, transaction: Option<TransactionMode>) -> Self
    where
        T: RemoteCommand + Default + 'static,
    {
        Self::command_fn(full_name, transaction, || Box::new(T::default()))
    }

    /// A work-unit type built by `factory`.
    pub fn command_fn<F>(
        full_name: impl Into<String>,
        transaction: Option<TransactionMode>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Box<dyn RemoteCommand> + Send + Sync + 'static,
    {
        Self {
            full_name: full_name.into(),
            transaction,
            kind: TypeKind::Command(Arc::new(factory)),
        }
    }

    /// A type that does not implement the work-unit contract.
    pub fn plain(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            transaction: None,
            kind: TypeKind::Plain,
        }
    }
}

/// A type in a module that could not be loaded. Reported, never fatal to
/// the search for other types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLoadFailure {
    pub name: Option<String>,
    pub reason: String,
}

impl fmt::Display for TypeLoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// The result of loading one module: the types that loaded and the ones
/// that didn't.
#[derive(Debug, Clone, Default)]
pub struct LoadedModule {
    pub types: Vec<TypeEntry>,
    pub failures: Vec<TypeLoadFailure>,
}

/// Something that can load modules.
pub trait ModuleSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether this source is responsible for `module_path`.
    fn handles(&self, module_path: &str) -> bool;

    /// Load the module. An `Err` means the module as a whole is unusable.
    fn load(&self, module_path: &str) -> anyhow::Result<LoadedModule>;
}

/// In-process modules registered by path.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<String, Vec<TypeEntry>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type to the module at `module_path`, creating the module if needed.
    pub fn register(&mut self, module_path: impl Into<String>, entry: TypeEntry) -> &mut Self {
        self.modules.entry(module_path.into()).or_default().push(entry);
        self
    }

    pub fn with_type(mut self, module_path: impl Into<String>, entry: TypeEntry) -> Self {
        self.register(module_path, entry);
        self
    }

    pub fn with_command<T>(
        self,
        module_path: impl Into<String>,
        full_name: impl Into<String>,
        transaction: Option<TransactionMode>,
    ) -> Self
    where
        T: RemoteCommand + Default + 'static,
    {
        self.with_type(module_path, TypeEntry::command::<T>(full_name, transaction))
    }
}

impl ModuleSource for ModuleRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn handles(&self, module_path: &str) -> bool {
        self.modules.contains_key(module_path)
    }

    fn load(&self, module_path: &str) -> anyhow::Result<LoadedModule> {
        let types = self
            .modules
            .get(module_path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("module '{module_path}' is not registered"))?;
        Ok(LoadedModule {
            types,
            failures: Vec::new(),
        })
    }
}

/// A resolved type, ready to be instantiated.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub module_path: String,
    pub entry: TypeEntry,
    /// Types in the same module that failed to load.
    pub diagnostics: Vec<TypeLoadFailure>,
}

impl ResolvedType {
    pub fn full_name(&self) -> &str {
        &self.entry.full_name
    }
}

/// Resolves and instantiates work units through an ordered list of
/// [`ModuleSource`]s. The first source that handles a module path wins.
#[derive(Default, Clone)]
pub struct CommandLoader {
    sources: Vec<Arc<dyn ModuleSource>>,
}

impl fmt::Debug for CommandLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLoader")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CommandLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Find `type_name` in the module at `module_path`.
    pub fn resolve(&self, module_path: &str, type_name: &str) -> Result<ResolvedType> {
        let load_error = |message: String| RunnerError::Load {
            module_path: module_path.to_string(),
            type_name: type_name.to_string(),
            message,
        };

        if type_name.trim().is_empty() {
            return Err(load_error("type name is empty".to_string()));
        }

        let source = self
            .sources
            .iter()
            .find(|s| s.handles(module_path))
            .ok_or_else(|| load_error("no module source can load this module".to_string()))?;

        debug!(source = source.name(), module = module_path, "loading module");
        let module = source
            .load(module_path)
            .map_err(|e| load_error(format!("{e:#}")))?;

        for failure in &module.failures {
            warn!(module = module_path, failure = %failure, "type failed to load; continuing");
        }

        let entry = module
            .types
            .iter()
            .find(|t| t.full_name == type_name)
            .or_else(|| module.types.iter().find(|t| t.full_name.ends_with(type_name)))
            .cloned();

        match entry {
            Some(entry) => {
                debug!(
                    module = module_path,
                    requested = type_name,
                    resolved = %entry.full_name,
                    "type resolved"
                );
                Ok(ResolvedType {
                    module_path: module_path.to_string(),
                    entry,
                    diagnostics: module.failures,
                })
            }
            None => {
                let mut message = format!("no type matches among {} loaded", module.types.len());
                if !module.failures.is_empty() {
                    let failures: Vec<String> =
                        module.failures.iter().map(|f| f.to_string()).collect();
                    message.push_str(&format!("; load failures: {}", failures.join("; ")));
                }
                Err(load_error(message))
            }
        }
    }

    /// Build the work unit behind the resolved type.
    pub fn instantiate(&self, resolved: &ResolvedType) -> Result<Box<dyn RemoteCommand>> {
        match &resolved.entry.kind {
            TypeKind::Command(factory) => Ok(factory()),
            TypeKind::Plain => Err(RunnerError::Interface(resolved.entry.full_name.clone())),
        }
    }
}
