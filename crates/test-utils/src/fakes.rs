#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remote_runner::boot::{ManagedProcess, ProcessExit, ProcessLauncher, ProcessSpec};
use remote_runner::command::{
    CommandResult, Document, RemoteCommand, TransactionMode, TypeEntry,
};
use remote_runner::dispatch::Notifier;
use remote_runner::errors::Result;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    Begin(String),
    Commit,
    Rollback,
}

/// A document that only records transaction calls.
#[derive(Debug, Clone)]
pub struct RecordingDocument {
    path_name: String,
    journal: Arc<Mutex<Vec<TxEvent>>>,
}

impl RecordingDocument {
    pub fn new(path_name: &str) -> Self {
        Self {
            path_name: path_name.to_string(),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn journal(&self) -> Vec<TxEvent> {
        self.journal.lock().unwrap().clone()
    }
}

impl Document for RecordingDocument {
    fn path_name(&self) -> &str {
        &self.path_name
    }

    fn begin_transaction(&mut self, name: &str) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(TxEvent::Begin(name.to_string()));
        Ok(())
    }

    fn commit_transaction(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(TxEvent::Commit);
        Ok(())
    }

    fn rollback_transaction(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(TxEvent::Rollback);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Work units
// ---------------------------------------------------------------------------

/// What a [`ScriptedCommand`] does when run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed,
    Cancel,
    Fail,
    Panic,
    /// Opens and commits its own unit of work, then succeeds.
    OwnTransaction,
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub type_name: String,
    pub document: String,
    pub args: Vec<String>,
}

/// Shared log of every scripted run.
#[derive(Debug, Clone, Default)]
pub struct RunLog(Arc<Mutex<Vec<RunRecord>>>);

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.runs().into_iter().map(|r| r.type_name).collect()
    }
}

/// Work unit whose behaviour is fixed up front.
pub struct ScriptedCommand {
    type_name: String,
    script: Script,
    log: RunLog,
}

impl ScriptedCommand {
    /// A registry entry producing this work unit.
    pub fn entry(
        full_name: &str,
        transaction: Option<TransactionMode>,
        script: Script,
        log: &RunLog,
    ) -> TypeEntry {
        let type_name = full_name.to_string();
        let log = log.clone();
        TypeEntry::command_fn(full_name, transaction, move || {
            Box::new(ScriptedCommand {
                type_name: type_name.clone(),
                script,
                log: log.clone(),
            })
        })
    }
}

impl RemoteCommand for ScriptedCommand {
    fn run_remotely(&mut self, document: &mut dyn Document, args: &[String]) -> CommandResult {
        self.log.0.lock().unwrap().push(RunRecord {
            type_name: self.type_name.clone(),
            document: document.path_name().to_string(),
            args: args.to_vec(),
        });

        match self.script {
            Script::Succeed => CommandResult::Succeeded,
            Script::Cancel => CommandResult::Cancelled,
            Script::Fail => CommandResult::Failed,
            Script::Panic => panic!("{} blew up", self.type_name),
            Script::OwnTransaction => {
                document
                    .begin_transaction("own")
                    .and_then(|_| document.commit_transaction())
                    .map(|_| CommandResult::Succeeded)
                    .unwrap_or(CommandResult::Failed)
            }
        }
    }
}

/// Default-constructible work unit for `TypeEntry::command::<T>()`.
#[derive(Debug, Default)]
pub struct NoopCommand;

impl RemoteCommand for NoopCommand {
    fn run_remotely(&mut self, _document: &mut dyn Document, _args: &[String]) -> CommandResult {
        CommandResult::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, title: &str, message: &str) {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

/// How a fake process behaves once launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Exits immediately with the given code.
    ExitWith(i32),
    /// Exits with `code` after `after` of (tokio) time.
    ExitAfter { after: Duration, code: i32 },
    /// Runs until killed.
    Hang,
    /// `launch` itself fails.
    FailToStart,
}

/// Launcher that records launches and kills instead of spawning processes.
/// Clones share their records.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    behaviours: HashMap<String, FakeBehaviour>,
    default: FakeBehaviour,
    launches: Arc<Mutex<Vec<ProcessSpec>>>,
    kills: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLauncher {
    /// Every program hangs unless configured otherwise.
    pub fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            default: FakeBehaviour::Hang,
            launches: Arc::new(Mutex::new(Vec::new())),
            kills: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_program(mut self, program: &str, behaviour: FakeBehaviour) -> Self {
        self.behaviours.insert(program.to_string(), behaviour);
        self
    }

    pub fn launches(&self) -> Vec<ProcessSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launched_programs(&self) -> Vec<String> {
        self.launches().into_iter().map(|s| s.program).collect()
    }

    pub fn kills(&self) -> Vec<String> {
        self.kills.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&mut self, spec: &ProcessSpec) -> Result<Box<dyn ManagedProcess>> {
        let behaviour = self
            .behaviours
            .get(&spec.program)
            .copied()
            .unwrap_or(self.default);
        if behaviour == FakeBehaviour::FailToStart {
            return Err(anyhow::anyhow!("cannot start '{}'", spec.program).into());
        }
        self.launches.lock().unwrap().push(spec.clone());
        Ok(Box::new(FakeProcess {
            program: spec.program.clone(),
            behaviour,
            kills: Arc::clone(&self.kills),
            killed: false,
        }))
    }
}

struct FakeProcess {
    program: String,
    behaviour: FakeBehaviour,
    kills: Arc<Mutex<Vec<String>>>,
    killed: bool,
}

impl ManagedProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn try_wait(&mut self) -> Result<Option<ProcessExit>> {
        Ok(match self.behaviour {
            _ if self.killed => Some(ProcessExit { code: None }),
            FakeBehaviour::ExitWith(code) => Some(ProcessExit { code: Some(code) }),
            _ => None,
        })
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + '_>> {
        let behaviour = self.behaviour;
        let killed = self.killed;
        Box::pin(async move {
            if killed {
                return Ok(ProcessExit { code: None });
            }
            match behaviour {
                FakeBehaviour::ExitWith(code) => Ok(ProcessExit { code: Some(code) }),
                FakeBehaviour::ExitAfter { after, code } => {
                    tokio::time::sleep(after).await;
                    Ok(ProcessExit { code: Some(code) })
                }
                FakeBehaviour::Hang | FakeBehaviour::FailToStart => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        })
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.killed = true;
        self.kills.lock().unwrap().push(self.program.clone());
        Box::pin(async { Ok(()) })
    }
}
