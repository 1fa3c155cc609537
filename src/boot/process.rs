// src/boot/process.rs

//! Pluggable process launching for the orchestrator.
//!
//! The orchestrator starts two kinds of processes: the optional
//! materialization tool and the host application. It talks to them through
//! [`ProcessLauncher`] / [`ManagedProcess`] so tests can substitute fakes
//! for real OS processes.
//!
//! - [`TokioProcessLauncher`] is the production implementation built on
//!   `tokio::process`. Children are killed on drop and their stdout/stderr
//!   are drained into debug logs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::ProcessSection;
use crate::errors::{Result, RunnerError};

/// Values substituted into `{source}`, `{target}` and `{target_dir}`.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub source: &'a str,
    pub target: &'a str,
}

impl TemplateVars<'_> {
    fn target_dir(&self) -> Option<&Path> {
        Path::new(self.target)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn expand(&self, arg: &str) -> String {
        let target_dir = self
            .target_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        arg.replace("{source}", self.source)
            .replace("{target_dir}", &target_dir)
            .replace("{target}", self.target)
    }
}

/// A fully expanded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Expand a configured command for one job.
    pub fn render(section: &ProcessSection, vars: &TemplateVars<'_>) -> Self {
        Self {
            program: vars.expand(&section.program),
            args: section.args.iter().map(|a| vars.expand(a)).collect(),
            working_dir: section
                .working_dir
                .clone()
                .or_else(|| vars.target_dir().map(Path::to_path_buf)),
        }
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A process started by a [`ProcessLauncher`].
pub trait ManagedProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> Result<Option<ProcessExit>>;

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + '_>>;

    /// Forcibly terminate the process and reap it.
    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Trait abstracting how the orchestrator starts processes.
pub trait ProcessLauncher: Send {
    fn launch(&mut self, spec: &ProcessSpec) -> Result<Box<dyn ManagedProcess>>;
}

/// Launcher backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl ProcessLauncher for TokioProcessLauncher {
    fn launch(&mut self, spec: &ProcessSpec) -> Result<Box<dyn ManagedProcess>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            if dir.is_dir() {
                cmd.current_dir(dir);
            } else {
                warn!(dir = ?dir, program = %spec.program, "working directory missing; using current dir");
            }
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}'", spec.program))?;

        info!(
            program = %spec.program,
            args = ?spec.args,
            pid = child.id(),
            "process started"
        );

        if let Some(stdout) = child.stdout.take() {
            drain_lines(spec.program.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(spec.program.clone(), "stderr", stderr);
        }

        Ok(Box::new(TokioProcess {
            label: spec.program.clone(),
            child,
        }))
    }
}

/// Consume a child's output so its pipe buffers never fill; log at debug.
fn drain_lines<R>(label: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(process = %label, stream, "{}", line);
        }
    });
}

struct TokioProcess {
    label: String,
    child: Child,
}

impl ManagedProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<ProcessExit>> {
        let status = self
            .child
            .try_wait()
            .with_context(|| format!("checking process '{}'", self.label))?;
        Ok(status.map(|s| ProcessExit { code: s.code() }))
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + '_>> {
        Box::pin(async move {
            let status = self
                .child
                .wait()
                .await
                .with_context(|| format!("waiting for process '{}'", self.label))?;
            Ok(ProcessExit {
                code: status.code(),
            })
        })
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.child
                .kill()
                .await
                .with_context(|| format!("killing process '{}'", self.label))?;
            Ok(())
        })
    }
}

/// Wait for `process` to exit within `deadline`; kill it otherwise.
pub async fn wait_with_deadline(
    process: &mut dyn ManagedProcess,
    deadline: Duration,
    what: &str,
) -> Result<ProcessExit> {
    match tokio::time::timeout(deadline, process.wait()).await {
        Ok(exit) => exit,
        Err(_elapsed) => {
            warn!(what, ?deadline, "deadline exceeded; killing process");
            if let Err(err) = process.kill().await {
                warn!(what, error = %err, "failed to kill process after deadline");
            }
            Err(RunnerError::Timeout {
                what: what.to_string(),
                after: deadline,
            })
        }
    }
}
