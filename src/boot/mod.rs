// src/boot/mod.rs

//! Producer side: queue a job, bring up the host, wait for the job to finish.
//!
//! The sequence for one [`BootRequest`]:
//! 1. publish the job descriptor (before the host starts, so the host's
//!    document-opened event can see it),
//! 2. materialize a remote target locally if configured and needed,
//! 3. launch the host against the target,
//! 4. poll the drop zone until the descriptor is gone or the ceiling is hit,
//! 5. let the host exit on its own within the grace period, or kill it.
//!    On timeout the host is killed right away and the job is abandoned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{BootSettings, ConfigFile, ProcessSection};
use crate::errors::{Result, RunnerError};
use crate::fs::FileSystem;
use crate::store::{DropZone, QueueItem};

pub mod poll;
pub mod process;

pub use poll::{wait_for_completion, PollOutcome, PollPolicy};
pub use process::{
    wait_with_deadline, ManagedProcess, ProcessExit, ProcessLauncher, ProcessSpec, TemplateVars,
    TokioProcessLauncher,
};

/// One job as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRequest {
    /// Where the target lives if it is not local (e.g. a server path).
    pub source: String,
    /// Document the job runs against; also what the host opens.
    pub target: String,
    pub module_path: String,
    pub type_name: String,
    pub extra_args: Vec<String>,
}

impl BootRequest {
    pub const USAGE: &'static str = "remote-boot <source> <target> <module> <type> [args...]";

    /// Parse `<source> <target> <module> <type> [args...]`.
    pub fn from_positional(args: &[String]) -> Result<Self> {
        match args {
            [source, target, module_path, type_name, extra @ ..] => Ok(Self {
                source: source.clone(),
                target: target.clone(),
                module_path: module_path.clone(),
                type_name: type_name.clone(),
                extra_args: extra.to_vec(),
            }),
            _ => Err(RunnerError::Usage(format!(
                "expected at least 4 arguments, got {}: {}",
                args.len(),
                Self::USAGE
            ))),
        }
    }

    fn vars(&self) -> TemplateVars<'_> {
        TemplateVars {
            source: &self.source,
            target: &self.target,
        }
    }
}

/// A job that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOutcome {
    pub item_id: Uuid,
    pub item_path: PathBuf,
    pub polls: u32,
}

/// Drives a [`BootRequest`] from descriptor to host shutdown.
pub struct Orchestrator<L: ProcessLauncher> {
    drop_zone: DropZone,
    launcher: L,
    settings: BootSettings,
    host: ProcessSection,
    materialize: Option<ProcessSection>,
}

impl<L: ProcessLauncher> std::fmt::Debug for Orchestrator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("drop_zone", &self.drop_zone)
            .field("settings", &self.settings)
            .field("host", &self.host)
            .field("materialize", &self.materialize)
            .finish_non_exhaustive()
    }
}

impl<L: ProcessLauncher> Orchestrator<L> {
    pub fn new(config: &ConfigFile, fs: Arc<dyn FileSystem>, launcher: L) -> Self {
        Self {
            drop_zone: DropZone::new(config.drop_zone.clone(), fs),
            launcher,
            settings: config.boot,
            host: config.host.clone(),
            materialize: config.materialize.clone(),
        }
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// The descriptor this request would publish. Writes nothing.
    pub fn prepare(&self, request: &BootRequest) -> QueueItem {
        let mut item = self.drop_zone.create_item(
            request.target.clone(),
            request.module_path.clone(),
            request.type_name.clone(),
        );
        for arg in &request.extra_args {
            item.add_argument(arg.clone());
        }
        item
    }

    /// The host command line this request would launch.
    pub fn host_spec(&self, request: &BootRequest) -> ProcessSpec {
        ProcessSpec::render(&self.host, &request.vars())
    }

    pub async fn run(&mut self, request: &BootRequest) -> Result<BootOutcome> {
        let item = self.prepare(request);
        let item_path = self.drop_zone.persist(&item)?;

        self.materialize_target(request).await?;

        let host_spec = self.host_spec(request);
        let mut host = self.launcher.launch(&host_spec)?;
        info!(
            item_id = %item.id(),
            program = %host_spec.program,
            pid = host.id(),
            "host launched; waiting for job completion"
        );

        let policy = PollPolicy::from(&self.settings);
        match wait_for_completion(&self.drop_zone, &item, policy).await {
            PollOutcome::Completed { polls } => {
                self.close_host(host.as_mut()).await;
                Ok(BootOutcome {
                    item_id: item.id(),
                    item_path,
                    polls,
                })
            }
            PollOutcome::TimedOut { polls } => {
                warn!(
                    item_id = %item.id(),
                    polls,
                    "job not completed in time; terminating host"
                );
                if let Err(err) = host.kill().await {
                    warn!(error = %err, "failed to terminate host");
                }
                Err(RunnerError::Timeout {
                    what: format!("job {}", item.id()),
                    after: policy.budget(),
                })
            }
        }
    }

    /// Run the materialization tool when the target is not available locally.
    async fn materialize_target(&mut self, request: &BootRequest) -> Result<()> {
        let target_is_local = self.drop_zone.fs().exists(Path::new(&request.target));

        let Some(section) = &self.materialize else {
            if !target_is_local {
                warn!(target = %request.target, "target not found locally; launching host anyway");
            }
            return Ok(());
        };

        if target_is_local {
            debug!(target = %request.target, "target already local; skipping materialization");
            return Ok(());
        }

        let spec = ProcessSpec::render(section, &request.vars());
        info!(program = %spec.program, args = ?spec.args, "materializing target");

        let mut process = self.launcher.launch(&spec)?;
        let exit = wait_with_deadline(
            process.as_mut(),
            self.settings.materialize_timeout,
            "materialization",
        )
        .await?;

        if !exit.success() {
            return Err(RunnerError::Materialize(format!(
                "'{}' exited with {:?}",
                spec.program, exit.code
            )));
        }

        info!(target = %request.target, "target materialized");
        Ok(())
    }

    /// Give the host `shutdown_grace` to exit by itself, then kill it.
    async fn close_host(&self, host: &mut dyn ManagedProcess) {
        match host.try_wait() {
            Ok(Some(exit)) => {
                info!(exit_code = ?exit.code, "host already exited");
                return;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to check host status"),
        }

        let grace = self.settings.shutdown_grace;
        match tokio::time::timeout(grace, host.wait()).await {
            Ok(Ok(exit)) => info!(exit_code = ?exit.code, "host exited"),
            Ok(Err(err)) => warn!(error = %err, "failed waiting for host"),
            Err(_elapsed) => {
                info!(?grace, "host still running after grace period; terminating");
                if let Err(err) = host.kill().await {
                    warn!(error = %err, "failed to terminate host");
                }
            }
        }
    }
}
