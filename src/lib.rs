// src/lib.rs

//! Run a named unit of work inside a host application from the outside.
//!
//! `remote-boot` writes a job descriptor into a shared drop zone, launches
//! the host against a target document and polls until the descriptor is
//! gone. Inside the host, the [`dispatch::RemoteRunnerAddin`] reacts to
//! "document opened", runs every job aimed at that document and deletes its
//! descriptor. `remote-host` is a reference host built from the same pieces.

pub mod boot;
pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod host;
pub mod logging;
pub mod store;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::boot::{BootRequest, Orchestrator, ProcessLauncher, TokioProcessLauncher};
use crate::cli::BootArgs;
use crate::config::{load_config, ConfigFile};
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `remote-boot`.
///
/// The job line is checked before the config is read, so a usage error has
/// no side effects.
pub async fn run(args: BootArgs) -> Result<()> {
    let request = BootRequest::from_positional(&args.job)?;
    let config = load_config(args.config.as_deref())?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut orchestrator = Orchestrator::new(&config, fs, TokioProcessLauncher);

    if args.dry_run {
        print_dry_run(&orchestrator, &config, &request);
        return Ok(());
    }

    let outcome = orchestrator.run(&request).await?;
    info!(
        item_id = %outcome.item_id,
        polls = outcome.polls,
        "job completed"
    );
    Ok(())
}

/// Print what a run would do without writing or launching anything.
fn print_dry_run<L: ProcessLauncher>(
    orchestrator: &Orchestrator<L>,
    config: &ConfigFile,
    request: &BootRequest,
) {
    let item = orchestrator.prepare(request);
    let host = orchestrator.host_spec(request);

    println!("remote-boot dry-run");
    println!("  drop_zone = {}", config.drop_zone.display());
    println!(
        "  poll = every {:?}, at most {} times",
        config.boot.poll_interval, config.boot.max_polls
    );
    println!();
    println!("job {}:", item.id());
    println!("  descriptor: {}", item.item_path().display());
    println!("  target: {}", item.target_resource());
    println!("  module: {}", item.module_path());
    println!("  type: {}", item.type_name());
    if !item.args().is_empty() {
        println!("  args: {:?}", item.args());
    }
    if let Some(materialize) = &config.materialize {
        println!(
            "  materialize (if target missing): {} {:?}",
            materialize.program, materialize.args
        );
    }
    println!("  host: {} {:?}", host.program, host.args);

    debug!("dry-run complete (nothing written, nothing launched)");
}
