// src/host/mod.rs

//! `remote-host`: a small reference host application.
//!
//! It opens one file as a document, loads the [`RemoteRunnerAddin`] and
//! raises "document opened" once. With `--watch` it keeps the document open
//! and raises the event again whenever a new descriptor lands in the drop
//! zone, until Ctrl-C. Work units come from TOML manifests
//! ([`ManifestSource`]).

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::HostArgs;
use crate::command::{CommandLoader, ManifestSource};
use crate::config::{load_config, ConfigFile};
use crate::dispatch::{Dispatcher, HostAddin, Notifier, RemoteRunnerAddin};
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::DropZone;

pub mod app;
pub mod document;
pub mod watcher;

pub use app::{ConsoleNotifier, HostApplication};
pub use document::FileDocument;
pub use watcher::{drain_pending, new_descriptors, watch_drop_zone, DropZoneWatcher};

/// Build the add-in the way `remote-host` does.
pub fn build_addin(
    config: &ConfigFile,
    fs: Arc<dyn FileSystem>,
    loader: CommandLoader,
    notifier: Arc<dyn Notifier>,
) -> RemoteRunnerAddin {
    let drop_zone = DropZone::new(config.drop_zone.clone(), fs);
    let dispatcher = Arc::new(Dispatcher::new(drop_zone, loader, Arc::clone(&notifier)));
    RemoteRunnerAddin::new(dispatcher, notifier)
}

/// Entry point of the `remote-host` binary.
pub async fn run_host(args: HostArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let loader = CommandLoader::new().with_source(ManifestSource::new(Arc::clone(&fs)));
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    let mut app = HostApplication::new();
    let mut addin = build_addin(&config, Arc::clone(&fs), loader, notifier);
    addin.on_startup(&mut app)?;

    let mut document = FileDocument::open(&args.document, fs);
    info!(document = %args.document, drop_zone = ?config.drop_zone, "host started");

    // Work units run synchronously; keep them off the async workers.
    tokio::task::block_in_place(|| app.open_document(&mut document));

    if args.watch {
        let (_watcher, mut arrivals) = watch_drop_zone(&config.drop_zone)?;
        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "failed to listen for Ctrl+C");
                    }
                    info!("shutdown requested");
                    break;
                }
                arrival = arrivals.recv() => {
                    let Some(path) = arrival else { break };
                    let coalesced = drain_pending(&mut arrivals);
                    info!(path = ?path, coalesced, "new job arrived; re-raising document-opened");
                    tokio::task::block_in_place(|| app.open_document(&mut document));
                }
            }
        }
    }

    addin.on_shutdown(&mut app)?;
    info!("host stopped");
    Ok(())
}
