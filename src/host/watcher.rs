// src/host/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::store::is_descriptor_path;

/// Keeps the drop-zone watcher alive. Dropping it stops watching.
pub struct DropZoneWatcher {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for DropZoneWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropZoneWatcher").finish()
    }
}

/// Descriptor paths that `event` brings into the drop zone.
///
/// Publishing renames a hidden temp file into place, so both creations and
/// rename targets count.
pub fn new_descriptors(event: &Event) -> Vec<PathBuf> {
    let arrives = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    if !arrives {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| is_descriptor_path(p))
        .cloned()
        .collect()
}

/// Watch `root` (non-recursively) and send every newly published descriptor
/// path on the returned channel.
pub fn watch_drop_zone(
    root: &Path,
) -> Result<(DropZoneWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("creating drop zone {}", root.display()))?;

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in new_descriptors(&event) {
                    if tx.send(path).is_err() {
                        // Receiver gone: the host is shutting down.
                        return;
                    }
                }
            }
            Err(err) => eprintln!("remote-host: drop zone watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher
        .watch(root, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching drop zone {}", root.display()))?;

    info!(root = ?root, "watching drop zone for new jobs");
    Ok((DropZoneWatcher { _inner: watcher }, rx))
}

/// Collapse a burst of arrivals into one wake-up.
pub fn drain_pending(rx: &mut mpsc::UnboundedReceiver<PathBuf>) -> usize {
    let mut drained = 0;
    while let Ok(path) = rx.try_recv() {
        debug!(path = ?path, "coalescing drop zone event");
        drained += 1;
    }
    drained
}
