// src/store/drop_zone.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{Result, RunnerError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::item::{QueueItem, ITEM_EXTENSION, TEMP_EXTENSION};

/// Temp files older than this are leftovers of a publish that never finished.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// The shared directory acting as the job queue.
///
/// Ownership is split between the two processes: the orchestrator is the
/// only writer ([`DropZone::persist`]) and the dispatcher the only deleter
/// ([`DropZone::mark_complete`]). A file at an item's path means the job is
/// pending or running; its absence means the job is done.
#[derive(Debug, Clone)]
pub struct DropZone {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl DropZone {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Drop zone backed by the real filesystem.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(RealFileSystem))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// New item belonging to this drop zone. Nothing is written yet.
    pub fn create_item(
        &self,
        target_resource: impl Into<String>,
        module_path: impl Into<String>,
        type_name: impl Into<String>,
    ) -> QueueItem {
        QueueItem::create(target_resource, module_path, type_name, self.root.clone())
    }

    /// Publish `item` at its item path.
    ///
    /// The descriptor is written to a dot-prefixed temp file next to the
    /// final path and renamed into place, so a concurrent scan sees either
    /// nothing or the complete record.
    pub fn persist(&self, item: &QueueItem) -> Result<PathBuf> {
        let final_path = item.item_path();
        let temp_path = item.temp_path();
        let text = item.to_toml()?;

        self.fs
            .write(&temp_path, text.as_bytes())
            .map_err(|e| RunnerError::store_io(&temp_path, format!("{e:#}")))?;

        if let Err(e) = self.fs.rename(&temp_path, &final_path) {
            let _ = self.fs.remove_file(&temp_path);
            return Err(RunnerError::store_io(&final_path, format!("{e:#}")));
        }

        info!(
            item_id = %item.id(),
            target = %item.target_resource(),
            path = ?final_path,
            "queue item published"
        );
        Ok(final_path)
    }

    /// Delete the descriptor. Deleting an already-deleted item is not an error.
    pub fn mark_complete(&self, item: &QueueItem) -> Result<()> {
        let path = item.item_path();
        let removed = self
            .fs
            .remove_file(&path)
            .map_err(|e| RunnerError::store_io(&path, format!("{e:#}")))?;

        if removed {
            info!(item_id = %item.id(), "queue item marked complete");
        } else {
            debug!(item_id = %item.id(), "queue item already complete");
        }
        Ok(())
    }

    /// True iff no descriptor exists at the item's path.
    pub fn is_complete(&self, item: &QueueItem) -> bool {
        !self.fs.exists(&item.item_path())
    }

    /// Read every well-formed descriptor currently in the drop zone.
    ///
    /// Malformed descriptors are logged and skipped. Items come back sorted
    /// by file name (creation order for UUIDv7 ids). Each call re-reads the
    /// directory.
    pub fn scan_all(&self) -> Result<Vec<QueueItem>> {
        if !self.fs.exists(&self.root) {
            debug!(root = ?self.root, "drop zone does not exist; nothing queued");
            return Ok(Vec::new());
        }

        let entries = self
            .fs
            .read_dir(&self.root)
            .map_err(|e| RunnerError::store_io(&self.root, format!("{e:#}")))?;
        self.prune_stale_temps(&entries);

        let mut paths: Vec<PathBuf> = entries
            .into_iter()
            .filter(|p| is_descriptor_path(p))
            .collect();
        paths.sort();

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            match self.read_descriptor(&path) {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(path = ?path, error = %err, "skipping malformed queue item");
                }
            }
        }

        debug!(root = ?self.root, count = items.len(), "drop zone scanned");
        Ok(items)
    }

    fn read_descriptor(&self, path: &Path) -> Result<QueueItem> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| RunnerError::store_io(path, format!("{e:#}")))?;
        let mut item =
            QueueItem::from_toml(&text).map_err(|e| RunnerError::store_io(path, e))?;

        // Only the canonical name is accepted, so the path mark_complete
        // deletes is always the one that was read.
        let file_name = path.file_name().and_then(|n| n.to_str());
        if file_name != Some(QueueItem::file_name_for(item.id()).as_str()) {
            return Err(RunnerError::store_io(
                path,
                format!("descriptor id {} does not match its file name", item.id()),
            ));
        }

        if item.store_root() != self.root.as_path() {
            debug!(
                item_id = %item.id(),
                recorded = ?item.store_root(),
                scanned = ?self.root,
                "rebinding queue item to the scanned drop zone"
            );
            item.rebind_store_root(&self.root);
        }

        Ok(item)
    }

    /// Remove hidden temp files whose id was minted more than
    /// [`STALE_TEMP_AGE`] ago. Younger ones may belong to a publish in flight.
    fn prune_stale_temps(&self, entries: &[PathBuf]) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        for path in entries {
            let Some(id) = temp_file_id(path) else {
                continue;
            };
            let Some(minted) = id.get_timestamp().map(|ts| {
                let (secs, nanos) = ts.to_unix();
                Duration::new(secs, nanos)
            }) else {
                continue;
            };
            if now.saturating_sub(minted) < STALE_TEMP_AGE {
                continue;
            }

            match self.fs.remove_file(path) {
                Ok(_) => debug!(path = ?path, "removed stale temp descriptor"),
                Err(e) => debug!(path = ?path, error = %e, "could not remove stale temp descriptor"),
            }
        }
    }
}

/// Id of a `.<id>.job.tmp` file left by [`DropZone::persist`].
fn temp_file_id(path: &Path) -> Option<Uuid> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_prefix('.')?
        .strip_suffix(TEMP_EXTENSION)?
        .strip_suffix('.')?
        .strip_suffix(ITEM_EXTENSION)?
        .strip_suffix('.')?;
    Uuid::parse_str(stem).ok()
}

/// Visible `*.job` file (exact, lowercase extension). Temp files written
/// during publish are hidden.
pub fn is_descriptor_path(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == ITEM_EXTENSION)
}
