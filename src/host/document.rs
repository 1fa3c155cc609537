// src/host/document.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use crate::command::Document;
use crate::fs::FileSystem;

/// A plain file opened as a document.
///
/// A unit of work snapshots the file's bytes when it begins. Rollback puts
/// the snapshot back (or removes the file if it did not exist); commit
/// discards it. One unit of work may be open at a time.
#[derive(Debug)]
pub struct FileDocument {
    path: PathBuf,
    path_name: String,
    fs: Arc<dyn FileSystem>,
    open: Option<OpenTransaction>,
}

#[derive(Debug)]
struct OpenTransaction {
    name: String,
    snapshot: Option<Vec<u8>>,
}

impl FileDocument {
    pub fn open(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        let path = path.into();
        let path_name = path.display().to_string();
        Self {
            path,
            path_name,
            fs,
            open: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn in_transaction(&self) -> bool {
        self.open.is_some()
    }
}

impl Document for FileDocument {
    fn path_name(&self) -> &str {
        &self.path_name
    }

    fn begin_transaction(&mut self, name: &str) -> Result<()> {
        if let Some(open) = &self.open {
            bail!(
                "transaction '{}' already open on {}",
                open.name,
                self.path_name
            );
        }

        let snapshot = if self.fs.is_file(&self.path) {
            Some(self.fs.read(&self.path)?)
        } else {
            None
        };
        debug!(document = %self.path_name, transaction = name, "transaction started");
        self.open = Some(OpenTransaction {
            name: name.to_string(),
            snapshot,
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            bail!("no transaction open on {}", self.path_name);
        };
        debug!(document = %self.path_name, transaction = %open.name, "transaction committed");
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            bail!("no transaction open on {}", self.path_name);
        };
        match open.snapshot {
            Some(bytes) => self.fs.write(&self.path, &bytes)?,
            None => {
                self.fs.remove_file(&self.path)?;
            }
        }
        debug!(document = %self.path_name, transaction = %open.name, "transaction rolled back");
        Ok(())
    }
}
