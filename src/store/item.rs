// src/store/item.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;

/// File extension of a published job descriptor.
pub const ITEM_EXTENSION: &str = "job";

/// Extension used while a descriptor is being written. Scanners never match it.
pub const TEMP_EXTENSION: &str = "tmp";

/// A job descriptor: which document to open, which work unit to run against
/// it and with which arguments.
///
/// The on-disk location is derived from `store_root` and `id`
/// (see [`QueueItem::item_path`]) and is never stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    target_resource: String,
    module_path: String,
    type_name: String,
    #[serde(default)]
    args: Vec<String>,
    store_root: PathBuf,
    id: Uuid,
}

impl QueueItem {
    /// Build a new item with a fresh id and no arguments.
    ///
    /// Ids are UUIDv7, so sorting descriptors by file name yields creation order.
    pub fn create(
        target_resource: impl Into<String>,
        module_path: impl Into<String>,
        type_name: impl Into<String>,
        store_root: impl Into<PathBuf>,
    ) -> Self {
        Self::with_id(
            target_resource,
            module_path,
            type_name,
            store_root,
            Uuid::now_v7(),
        )
    }

    /// Build an item with a caller-chosen id. Two items with the same id in
    /// the same store share a path.
    pub fn with_id(
        target_resource: impl Into<String>,
        module_path: impl Into<String>,
        type_name: impl Into<String>,
        store_root: impl Into<PathBuf>,
        id: Uuid,
    ) -> Self {
        Self {
            target_resource: target_resource.into(),
            module_path: module_path.into(),
            type_name: type_name.into(),
            args: Vec::new(),
            store_root: store_root.into(),
            id,
        }
    }

    pub fn add_argument(&mut self, value: impl Into<String>) {
        self.args.push(value.into());
    }

    pub fn target_resource(&self) -> &str {
        &self.target_resource
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `<store_root>/<id>.job`
    pub fn item_path(&self) -> PathBuf {
        self.store_root.join(Self::file_name_for(self.id))
    }

    pub(crate) fn temp_path(&self) -> PathBuf {
        self.store_root
            .join(format!(".{}.{}.{}", self.id, ITEM_EXTENSION, TEMP_EXTENSION))
    }

    pub(crate) fn file_name_for(id: Uuid) -> String {
        format!("{id}.{ITEM_EXTENSION}")
    }

    /// Whether this job targets `resource_path`.
    ///
    /// Case-insensitive exact comparison; no other path normalization.
    pub fn is_applicable_to(&self, resource_path: &str) -> bool {
        resource_path.to_lowercase() == self.target_resource.to_lowercase()
    }

    pub(crate) fn rebind_store_root(&mut self, root: &Path) {
        self.store_root = root.to_path_buf();
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
