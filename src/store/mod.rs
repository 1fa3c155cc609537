// src/store/mod.rs

//! The drop zone: a directory of job descriptors shared by the orchestrator
//! (writer) and the dispatcher (deleter).
//!
//! - [`item`] holds the [`QueueItem`] data model and its TOML encoding.
//! - [`drop_zone`] holds the [`DropZone`] repository: publish, scan and
//!   delete-as-completion.

pub mod drop_zone;
pub mod item;

pub use drop_zone::{is_descriptor_path, DropZone};
pub use item::{QueueItem, ITEM_EXTENSION};
