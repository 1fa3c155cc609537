// src/config/mod.rs

//! `RemoteRunner.toml` loading and validation, shared by `remote-boot` and
//! `remote-host`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_config, load_from_path};
pub use model::{BootSettings, ConfigFile, ProcessSection, RawConfigFile};
pub use validate::parse_duration;
