// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from `RemoteRunner.toml`.
///
/// ```toml
/// [drop_zone]
/// path = "/var/spool/remote-runner"
///
/// [boot]
/// poll_interval = "5s"
/// max_polls = 100
/// materialize_timeout = "60s"
/// shutdown_grace = "10s"
///
/// [host]
/// program = "remote-host"
/// args = ["{target}"]
///
/// [materialize]
/// program = "server-tool"
/// args = ["createLocal", "{source}", "-d", "{target}"]
/// ```
///
/// Every section is optional. Converted into a validated [`ConfigFile`]
/// through `TryFrom` (see `validate.rs`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub drop_zone: DropZoneSection,

    #[serde(default)]
    pub boot: BootSection,

    /// Host application launched against the target. Defaults to
    /// `remote-host {target}`.
    #[serde(default)]
    pub host: ProcessSection,

    /// Optional command that makes a remote target available locally.
    #[serde(default)]
    pub materialize: Option<ProcessSection>,
}

/// `[drop_zone]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DropZoneSection {
    /// Directory shared by the orchestrator and the host.
    #[serde(default = "default_drop_zone_path")]
    pub path: PathBuf,
}

fn default_drop_zone_path() -> PathBuf {
    std::env::temp_dir().join("remote-runner")
}

impl Default for DropZoneSection {
    fn default() -> Self {
        Self {
            path: default_drop_zone_path(),
        }
    }
}

/// `[boot]` section: orchestrator timings. Durations are strings such as
/// `"500ms"`, `"5s"`, `"2m"`.
#[derive(Debug, Clone, Deserialize)]
pub struct BootSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Maximum number of sleeps while waiting for completion.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    #[serde(default = "default_materialize_timeout")]
    pub materialize_timeout: String,

    /// How long the host may take to exit on its own after the job completed
    /// before it is killed.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_max_polls() -> u32 {
    100
}

fn default_materialize_timeout() -> String {
    "60s".to_string()
}

fn default_shutdown_grace() -> String {
    "10s".to_string()
}

impl Default for BootSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_polls: default_max_polls(),
            materialize_timeout: default_materialize_timeout(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// A program to start, with `{source}`, `{target}` and `{target_dir}`
/// placeholders allowed in `args`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessSection {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Defaults to the target's parent directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_host_program() -> String {
    "remote-host".to_string()
}

fn default_host_args() -> Vec<String> {
    vec!["{target}".to_string()]
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            program: default_host_program(),
            args: default_host_args(),
            working_dir: None,
        }
    }
}

/// Orchestrator timings after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub materialize_timeout: Duration,
    pub shutdown_grace: Duration,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub drop_zone: PathBuf,
    pub boot: BootSettings,
    pub host: ProcessSection,
    pub materialize: Option<ProcessSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        drop_zone: PathBuf,
        boot: BootSettings,
        host: ProcessSection,
        materialize: Option<ProcessSection>,
    ) -> Self {
        Self {
            drop_zone,
            boot,
            host,
            materialize,
        }
    }
}
