// src/cli.rs

//! CLI argument parsing using `clap` for the two binaries.
//!
//! `remote-boot` keeps the job itself positional
//! (`<source> <target> <module> <type> [args...]`) and leaves the arity check
//! to [`crate::boot::BootRequest::from_positional`], so a short job line is
//! reported as a usage error by the orchestrator rather than by clap.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `remote-boot`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "remote-boot",
    version,
    about = "Queue a command for a host application, launch the host and wait for completion.",
    long_about = None
)]
pub struct BootArgs {
    /// Path to the config file (TOML).
    ///
    /// Falls back to `REMOTE_RUNNER_CONFIG`, then `RemoteRunner.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REMOTE_RUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the job and print it, but don't write anything or start processes.
    #[arg(long)]
    pub dry_run: bool,

    /// `<source> <target> <module> <type> [args...]`
    #[arg(
        value_name = "JOB",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub job: Vec<String>,
}

/// Command-line arguments for `remote-host`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "remote-host",
    version,
    about = "Reference host: open a document and run queued commands against it.",
    long_about = None
)]
pub struct HostArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Keep the document open and re-run the dispatcher whenever a new job
    /// lands in the drop zone. Stops on Ctrl-C.
    #[arg(long)]
    pub watch: bool,

    /// Document to open.
    #[arg(value_name = "DOCUMENT")]
    pub document: String,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
