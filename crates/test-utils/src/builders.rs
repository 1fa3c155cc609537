#![allow(dead_code)]

use std::path::Path;

use remote_runner::boot::BootRequest;
use remote_runner::config::{ConfigFile, ProcessSection, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(drop_zone: impl AsRef<Path>) -> Self {
        let mut config = RawConfigFile::default();
        config.drop_zone.path = drop_zone.as_ref().to_path_buf();
        Self { config }
    }

    pub fn poll_interval(mut self, value: &str) -> Self {
        self.config.boot.poll_interval = value.to_string();
        self
    }

    pub fn max_polls(mut self, value: u32) -> Self {
        self.config.boot.max_polls = value;
        self
    }

    pub fn materialize_timeout(mut self, value: &str) -> Self {
        self.config.boot.materialize_timeout = value.to_string();
        self
    }

    pub fn shutdown_grace(mut self, value: &str) -> Self {
        self.config.boot.shutdown_grace = value.to_string();
        self
    }

    pub fn host(mut self, program: &str, args: &[&str]) -> Self {
        self.config.host = process(program, args);
        self
    }

    pub fn materialize(mut self, program: &str, args: &[&str]) -> Self {
        self.config.materialize = Some(process(program, args));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

fn process(program: &str, args: &[&str]) -> ProcessSection {
    ProcessSection {
        program: program.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        working_dir: None,
    }
}

/// Builder for a `BootRequest`, as if parsed from the command line.
pub struct BootRequestBuilder {
    args: Vec<String>,
}

impl BootRequestBuilder {
    pub fn new(target: &str, module_path: &str, type_name: &str) -> Self {
        Self {
            args: vec![
                format!("server://{target}"),
                target.to_string(),
                module_path.to_string(),
                type_name.to_string(),
            ],
        }
    }

    pub fn source(mut self, source: &str) -> Self {
        self.args[0] = source.to_string();
        self
    }

    pub fn arg(mut self, value: &str) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn positional(&self) -> Vec<String> {
        self.args.clone()
    }

    pub fn build(self) -> BootRequest {
        BootRequest::from_positional(&self.args).expect("builder always yields four positionals")
    }
}
