// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{BootSettings, ConfigFile, ProcessSection, RawConfigFile};
use crate::errors::{Result, RunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let boot = validate_boot(&raw)?;
        validate_process("host", &raw.host)?;
        if let Some(materialize) = &raw.materialize {
            validate_process("materialize", materialize)?;
        }
        if raw.drop_zone.path.as_os_str().is_empty() {
            return Err(RunnerError::ConfigError(
                "[drop_zone].path must not be empty".to_string(),
            ));
        }
        Ok(ConfigFile::new_unchecked(
            raw.drop_zone.path,
            boot,
            raw.host,
            raw.materialize,
        ))
    }
}

fn validate_boot(cfg: &RawConfigFile) -> Result<BootSettings> {
    let field = |name: &str, value: &str| {
        parse_duration(value)
            .map_err(|e| RunnerError::ConfigError(format!("[boot].{name}: {e}")))
    };

    let poll_interval = field("poll_interval", &cfg.boot.poll_interval)?;
    if poll_interval.is_zero() {
        return Err(RunnerError::ConfigError(
            "[boot].poll_interval must be greater than zero".to_string(),
        ));
    }

    if cfg.boot.max_polls == 0 {
        return Err(RunnerError::ConfigError(
            "[boot].max_polls must be >= 1 (got 0)".to_string(),
        ));
    }

    if poll_interval.checked_mul(cfg.boot.max_polls).is_none() {
        return Err(RunnerError::ConfigError(format!(
            "[boot].poll_interval x max_polls overflows ({poll_interval:?} x {})",
            cfg.boot.max_polls
        )));
    }

    Ok(BootSettings {
        poll_interval,
        max_polls: cfg.boot.max_polls,
        materialize_timeout: field("materialize_timeout", &cfg.boot.materialize_timeout)?,
        shutdown_grace: field("shutdown_grace", &cfg.boot.shutdown_grace)?,
    })
}

fn validate_process(section: &str, process: &ProcessSection) -> Result<()> {
    if process.program.trim().is_empty() {
        return Err(RunnerError::ConfigError(format!(
            "[{section}].program must not be empty"
        )));
    }
    Ok(())
}

/// Parse durations like `"250ms"`, `"5s"`, `"2m"`, `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    let seconds = |scale: u64| {
        value
            .checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => seconds(60),
        "h" => seconds(60 * 60),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}
