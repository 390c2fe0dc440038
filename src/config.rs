//! Supervisor configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{GdbError, Result};

fn default_debugger() -> String {
    "gdb".into()
}

fn default_debugger_args() -> Vec<String> {
    vec!["--interpreter=mi".into(), "-n".into(), "-q".into()]
}

fn default_reply_timeout_ms() -> u64 {
    3000
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

fn default_startup_max_lines() -> u32 {
    5
}

/// Supervisor configuration, usually parsed from `gdbctl.toml`.
///
/// Every field has a default, so an empty document yields the same values as
/// [`SupervisorConfig::default`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorConfig {
    /// Debugger binary, resolved through `PATH` when not absolute.
    #[serde(default = "default_debugger")]
    pub debugger: String,
    /// Arguments placed before the target program path.
    #[serde(default = "default_debugger_args")]
    pub debugger_args: Vec<String>,
    /// Readiness bound for every reply line, in milliseconds.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Bound for each termination stage, in milliseconds.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Lines read during the startup handshake before giving up.
    #[serde(default = "default_startup_max_lines")]
    pub startup_max_lines: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            debugger: default_debugger(),
            debugger_args: default_debugger_args(),
            reply_timeout_ms: default_reply_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            startup_max_lines: default_startup_max_lines(),
        }
    }
}

impl SupervisorConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `GdbError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| GdbError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `GdbError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Readiness bound applied to each reply line.
    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Bound applied to each termination stage.
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.debugger.trim().is_empty() {
            return Err(GdbError::Config("debugger must not be empty".into()));
        }

        if self.reply_timeout_ms == 0 {
            return Err(GdbError::Config(
                "reply_timeout_ms must be greater than zero".into(),
            ));
        }

        if self.stop_timeout_ms == 0 {
            return Err(GdbError::Config(
                "stop_timeout_ms must be greater than zero".into(),
            ));
        }

        if self.startup_max_lines == 0 {
            return Err(GdbError::Config(
                "startup_max_lines must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
