//! Configuration schema definitions.
//!
//! Every section uses `#[serde(default)]`, so a file only needs the keys it
//! changes.

use super::error::{ConfigError, ConfigResult};
use crate::report::DEFAULT_LEAK_THRESHOLD;
use crate::session::{
    SessionConfig, DEFAULT_BAUD_RATE, DEFAULT_COMMAND, DEFAULT_LINE_TERMINATOR, DEFAULT_PROMPT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial protocol settings
    pub device: DeviceConfig,
    /// Pass/fail policy
    pub policy: PolicyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the session driver cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let d = &self.device;
        if d.baud_rate == 0 {
            return Err(ConfigError::invalid("device.baud_rate", "must be non-zero"));
        }
        for (key, ms) in [
            ("device.connect_timeout_ms", d.connect_timeout_ms),
            ("device.handshake_timeout_ms", d.handshake_timeout_ms),
            ("device.report_timeout_ms", d.report_timeout_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::invalid(key, "must be non-zero"));
            }
        }
        for (key, value) in [
            ("device.prompt", &d.prompt),
            ("device.command", &d.command),
            ("device.line_terminator", &d.line_terminator),
        ] {
            if value.is_empty() {
                return Err(ConfigError::invalid(key, "must not be empty"));
            }
        }
        Ok(())
    }
}

/// Device protocol section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Operating baud rate
    pub baud_rate: u32,
    /// Read timeout while opening the port
    pub connect_timeout_ms: u64,
    /// How long to wait for the prompt before sending the command
    pub handshake_timeout_ms: u64,
    /// How long the whole test run may take
    pub report_timeout_ms: u64,
    /// Prompt marker, e.g. ">: "
    pub prompt: String,
    /// Command that starts the tests, terminator included
    pub command: String,
    /// Line terminator used to split the report
    pub line_terminator: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            connect_timeout_ms: 1000,
            handshake_timeout_ms: 1000,
            report_timeout_ms: 300_000,
            prompt: text(DEFAULT_PROMPT),
            command: text(DEFAULT_COMMAND),
            line_terminator: text(DEFAULT_LINE_TERMINATOR),
        }
    }
}

impl DeviceConfig {
    /// Protocol parameters for the session driver.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            baud_rate: self.baud_rate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.handshake_timeout_ms),
            total_timeout: Duration::from_millis(self.report_timeout_ms),
            command: self.command.as_bytes().to_vec(),
            sentinel: self.prompt.as_bytes().to_vec(),
            line_terminator: self.line_terminator.as_bytes().to_vec(),
        }
    }
}

/// Pass/fail policy section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Leaked bytes tolerated before the run fails
    pub leak_threshold: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            leak_threshold: DEFAULT_LEAK_THRESHOLD,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
