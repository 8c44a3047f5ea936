//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "UNIT_RUNNER";

/// Config file name inside the user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "unit_runner.toml";

/// Application directory under the user config directory
const APP_DIR: &str = "unit_runner";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "UNIT_RUNNER_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `UNIT_RUNNER_CONFIG` environment variable (explicit path)
    /// 2. `./unit_runner.toml` (current directory)
    /// 3. `~/.config/unit_runner/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\unit_runner\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file, no env).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Per-user config directory: `%APPDATA%` on Windows, XDG elsewhere.
fn get_config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return std::env::var_os("APPDATA").map(PathBuf::from);
    }
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var(section: &str, key: &str) -> (String, Option<String>) {
    let name = format!("{ENV_PREFIX}_{section}_{key}");
    let value = std::env::var(&name).ok();
    (name, value)
}

fn parse_env<T: FromStr>(name: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env(name, format!("Invalid {what}")))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `UNIT_RUNNER_<SECTION>_<KEY>`
/// For example:
/// - `UNIT_RUNNER_DEVICE_BAUD_RATE=115200`
/// - `UNIT_RUNNER_DEVICE_REPORT_TIMEOUT_MS=600000`
/// - `UNIT_RUNNER_POLICY_LEAK_THRESHOLD=0`
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let device = &mut config.device;

    if let (name, Some(val)) = env_var("DEVICE", "BAUD_RATE") {
        device.baud_rate = parse_env(&name, &val, "baud rate")?;
    }
    if let (name, Some(val)) = env_var("DEVICE", "CONNECT_TIMEOUT_MS") {
        device.connect_timeout_ms = parse_env(&name, &val, "timeout")?;
    }
    if let (name, Some(val)) = env_var("DEVICE", "HANDSHAKE_TIMEOUT_MS") {
        device.handshake_timeout_ms = parse_env(&name, &val, "timeout")?;
    }
    if let (name, Some(val)) = env_var("DEVICE", "REPORT_TIMEOUT_MS") {
        device.report_timeout_ms = parse_env(&name, &val, "timeout")?;
    }
    if let (_, Some(val)) = env_var("DEVICE", "COMMAND") {
        device.command = val;
    }

    if let (name, Some(val)) = env_var("POLICY", "LEAK_THRESHOLD") {
        config.policy.leak_threshold = parse_env(&name, &val, "leak threshold")?;
    }

    if let (_, Some(val)) = env_var("LOGGING", "LEVEL") {
        config.logging.level = val;
    }
    if let (name, Some(val)) = env_var("LOGGING", "FORMAT") {
        config.logging.format = match val.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => return Err(ConfigError::env(name, "Expected json, pretty or compact")),
        };
    }

    Ok(())
}
