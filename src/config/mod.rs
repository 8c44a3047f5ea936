//! Configuration module.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `--config <path>` on the command line
//! 2. `UNIT_RUNNER_CONFIG` environment variable (explicit path)
//! 3. `./unit_runner.toml` (current directory)
//! 4. `~/.config/unit_runner/config.toml` (XDG on Linux/macOS)
//! 5. `%APPDATA%\unit_runner\config.toml` (Windows)
//! 6. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `UNIT_RUNNER_<SECTION>_<KEY>`, e.g.
//! `UNIT_RUNNER_POLICY_LEAK_THRESHOLD=0`.
//!
//! # Example
//!
//! ```toml
//! [device]
//! baud_rate = 230400
//! handshake_timeout_ms = 1000
//! report_timeout_ms = 300000
//! prompt = ">: "
//! command = "unit_tests\r"
//!
//! [policy]
//! leak_threshold = 3000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, resolve_config_path, ConfigLoader};
pub use schema::{Config, DeviceConfig, LogFormat, LoggingConfig, PolicyConfig};
