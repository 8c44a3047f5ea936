//! Unit Runner Library
//!
//! Drives the on-device unit-test firmware of a serial-attached device and
//! turns its textual report into a pass/fail verdict.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `locator`: Device identifier to serial path resolution
//! - `port`: Port abstraction layer for serial communication
//! - `session`: Prompt handshake, command dispatch and report capture
//! - `transcript`: Captured device output
//! - `report`: Report parsing and the pass/fail policy
//! - `runner`: The pieces above wired into one run
//! - `error`: Top-level error and exit code

pub mod config;
pub mod error;
pub mod locator;
pub mod port;
pub mod report;
pub mod runner;
pub mod session;
pub mod transcript;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RunError, EXIT_FAILURE};
pub use locator::{DeviceAddress, DeviceLocator, LocateError, NamingTemplate};
pub use port::{
    MockConnector, MockSerialPort, PortConfiguration, PortConnector, PortError, SerialConnector,
    SerialPortAdapter, SyncSerialPort,
};
pub use report::{
    evaluate, parse, violations, ParseError, ParsedResult, PolicyViolation, ReportField, Verdict,
};
pub use runner::{RunOutcome, Runner};
pub use session::{read_until, SessionConfig, SessionDriver, SessionError, SessionState};
pub use transcript::Transcript;
