//! Port abstraction layer for serial communication.
//!
//! Provides the `SerialPortAdapter` trait, the real `serialport`-backed
//! implementation and a scriptable mock for tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockConnector, MockSerialPort};
pub use sync_port::*;
pub use traits::*;
