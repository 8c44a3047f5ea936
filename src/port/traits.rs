//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets the session driver run against real hardware or
//! a `MockSerialPort`; `PortConnector` is the seam where the channel is opened.

use super::error::PortError;
use std::time::Duration;

/// Parameters used when a channel is first opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Read/write timeout in effect right after opening.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Reads block for at most the configured timeout and then fail with an error
/// for which [`PortError::is_timeout`] is true.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Change the line speed of an already open port.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError>;

    /// Clear both input and output buffers.
    ///
    /// This discards any unread data in the receive buffer and any unsent
    /// data in the transmit buffer.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    /// Write the whole buffer, retrying short writes.
    fn write_all_bytes(&mut self, mut data: &[u8]) -> Result<(), PortError> {
        while !data.is_empty() {
            let n = self.write_bytes(data)?;
            if n == 0 {
                return Err(PortError::Io(std::io::Error::from(
                    std::io::ErrorKind::WriteZero,
                )));
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// Opens channels for the session driver.
#[cfg_attr(test, mockall::automock)]
pub trait PortConnector {
    /// Open the channel at `address`.
    fn connect(
        &self,
        address: &str,
        config: PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}
