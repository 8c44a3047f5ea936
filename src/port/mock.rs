//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` plays the device side of a session without hardware:
//! bytes can be queued for reading right away, armed to appear once the host
//! clears its buffers, or sent in reply to a specific write.

use super::error::PortError;
use super::traits::{PortConfiguration, PortConnector, SerialPortAdapter};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes returned by read operations.
    read_queue: VecDeque<u8>,
    /// Bytes that become readable on the next `clear_buffers`.
    after_clear: Vec<u8>,
    /// Replies keyed by the exact bytes the host writes, with their delay.
    replies: VecDeque<(Vec<u8>, Vec<u8>, Duration)>,
    /// Replies written by the host but not yet readable.
    in_flight: VecDeque<(Instant, Vec<u8>)>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// One-shot error for the next read.
    fail_next_read: Option<std::io::ErrorKind>,
    timeout: Duration,
    /// Every read timeout set, in order.
    timeout_log: Vec<Duration>,
    baud_rate: u32,
    clear_count: usize,
}

impl MockPortState {
    /// Move in-flight replies whose delay has passed into the read queue.
    fn deliver_due(&mut self) {
        let now = Instant::now();
        while self.in_flight.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, reply)) = self.in_flight.pop_front() {
                self.read_queue.extend(reply);
            }
        }
    }
}

/// Mock serial port implementation for testing.
///
/// An empty read blocks for the configured timeout and then fails with
/// `io::ErrorKind::TimedOut`, the same way `serialport` does.
///
/// # Example
/// ```
/// use unit_runner::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.reply_to(b"unit_tests\r", b"Status: Passed\r\n>: ");
///
/// port.write_bytes(b"unit_tests\r").unwrap();
///
/// let mut buffer = [0u8; 64];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Status: Passed\r\n>: ");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockPortState> {
        // A panic in another test thread must not hide this port's state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state().read_queue.extend(data);
    }

    /// Make `data` readable once the host clears the buffers.
    ///
    /// Models a device that prints its prompt after the host connects.
    pub fn enqueue_after_clear(&mut self, data: &[u8]) {
        self.state().after_clear.extend_from_slice(data);
    }

    /// Queue `reply` to be readable after the host writes exactly `trigger`.
    pub fn reply_to(&mut self, trigger: &[u8], reply: &[u8]) {
        self.reply_to_after(trigger, Duration::ZERO, reply);
    }

    /// Like [`reply_to`](Self::reply_to), but the reply only becomes readable
    /// `delay` after the write.
    pub fn reply_to_after(&mut self, trigger: &[u8], delay: Duration, reply: &[u8]) {
        self.state()
            .replies
            .push_back((trigger.to_vec(), reply.to_vec(), delay));
    }

    /// Fail the next read with an I/O error of the given kind.
    pub fn fail_next_read(&mut self, kind: std::io::ErrorKind) {
        self.state().fail_next_read = Some(kind);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state().write_log.clone()
    }

    /// How many times the buffers were cleared.
    pub fn clear_count(&self) -> usize {
        self.state().clear_count
    }

    /// The most recently configured read timeout.
    pub fn current_timeout(&self) -> Duration {
        self.state().timeout
    }

    /// Every read timeout configured so far, oldest first.
    pub fn timeout_history(&self) -> Vec<Duration> {
        self.state().timeout_log.clone()
    }

    /// The most recently configured baud rate (0 if never set).
    pub fn baud_rate(&self) -> u32 {
        self.state().baud_rate
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state().read_queue.len()
    }

    /// True once every other handle to this port has been dropped.
    pub fn is_released(&self) -> bool {
        Arc::strong_count(&self.state) == 1
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state();
        state.write_log.push(data.to_vec());

        let matches_front = state
            .replies
            .front()
            .is_some_and(|(trigger, _, _)| trigger.as_slice() == data);
        if matches_front {
            if let Some((_, reply, delay)) = state.replies.pop_front() {
                state.in_flight.push_back((Instant::now() + delay, reply));
                state.deliver_due();
            }
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state();

        if let Some(kind) = state.fail_next_read.take() {
            return Err(PortError::Io(std::io::Error::from(kind)));
        }

        state.deliver_due();
        if state.read_queue.is_empty() {
            // Block like a real port: until the timeout, or until an
            // in-flight reply lands, whichever comes first.
            let wait = match state.in_flight.front() {
                Some((due, _)) => state
                    .timeout
                    .min(due.saturating_duration_since(Instant::now())),
                None => state.timeout,
            };
            drop(state);
            std::thread::sleep(wait);
            state = self.state();
            state.deliver_due();
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Operation timed out",
            )));
        }
        Ok(bytes_read)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        let mut state = self.state();
        state.timeout = timeout;
        state.timeout_log.push(timeout);
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        self.state().baud_rate = baud_rate;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state();
        state.read_queue.clear();
        let armed = std::mem::take(&mut state.after_clear);
        state.read_queue.extend(armed);
        state.clear_count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Connector that hands out clones of one mock port.
///
/// Keep a clone yourself to inspect the port after the session has run.
#[derive(Debug, Clone)]
pub struct MockConnector {
    port: MockSerialPort,
}

impl MockConnector {
    pub fn new(port: MockSerialPort) -> Self {
        Self { port }
    }
}

impl PortConnector for MockConnector {
    fn connect(
        &self,
        _address: &str,
        config: PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut port = self.port.clone();
        port.set_baud_rate(config.baud_rate)?;
        port.set_timeout(config.timeout)?;
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_partial_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(port.available_bytes(), 8);
    }

    #[test]
    fn test_empty_read_times_out() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_timeout(Duration::from_millis(5)).unwrap();

        let mut buffer = [0u8; 10];
        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_clear_discards_stale_and_releases_armed_bytes() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"stale output");
        port.enqueue_after_clear(b">: ");

        port.clear_buffers().unwrap();
        assert_eq!(port.clear_count(), 1);

        let mut buffer = [0u8; 32];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b">: ");
    }

    #[test]
    fn test_reply_only_on_matching_write() {
        let mut port = MockSerialPort::new("MOCK0");
        port.reply_to(b"unit_tests\r", b"done");

        port.write_bytes(b"help\r").unwrap();
        assert_eq!(port.available_bytes(), 0);

        port.write_bytes(b"unit_tests\r").unwrap();
        assert_eq!(port.available_bytes(), 4);
        assert_eq!(port.get_write_log().len(), 2);
    }

    #[test]
    fn test_delayed_reply_arrives_after_delay() {
        let mut port = MockSerialPort::new("MOCK0");
        port.reply_to_after(b"unit_tests\r", Duration::from_millis(30), b"done");
        port.set_timeout(Duration::from_millis(5)).unwrap();

        port.write_bytes(b"unit_tests\r").unwrap();
        let mut buffer = [0u8; 8];
        assert!(port.read_bytes(&mut buffer).unwrap_err().is_timeout());

        port.set_timeout(Duration::from_millis(200)).unwrap();
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"done");
        assert_eq!(
            port.timeout_history(),
            vec![Duration::from_millis(5), Duration::from_millis(200)]
        );
    }

    #[test]
    fn test_fail_next_read_is_one_shot() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"x");
        port.fail_next_read(std::io::ErrorKind::BrokenPipe);

        let mut buffer = [0u8; 4];
        assert!(port.read_bytes(&mut buffer).is_err());
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 1);
    }

    #[test]
    fn test_release_tracking() {
        let port = MockSerialPort::new("MOCK0");
        let handle = port.clone();
        assert!(!port.is_released());
        drop(handle);
        assert!(port.is_released());
    }

    #[test]
    fn test_connector_applies_configuration() {
        let port = MockSerialPort::new("MOCK0");
        let connector = MockConnector::new(port.clone());
        let config = PortConfiguration {
            baud_rate: 230_400,
            timeout: Duration::from_millis(250),
        };

        let opened = connector.connect("MOCK0", config).unwrap();
        assert_eq!(opened.name(), "MOCK0");
        assert_eq!(port.baud_rate(), 230_400);
        assert_eq!(port.current_timeout(), Duration::from_millis(250));
    }
}
