//! Session driver.
//!
//! Owns the serial channel for one run of the on-device unit tests:
//!
//! ```text
//! Opening -> Priming -> Handshake -> Dispatch -> Collecting -> (Closing)
//! ```
//!
//! The handshake waits for the device prompt under a short deadline, then the
//! trigger command is written and everything up to the next prompt is captured
//! under the long deadline. The channel is dropped on every exit path.

use crate::port::{PortConfiguration, PortConnector, PortError, SerialPortAdapter};
use crate::transcript::{Transcript, TranscriptBuilder};
use memchr::memmem;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prompt the device prints when its CLI is idle.
pub const DEFAULT_PROMPT: &[u8] = b">: ";
/// Command that starts the on-device unit tests.
pub const DEFAULT_COMMAND: &[u8] = b"unit_tests\r";
/// Line terminator used by the device CLI.
pub const DEFAULT_LINE_TERMINATOR: &[u8] = b"\r\n";
pub const DEFAULT_BAUD_RATE: u32 = 230_400;

const READ_CHUNK: usize = 1024;

/// Protocol step the driver was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Priming,
    Handshake,
    Dispatch,
    Collecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "opening",
            Self::Priming => "priming",
            Self::Handshake => "handshake",
            Self::Dispatch => "dispatch",
            Self::Collecting => "collecting",
        };
        f.write_str(name)
    }
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The device path exists but the channel could not be opened.
    #[error("Failed to open {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: PortError,
    },

    /// No prompt before the command was sent.
    #[error("Device did not show its prompt within {0:?}")]
    HandshakeTimeout(Duration),

    /// The prompt never came back after the command. Carries what arrived.
    #[error(
        "Device stopped responding: no prompt within {timeout:?} ({} lines captured)",
        .transcript.len()
    )]
    IncompleteReport {
        transcript: Transcript,
        timeout: Duration,
    },

    /// Any other channel failure.
    #[error("I/O failure during {state}: {source}")]
    Io {
        state: SessionState,
        #[source]
        source: PortError,
    },
}

impl SessionError {
    /// Partial transcript, if the session got far enough to capture one.
    pub fn partial_transcript(&self) -> Option<&Transcript> {
        match self {
            Self::IncompleteReport { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

/// Protocol parameters for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Operating line speed, set after opening.
    pub baud_rate: u32,
    /// Read timeout used while opening.
    pub connect_timeout: Duration,
    /// Deadline for the prompt to appear before dispatch.
    pub command_timeout: Duration,
    /// Deadline for the report to end with the prompt.
    pub total_timeout: Duration,
    /// Bytes written verbatim to start the tests.
    pub command: Vec<u8>,
    /// Prompt marker delimiting the report.
    pub sentinel: Vec<u8>,
    pub line_terminator: Vec<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            connect_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(300),
            command: DEFAULT_COMMAND.to_vec(),
            sentinel: DEFAULT_PROMPT.to_vec(),
            line_terminator: DEFAULT_LINE_TERMINATOR.to_vec(),
        }
    }
}

/// Outcome of [`read_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadUntil {
    /// Bytes read before the sentinel (sentinel excluded), or everything read
    /// if the deadline passed.
    pub data: Vec<u8>,
    pub found: bool,
}

/// Read from `port` until `sentinel` shows up or `deadline` passes.
///
/// Each blocking read is bounded by the time left before the deadline.
/// `on_progress` is called after every chunk with the data read so far, minus
/// any tail that could still be the start of the sentinel. Bytes after the
/// sentinel are dropped.
pub fn read_until(
    port: &mut dyn SerialPortAdapter,
    sentinel: &[u8],
    deadline: Instant,
    on_progress: &mut dyn FnMut(&[u8]),
) -> Result<ReadUntil, PortError> {
    let finder = memmem::Finder::new(sentinel);
    let overlap = sentinel.len().saturating_sub(1);
    let mut data = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            on_progress(&data);
            return Ok(ReadUntil { data, found: false });
        }
        port.set_timeout(remaining)?;

        let n = match port.read_bytes(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            continue;
        }

        let search_from = data.len().saturating_sub(overlap);
        data.extend_from_slice(&chunk[..n]);

        if let Some(pos) = finder.find(&data[search_from..]) {
            let end = search_from + pos;
            let trailing = data.len() - end - sentinel.len();
            if trailing > 0 {
                debug!(trailing, "discarding bytes after sentinel");
            }
            data.truncate(end);
            on_progress(&data);
            return Ok(ReadUntil { data, found: true });
        }

        on_progress(&data[..data.len() - pending_sentinel_len(&data, sentinel)]);
    }
}

/// Length of the longest tail of `data` that is a proper prefix of `sentinel`.
fn pending_sentinel_len(data: &[u8], sentinel: &[u8]) -> usize {
    (1..sentinel.len())
        .rev()
        .find(|&k| data.ends_with(&sentinel[..k]))
        .unwrap_or(0)
}

/// The open channel. Dropping it closes the port.
struct OpenChannel {
    port: Box<dyn SerialPortAdapter>,
}

impl Drop for OpenChannel {
    fn drop(&mut self) {
        debug!(port = self.port.name(), "closing channel");
    }
}

/// Runs the unit-test protocol over a channel opened by `C`.
#[derive(Debug, Clone)]
pub struct SessionDriver<C> {
    connector: C,
    config: SessionConfig,
}

impl<C: PortConnector> SessionDriver<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self { connector, config }
    }

    /// Run one session against `address`.
    ///
    /// `on_line` sees each report line as soon as it is complete.
    pub fn run(
        &self,
        address: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Transcript, SessionError> {
        let cfg = &self.config;

        debug!(address, "opening channel");
        let port = self
            .connector
            .connect(
                address,
                PortConfiguration {
                    baud_rate: cfg.baud_rate,
                    timeout: cfg.connect_timeout,
                },
            )
            .map_err(|source| SessionError::ConnectFailed {
                address: address.to_string(),
                source,
            })?;
        let mut channel = OpenChannel { port };
        let port = channel.port.as_mut();

        let io = |state| move |source| SessionError::Io { state, source };

        port.set_baud_rate(cfg.baud_rate).map_err(io(SessionState::Priming))?;
        port.clear_buffers().map_err(io(SessionState::Priming))?;
        port.set_timeout(cfg.command_timeout).map_err(io(SessionState::Priming))?;

        debug!("waiting for prompt");
        let handshake = read_until(
            port,
            &cfg.sentinel,
            Instant::now() + cfg.command_timeout,
            &mut |_| {},
        )
        .map_err(io(SessionState::Handshake))?;
        if !handshake.found {
            warn!(
                discarded = handshake.data.len(),
                "no prompt before handshake deadline"
            );
            return Err(SessionError::HandshakeTimeout(cfg.command_timeout));
        }
        debug!(discarded = handshake.data.len(), "prompt received");

        port.write_all_bytes(&cfg.command).map_err(io(SessionState::Dispatch))?;
        let command = String::from_utf8_lossy(&cfg.command);
        info!(command = %command.trim_end(), "unit tests started");

        port.set_timeout(cfg.total_timeout).map_err(io(SessionState::Collecting))?;
        let mut builder = TranscriptBuilder::new(&cfg.line_terminator);
        let report = read_until(
            port,
            &cfg.sentinel,
            Instant::now() + cfg.total_timeout,
            &mut |visible| builder.advance(visible, on_line),
        )
        .map_err(io(SessionState::Collecting))?;
        let transcript = builder.finish(&report.data, on_line);
        drop(channel);

        if !report.found {
            warn!(lines = transcript.len(), "report did not end with a prompt");
            return Err(SessionError::IncompleteReport {
                transcript,
                timeout: cfg.total_timeout,
            });
        }

        info!(lines = transcript.len(), "report collected");
        Ok(transcript)
    }
}
