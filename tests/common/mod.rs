//! Shared test utilities.
//!
//! Builds mock devices that behave like the real firmware CLI: stale output
//! sitting in the buffer, a banner and prompt once the host connects, and the
//! report in reply to the unit test command.

#![allow(dead_code)]

use std::time::Duration;
use tempfile::NamedTempFile;
use unit_runner::port::MockSerialPort;
use unit_runner::session::SessionConfig;

pub const PROMPT: &str = ">: ";
pub const COMMAND: &[u8] = b"unit_tests\r";

/// The four report lines of a clean run.
pub const CLEAN_REPORT: [&str; 4] = [
    "Failed tests: 0",
    "Consumed: 1523",
    "Leaked: 0",
    "Status: Passed",
];

/// Session timeouts short enough for tests.
pub fn fast_session_config() -> SessionConfig {
    SessionConfig {
        command_timeout: Duration::from_millis(40),
        total_timeout: Duration::from_millis(80),
        ..SessionConfig::default()
    }
}

/// Device reply to the command: echo, report lines, then the prompt.
pub fn report_reply(lines: &[&str]) -> Vec<u8> {
    let mut reply = String::from("unit_tests\r\n");
    for line in lines {
        reply.push_str(line);
        reply.push_str("\r\n");
    }
    reply.push_str(PROMPT);
    reply.into_bytes()
}

/// A device that answers the command with `lines`.
pub fn scripted_device(lines: &[&str]) -> MockSerialPort {
    let mut port = MockSerialPort::new("MOCK0");
    port.enqueue_read(b"Status: Failed\r\nleftover from an earlier run\r\n>: ");
    port.enqueue_after_clear(b"\r\n  Firmware CLI\r\n\r\n>: ");
    port.reply_to(COMMAND, &report_reply(lines));
    port
}

/// A device that prints its prompt but never finishes the report.
pub fn stalling_device(lines: &[&str]) -> MockSerialPort {
    let mut port = MockSerialPort::new("MOCK0");
    port.enqueue_after_clear(b">: ");
    let mut reply = report_reply(lines);
    reply.truncate(reply.len() - PROMPT.len());
    port.reply_to(COMMAND, &reply);
    port
}

/// A file standing in for the device node, so the locator's literal path
/// fallback resolves it.
pub fn device_node() -> (NamedTempFile, String) {
    let file = NamedTempFile::new().expect("create device node");
    let path = file.path().to_string_lossy().into_owned();
    (file, path)
}
