//! Runs the real protocol against an attached device.

use std::env;
use std::time::Duration;
use unit_runner::config::ConfigLoader;
use unit_runner::locator::resolve;
use unit_runner::session::{SessionConfig, SessionDriver};
use unit_runner::SerialConnector;

/// Skip test if no device is configured.
fn skip_without_hardware() -> Option<String> {
    let device = env::var("TEST_DEVICE").ok();
    if device.is_none() {
        println!("Skipping hardware test: TEST_DEVICE not set");
    }
    device
}

#[test]
#[ignore] // Run with --ignored flag
fn test_device_resolves() {
    let Some(device) = skip_without_hardware() else {
        return;
    };
    let address = resolve(&device).expect("device should resolve");
    println!("Resolved {device} to {address}");
}

#[test]
#[ignore] // Run with --ignored flag
fn test_handshake_and_help_command() {
    let Some(device) = skip_without_hardware() else {
        return;
    };
    let address = resolve(&device).expect("device should resolve");
    let config = SessionConfig {
        command: b"help\r".to_vec(),
        total_timeout: Duration::from_secs(5),
        ..ConfigLoader::with_defaults().config().device.session_config()
    };

    let transcript = SessionDriver::new(SerialConnector, config)
        .run(address.as_str(), &mut |line| println!("{line}"))
        .expect("help should return to the prompt");
    assert!(!transcript.is_empty());
}
