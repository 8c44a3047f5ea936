//! Tests against a real device.
//!
//! ```bash
//! export TEST_DEVICE=Anen0x     # device name or /dev/ttyACM0
//! cargo test -- --ignored
//! ```

pub mod device_tests;
