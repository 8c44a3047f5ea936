//! Device locator.
//!
//! Turns a device identifier (the name the device reports, e.g. `Anen0x`) into
//! the path of its serial endpoint. Platform naming conventions are data: an
//! ordered list of [`NamingTemplate`]s, each bound to one host OS.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Placeholder substituted with the device identifier inside a template.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Resolved, connectable serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while locating a device.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("Name or serial port is invalid: {0}")]
    NotFound(String),
}

/// A device path pattern used on one host OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    /// Value of `std::env::consts::OS` this template applies to.
    pub os: String,
    /// Path with `{id}` placeholders.
    pub pattern: String,
}

impl NamingTemplate {
    pub fn new(os: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            pattern: pattern.into(),
        }
    }

    /// Expand the pattern for `identifier`.
    pub fn render(&self, identifier: &str) -> String {
        self.pattern.replace(ID_PLACEHOLDER, identifier)
    }
}

/// Built-in templates, tried in order.
pub fn default_templates() -> Vec<NamingTemplate> {
    vec![
        NamingTemplate::new("macos", "/dev/cu.usbmodemflip_{id}1"),
        NamingTemplate::new(
            "linux",
            "/dev/serial/by-id/usb-Flipper_Devices_Inc._Flipper_{id}_flip_{id}-if00",
        ),
    ]
}

/// Resolves identifiers against naming templates for one host OS.
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    os: String,
    templates: Vec<NamingTemplate>,
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self::with_templates(std::env::consts::OS, default_templates())
    }
}

impl DeviceLocator {
    /// Locator for `os` using the given templates.
    pub fn with_templates(os: impl Into<String>, templates: Vec<NamingTemplate>) -> Self {
        Self {
            os: os.into(),
            templates,
        }
    }

    /// Candidate paths for `identifier` on this host, in order.
    ///
    /// Empty on a host OS with no template.
    pub fn candidates(&self, identifier: &str) -> Vec<String> {
        self.templates
            .iter()
            .filter(|t| t.os == self.os)
            .map(|t| t.render(identifier))
            .collect()
    }

    /// Resolve `identifier` to an existing device path.
    ///
    /// Template candidates win over the identifier itself; a raw path is
    /// returned unchanged when no template matches.
    pub fn resolve(&self, identifier: &str) -> Result<DeviceAddress, LocateError> {
        for candidate in self.candidates(identifier) {
            if Path::new(&candidate).exists() {
                debug!(identifier, candidate = %candidate, "resolved device by template");
                return Ok(DeviceAddress(candidate));
            }
            debug!(candidate = %candidate, "template candidate does not exist");
        }

        if !identifier.is_empty() && Path::new(identifier).exists() {
            debug!(identifier, "using identifier as a literal device path");
            return Ok(DeviceAddress(identifier.to_string()));
        }

        Err(LocateError::NotFound(identifier.to_string()))
    }
}

/// Resolve with the built-in templates for the current host.
pub fn resolve(identifier: &str) -> Result<DeviceAddress, LocateError> {
    DeviceLocator::default().resolve(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn locator_in(dir: &Path, os: &str) -> DeviceLocator {
        DeviceLocator::with_templates(
            os,
            vec![
                NamingTemplate::new("linux", format!("{}/by-id-{{id}}", dir.display())),
                NamingTemplate::new("macos", format!("{}/cu.flip_{{id}}1", dir.display())),
            ],
        )
    }

    #[test]
    fn test_default_templates_render_device_names() {
        let rendered: Vec<String> = default_templates()
            .iter()
            .map(|t| t.render("Anen0x"))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "/dev/cu.usbmodemflip_Anen0x1".to_string(),
                "/dev/serial/by-id/usb-Flipper_Devices_Inc._Flipper_Anen0x_flip_Anen0x-if00"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_candidates_filtered_by_os() {
        let locator = DeviceLocator::with_templates("macos", default_templates());
        assert_eq!(
            locator.candidates("Anen0x"),
            vec!["/dev/cu.usbmodemflip_Anen0x1".to_string()]
        );

        let locator = DeviceLocator::with_templates("freebsd", default_templates());
        assert!(locator.candidates("Anen0x").is_empty());
    }

    #[test]
    fn test_template_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("by-id-Anen0x");
        File::create(&device).unwrap();

        let address = locator_in(dir.path(), "linux").resolve("Anen0x").unwrap();
        assert_eq!(address.as_str(), device.to_str().unwrap());
    }

    #[test]
    fn test_template_for_other_os_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("cu.flip_Anen0x1")).unwrap();

        let result = locator_in(dir.path(), "linux").resolve("Anen0x");
        assert_eq!(result, Err(LocateError::NotFound("Anen0x".to_string())));
    }

    #[test]
    fn test_literal_path_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("ttyACM0");
        File::create(&raw).unwrap();
        let raw = raw.to_str().unwrap();

        let address = locator_in(dir.path(), "linux").resolve(raw).unwrap();
        assert_eq!(address.as_str(), raw);
    }

    #[test]
    fn test_unknown_identifier_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = locator_in(dir.path(), "linux").resolve("nope").unwrap_err();
        assert_eq!(err.to_string(), "Name or serial port is invalid: nope");
    }

    #[test]
    fn test_empty_identifier_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locator_in(dir.path(), "windows").resolve("").is_err());
    }
}
