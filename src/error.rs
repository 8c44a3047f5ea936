//! Top-level error for one run.
//!
//! Every variant is terminal and maps to exit code 1; the message is the only
//! place the failure class shows up.

use crate::config::ConfigError;
use crate::locator::LocateError;
use crate::report::{ParseError, ParsedResult, PolicyViolation};
use crate::session::SessionError;
use thiserror::Error;

/// Exit code for every kind of failure.
pub const EXIT_FAILURE: u8 = 1;

/// Why a run did not pass.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    NotFound(#[from] LocateError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The report is well formed but shows a problem.
    #[error("Unit tests failed: {}", join_violations(.violations))]
    PolicyFail {
        result: ParsedResult,
        violations: Vec<PolicyViolation>,
    },

    /// Writing the transcript or summary to the console failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// The parsed report, when the run got that far.
    pub fn parsed_result(&self) -> Option<&ParsedResult> {
        match self {
            Self::PolicyFail { result, .. } => Some(result),
            _ => None,
        }
    }
}
