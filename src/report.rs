//! Report interpreter.
//!
//! The device ends a unit-test run with four report lines, interleaved with
//! whatever diagnostics the tests printed:
//!
//! ```text
//! Failed tests: 0
//! Consumed: 1523
//! Leaked: 0
//! Status: Passed
//! ```
//!
//! [`parse`] scans a transcript once and keeps the first match for each line;
//! [`evaluate`] applies the pass/fail policy.

use crate::transcript::Transcript;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Leak allowance used when none is configured.
pub const DEFAULT_LEAK_THRESHOLD: u64 = 3000;

/// Status word the device prints for a clean run.
pub const PASSED_STATUS: &str = "Passed";

static FAILED_TESTS_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^Failed tests: [0-9]"));
static CONSUMED_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^Consumed: [0-9]"));
static LEAKED_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^Leaked: [0-9]"));
static STATUS_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^Status: \w{3,}"));
static DIGITS: Lazy<Regex> = Lazy::new(|| compile(r"[0-9]+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("report line patterns are valid")
}

/// One of the four mandatory report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    FailedTests,
    Elapsed,
    Leaked,
    Status,
}

impl ReportField {
    pub const ALL: [ReportField; 4] = [
        ReportField::FailedTests,
        ReportField::Elapsed,
        ReportField::Leaked,
        ReportField::Status,
    ];

    /// Label the device prints in front of the value.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::FailedTests => "Failed tests: ",
            Self::Elapsed => "Consumed: ",
            Self::Leaked => "Leaked: ",
            Self::Status => "Status: ",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::FailedTests => &FAILED_TESTS_LINE,
            Self::Elapsed => &CONSUMED_LINE,
            Self::Leaked => &LEAKED_LINE,
            Self::Status => &STATUS_LINE,
        }
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches([':', ' ']))
    }
}

/// Errors produced while reading the report out of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// At least one report line never appeared.
    #[error("Failed to get data. Or output is corrupt (missing: {})", join_fields(.missing))]
    Incomplete { missing: Vec<ReportField> },

    /// A report line matched but its number does not fit in 64 bits.
    #[error("Malformed {field} line: {line:?}")]
    Malformed { field: ReportField, line: String },
}

fn join_fields(fields: &[ReportField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values extracted from a complete report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedResult {
    pub failed_tests: u64,
    pub leaked_bytes: u64,
    pub elapsed_millis: u64,
    pub status: String,
}

/// First-match-wins accumulator for the four report lines.
#[derive(Debug, Default)]
struct ReportAccumulator {
    failed_tests: Option<u64>,
    elapsed_millis: Option<u64>,
    leaked_bytes: Option<u64>,
    status: Option<String>,
}

impl ReportAccumulator {
    fn feed(&mut self, line: &str) -> Result<(), ParseError> {
        for field in ReportField::ALL {
            if self.has(field) || !field.pattern().is_match(line) {
                continue;
            }
            match field {
                ReportField::FailedTests => self.failed_tests = Some(first_number(field, line)?),
                ReportField::Elapsed => self.elapsed_millis = Some(first_number(field, line)?),
                ReportField::Leaked => self.leaked_bytes = Some(first_number(field, line)?),
                ReportField::Status => {
                    self.status = line.split_whitespace().nth(1).map(str::to_string);
                }
            }
        }
        Ok(())
    }

    fn has(&self, field: ReportField) -> bool {
        match field {
            ReportField::FailedTests => self.failed_tests.is_some(),
            ReportField::Elapsed => self.elapsed_millis.is_some(),
            ReportField::Leaked => self.leaked_bytes.is_some(),
            ReportField::Status => self.status.is_some(),
        }
    }

    fn finish(self) -> Result<ParsedResult, ParseError> {
        match self {
            ReportAccumulator {
                failed_tests: Some(failed_tests),
                elapsed_millis: Some(elapsed_millis),
                leaked_bytes: Some(leaked_bytes),
                status: Some(status),
            } => Ok(ParsedResult {
                failed_tests,
                leaked_bytes,
                elapsed_millis,
                status,
            }),
            partial => Err(ParseError::Incomplete {
                missing: ReportField::ALL
                    .into_iter()
                    .filter(|f| !partial.has(*f))
                    .collect(),
            }),
        }
    }
}

fn first_number(field: ReportField, line: &str) -> Result<u64, ParseError> {
    DIGITS
        .find(line)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ParseError::Malformed {
            field,
            line: line.to_string(),
        })
}

/// Extract the report from `transcript` in a single pass.
pub fn parse(transcript: &Transcript) -> Result<ParsedResult, ParseError> {
    parse_lines(transcript.iter())
}

/// [`parse`] over any sequence of lines.
pub fn parse_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<ParsedResult, ParseError> {
    let mut acc = ReportAccumulator::default();
    for line in lines {
        acc.feed(line)?;
    }
    acc.finish()
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// A single reason a well-formed report fails the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyViolation {
    FailedTests { count: u64 },
    LeakedBytes { leaked: u64, threshold: u64 },
    Status { status: String },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailedTests { count } => write!(f, "{count} failed tests"),
            Self::LeakedBytes { leaked, threshold } => {
                write!(f, "{leaked} bytes leaked (allowed {threshold})")
            }
            Self::Status { status } => write!(f, "device status {status:?}"),
        }
    }
}

/// Every policy rule `result` breaks.
pub fn violations(result: &ParsedResult, leak_threshold: u64) -> Vec<PolicyViolation> {
    let mut found = Vec::new();
    if result.failed_tests > 0 {
        found.push(PolicyViolation::FailedTests {
            count: result.failed_tests,
        });
    }
    if result.leaked_bytes > leak_threshold {
        found.push(PolicyViolation::LeakedBytes {
            leaked: result.leaked_bytes,
            threshold: leak_threshold,
        });
    }
    if result.status != PASSED_STATUS {
        found.push(PolicyViolation::Status {
            status: result.status.clone(),
        });
    }
    found
}

/// Pass only with no failed tests, leaks within the threshold and status `Passed`.
pub fn evaluate(result: &ParsedResult, leak_threshold: u64) -> Verdict {
    if violations(result, leak_threshold).is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Console summary printed after the transcript.
#[derive(Debug, Clone, Copy)]
pub struct Summary<'a> {
    pub result: &'a ParsedResult,
    pub verdict: Verdict,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.result.elapsed_millis;
        let seconds = format!("{}.{:03}", ms / 1000, ms % 1000);
        match self.verdict {
            Verdict::Pass => write!(
                f,
                "Tests ran successfully! Time elapsed {seconds} seconds."
            ),
            Verdict::Fail => {
                writeln!(f, "Got {} failed tests.", self.result.failed_tests)?;
                writeln!(f, "Leaked {} bytes.", self.result.leaked_bytes)?;
                writeln!(f, "Status by device: {}", self.result.status)?;
                write!(f, "Time elapsed {seconds} seconds.")
            }
        }
    }
}
