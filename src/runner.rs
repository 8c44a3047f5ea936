//! One complete run: locate, drive the session, interpret the report.

use crate::error::RunError;
use crate::locator::DeviceLocator;
use crate::port::PortConnector;
use crate::report::{self, ParsedResult, Summary, Verdict};
use crate::session::{SessionDriver, SessionError};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// A run that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub address: String,
    pub result: ParsedResult,
    pub verdict: Verdict,
}

/// Locator, session driver and policy wired together.
#[derive(Debug)]
pub struct Runner<C> {
    locator: DeviceLocator,
    driver: SessionDriver<C>,
    leak_threshold: u64,
}

impl<C: PortConnector> Runner<C> {
    pub fn new(locator: DeviceLocator, driver: SessionDriver<C>, leak_threshold: u64) -> Self {
        Self {
            locator,
            driver,
            leak_threshold,
        }
    }

    /// Run the unit tests on `identifier`, echoing the transcript and the
    /// summary to `out`.
    pub fn run(&self, identifier: &str, out: &mut dyn Write) -> Result<RunOutcome, RunError> {
        let address = self.locator.resolve(identifier)?;
        info!(%address, "device located");

        let mut echo_error = None;
        let session = self.driver.run(address.as_str(), &mut |line| {
            if echo_error.is_none() {
                echo_error = writeln!(out, "{line}").err();
            }
        });
        if let Some(e) = echo_error {
            return Err(RunError::Output(e));
        }

        let transcript = match session {
            Ok(transcript) => transcript,
            Err(err @ SessionError::IncompleteReport { .. }) => {
                if let Some(partial) = err.partial_transcript() {
                    match report::parse(partial) {
                        Ok(result) => {
                            warn!(?result, "partial report parsed, prompt never returned")
                        }
                        Err(parse_err) => warn!(%parse_err, "partial report is unusable"),
                    }
                }
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let result = report::parse(&transcript)?;
        let verdict = report::evaluate(&result, self.leak_threshold);

        writeln!(
            out,
            "{}",
            Summary {
                result: &result,
                verdict
            }
        )?;

        match verdict {
            Verdict::Pass => Ok(RunOutcome {
                address: address.to_string(),
                result,
                verdict,
            }),
            Verdict::Fail => Err(RunError::PolicyFail {
                violations: report::violations(&result, self.leak_threshold),
                result,
            }),
        }
    }
}
