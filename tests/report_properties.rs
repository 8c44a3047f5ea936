//! Property tests for report parsing and the pass/fail policy.

use proptest::prelude::*;
use unit_runner::report::{evaluate, parse_lines, ParseError, ParsedResult, ReportField, Verdict};

fn report_lines(r: &ParsedResult) -> Vec<String> {
    vec![
        format!("Failed tests: {}", r.failed_tests),
        format!("Consumed: {}", r.elapsed_millis),
        format!("Leaked: {}", r.leaked_bytes),
        format!("Status: {}", r.status),
    ]
}

fn any_result() -> impl Strategy<Value = ParsedResult> {
    (
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        prop::sample::select(vec!["Passed", "Failed", "passed", "Crashed"]),
    )
        .prop_map(|(failed_tests, leaked_bytes, elapsed_millis, status)| ParsedResult {
            failed_tests,
            leaked_bytes,
            elapsed_millis,
            status: status.to_string(),
        })
}

/// Lines that can never be mistaken for report lines.
fn noise() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z\\[][a-zA-Z0-9 :\\]]{0,30}", 0..12)
}

/// Insert `lines` into `noise`, in order, at the given positions.
fn interleave(mut noise: Vec<String>, lines: Vec<String>, positions: &[usize]) -> Vec<String> {
    for (line, pos) in lines.into_iter().zip(positions) {
        let at = pos % (noise.len() + 1);
        noise.insert(at, line);
    }
    noise
}

proptest! {
    #[test]
    fn parse_ignores_order_and_interleaving(
        result in any_result(),
        shuffled in Just((0..4usize).collect::<Vec<_>>()).prop_shuffle(),
        noise in noise(),
        positions in prop::collection::vec(any::<usize>(), 4),
    ) {
        let lines = report_lines(&result);
        let ordered: Vec<String> = shuffled.iter().map(|&i| lines[i].clone()).collect();
        let transcript = interleave(noise, ordered, &positions);

        let parsed = parse_lines(transcript.iter().map(String::as_str)).unwrap();
        prop_assert_eq!(parsed, result);
    }

    #[test]
    fn parse_fails_when_any_line_is_missing(
        result in any_result(),
        dropped in 0..4usize,
        noise in noise(),
        positions in prop::collection::vec(any::<usize>(), 3),
    ) {
        let mut lines = report_lines(&result);
        lines.remove(dropped);
        let transcript = interleave(noise, lines, &positions);

        let err = parse_lines(transcript.iter().map(String::as_str)).unwrap_err();
        prop_assert_eq!(err, ParseError::Incomplete { missing: vec![ReportField::ALL[dropped]] });
    }

    #[test]
    fn any_failed_test_fails_the_run(failed in 1..=u64::MAX, elapsed in any::<u64>()) {
        let mut result = ParsedResult {
            failed_tests: 0,
            leaked_bytes: 0,
            elapsed_millis: elapsed,
            status: "Passed".to_string(),
        };
        prop_assert_eq!(evaluate(&result, 3000), Verdict::Pass);

        result.failed_tests = failed;
        prop_assert_eq!(evaluate(&result, 3000), Verdict::Fail);
    }

    #[test]
    fn leak_threshold_is_inclusive(threshold in 0..u64::MAX) {
        let mut result = ParsedResult {
            failed_tests: 0,
            leaked_bytes: threshold,
            elapsed_millis: 0,
            status: "Passed".to_string(),
        };
        prop_assert_eq!(evaluate(&result, threshold), Verdict::Pass);

        result.leaked_bytes = threshold + 1;
        prop_assert_eq!(evaluate(&result, threshold), Verdict::Fail);
    }
}
