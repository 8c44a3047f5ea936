use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use unit_runner::report::parse;
use unit_runner::Transcript;

pub fn bench_report_parsing(c: &mut Criterion) {
    let mut lines: Vec<String> = (0..500)
        .map(|i| format!("[I][UnitTests] test_case_{i} ... ok"))
        .collect();
    lines.extend(
        ["Failed tests: 0", "Consumed: 61005", "Leaked: 0", "Status: Passed"]
            .map(String::from),
    );
    let transcript = Transcript::from_lines(lines);

    c.bench_function("parse_report_500_lines", |b| {
        b.iter(|| black_box(parse(black_box(&transcript))))
    });
}

criterion_group!{
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_report_parsing
}
criterion_main!(benches);
