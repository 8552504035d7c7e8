/// Analysis Throughput Benchmarks
///
/// Measures how fast a benchmark run is digested: summary statistics over
/// large duration logs, resampling of upload timestamps at every width,
/// and the full report build.
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use consumer_perf::config::AnalysisConfig;
use consumer_perf::report::{AnalysisInputs, AnalysisReport};
use consumer_perf::stats::summarize;
use consumer_perf::steps::StepDurationSample;
use consumer_perf::throughput::{resample, BucketWidth};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Seeded durations between 10 and 11 ms, identical on every run
fn durations(n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.gen_range(10.0..11.0)).collect()
}

/// Uploads over one day at roughly `n` events
fn uploads(n: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2020, 4, 1, 0, 0, 0).unwrap();
    let step_ms = 86_400_000 / n as i64;
    (0..n as i64)
        .map(|i| start + TimeDelta::milliseconds(i * step_ms))
        .collect()
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");
    group.measurement_time(Duration::from_secs(5));

    for size in [1_000, 100_000, 1_000_000] {
        let data = durations(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| summarize(black_box(data)));
        });
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    group.measurement_time(Duration::from_secs(5));

    let events = uploads(1_000_000);
    group.throughput(Throughput::Elements(events.len() as u64));
    for width in BucketWidth::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| resample(black_box(&events), width));
        });
    }

    group.finish();
}

fn bench_report_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_build");
    group.measurement_time(Duration::from_secs(10));

    let steps: Vec<StepDurationSample> = durations(100_000)
        .into_iter()
        .map(|d| StepDurationSample::new([d, d, d, d, d * 1_000.0]).unwrap())
        .collect();
    let inputs = AnalysisInputs {
        steps: Some(steps),
        uploads: Some(uploads(100_000)),
        ..Default::default()
    };
    let config = AnalysisConfig::default();

    group.bench_function("steps_and_uploads_100k", |b| {
        b.iter(|| AnalysisReport::build(black_box(&inputs), &config));
    });

    group.finish();
}

criterion_group!(benches, bench_summarize, bench_resample, bench_report_build);

criterion_main!(benches);
