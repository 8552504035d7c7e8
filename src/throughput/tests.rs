// Tests for resampling and scenario classification
//
// Fixtures mirror the April 2020 upload log: bursts during the day, quiet
// nights, and a benchmark run of 100000 messages over 26 minutes.

use super::*;
use crate::error::AnalysisError;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 4, 1, h, m, s).unwrap()
}

/// 100000 evenly spaced events over exactly 26 minutes, starting on a minute
fn benchmark_run() -> Vec<DateTime<Utc>> {
    let start = at(9, 0, 0);
    let window_ns: i64 = 26 * 60 * 1_000_000_000;
    (0..100_000i64)
        .map(|i| start + TimeDelta::nanoseconds(i * window_ns / 100_000))
        .collect()
}

#[test]
fn test_empty_input_gives_empty_series() {
    let series = resample(&[], BucketWidth::Second);
    assert!(series.is_empty());
    assert_eq!(series.total(), 0);
    assert!(series.busiest().is_none());
}

#[test]
fn test_single_event() {
    let series = resample(&[at(12, 30, 15)], BucketWidth::Hour);
    assert_eq!(series.len(), 1);
    assert_eq!(series.buckets[0].start, at(12, 0, 0));
    assert_eq!(series.buckets[0].count, 1);
}

#[test]
fn test_gaps_are_filled_with_zero_buckets() {
    let events = vec![at(0, 0, 1), at(3, 59, 59), at(0, 30, 0)];
    let series = resample(&events, BucketWidth::Hour);

    assert_eq!(series.counts(), vec![2, 0, 0, 1]);
    for pair in series.buckets.windows(2) {
        assert_eq!(pair[1].start - pair[0].start, BucketWidth::Hour.as_delta());
    }
}

#[test]
fn test_bucket_boundaries_are_half_open() {
    // An event exactly on a boundary opens the next bucket
    let events = vec![at(10, 0, 59), at(10, 1, 0)];
    let series = resample(&events, BucketWidth::Minute);
    assert_eq!(series.counts(), vec![1, 1]);
    assert_eq!(series.buckets[1].start, at(10, 1, 0));
}

#[test]
fn test_sub_second_timestamps_truncate_down() {
    let base = at(8, 0, 0);
    let events = vec![
        base + TimeDelta::milliseconds(999),
        base + TimeDelta::milliseconds(1_000),
        base + TimeDelta::milliseconds(1_001),
    ];
    let series = resample(&events, BucketWidth::Second);
    assert_eq!(series.counts(), vec![1, 2]);
}

#[test]
fn test_day_buckets_span_midnight() {
    let events = vec![
        Utc.with_ymd_and_hms(2020, 4, 1, 23, 59, 59).unwrap(),
        Utc.with_ymd_and_hms(2020, 4, 2, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 4, 4, 12, 0, 0).unwrap(),
    ];
    let series = resample(&events, BucketWidth::Day);
    assert_eq!(series.counts(), vec![1, 1, 0, 1]);
    assert_eq!(
        series.buckets[0].start,
        Utc.with_ymd_and_hms(2020, 4, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_alignment_shared_across_widths() {
    let events = vec![at(7, 45, 30), at(9, 10, 0)];
    for width in BucketWidth::ALL {
        let series = resample(&events, width);
        let first = series.buckets[0].start;
        let since_midnight = first - at(0, 0, 0);
        assert_eq!(since_midnight.num_seconds() % width.seconds(), 0);
        assert_eq!(series.total(), 2);
    }
}

#[test]
fn test_order_independence() {
    let mut events = vec![at(1, 0, 0), at(1, 0, 3), at(1, 0, 1), at(1, 0, 3)];
    let forward = resample(&events, BucketWidth::Second);
    events.reverse();
    let backward = resample(&events, BucketWidth::Second);
    assert_eq!(forward, backward);
}

#[test]
fn test_benchmark_run_per_minute() {
    let events = benchmark_run();
    let series = resample(&events, BucketWidth::Minute);

    assert_eq!(series.len(), 26);
    assert_eq!(series.total(), 100_000);
    for bucket in &series.buckets {
        assert!(
            (3846..=3847).contains(&bucket.count),
            "bucket {} has {} events",
            bucket.start,
            bucket.count
        );
    }

    let report = classify(&series.counts(), 3846.0).unwrap();
    assert!((report.average.observed - 100_000.0 / 26.0).abs() < 1e-9);
    assert!(report.best.observed - report.worst.observed <= 1.0);
    assert!((report.average.ratio - 1.0).abs() < 1e-3);
}

#[test]
fn test_without_partial_tail() {
    let series = resample(&[at(1, 0, 0), at(1, 2, 0)], BucketWidth::Minute);
    assert_eq!(series.without_partial_tail().len(), 2);
    assert_eq!(series.without_partial_tail()[1].count, 0);

    let empty = resample(&[], BucketWidth::Minute);
    assert!(empty.without_partial_tail().is_empty());
}

#[test]
fn test_busiest_and_quietest() {
    let events = vec![at(2, 0, 0), at(2, 0, 0), at(2, 0, 2), at(2, 0, 3), at(2, 0, 3)];
    let series = resample(&events, BucketWidth::Second);
    assert_eq!(series.busiest().unwrap().start, at(2, 0, 0));
    assert_eq!(series.quietest().unwrap().start, at(2, 0, 1));
    assert_eq!(series.quietest().unwrap().count, 0);
}

#[test]
fn test_series_summary_excludes_tail() {
    let events = vec![at(5, 0, 0), at(5, 0, 0), at(5, 1, 0), at(5, 1, 0), at(5, 2, 0)];
    let series = resample(&events, BucketWidth::Minute);

    let full = series.summary(false).unwrap();
    assert_eq!(full.count, 3);
    assert_eq!(full.min, 1.0);

    let trimmed = series.summary(true).unwrap();
    assert_eq!(trimmed.count, 2);
    assert_eq!(trimmed.mean, 2.0);
}

#[test]
fn test_classify_scenarios() {
    let report = classify(&[100, 150, 50, 100], 200.0).unwrap();
    assert_eq!(report.buckets, 4);
    assert_eq!(report.average.observed, 100.0);
    assert_eq!(report.best.observed, 150.0);
    assert_eq!(report.worst.observed, 50.0);
    assert_eq!(report.best.ratio, 0.75);
    assert_eq!(report.worst.ratio, 0.25);
    assert!(report.within_capacity());
}

#[test]
fn test_classify_over_capacity() {
    let report = classify(&[10, 400], 143.0).unwrap();
    assert!(!report.within_capacity());
}

#[test]
fn test_classify_empty_series() {
    assert!(matches!(
        classify(&[], 100.0),
        Err(AnalysisError::EmptyInput { .. })
    ));
}

#[test]
fn test_classify_rejects_non_positive_peak() {
    assert!(matches!(
        classify(&[1, 2], 0.0),
        Err(AnalysisError::DivisionByZero { .. })
    ));
    assert!(classify(&[1, 2], f64::NAN).is_err());
}

#[test]
fn test_classify_series_scales_peak_to_width() {
    let events = vec![at(6, 0, 0), at(6, 0, 10), at(6, 1, 0)];
    let series = resample(&events, BucketWidth::Minute);

    let report = classify_series(&series, 2.0, false).unwrap();
    assert_eq!(report.theoretical_peak, 120.0);
    assert_eq!(report.buckets, 2);

    let trimmed = classify_series(&series, 2.0, true).unwrap();
    assert_eq!(trimmed.buckets, 1);
    assert_eq!(trimmed.best.observed, 2.0);
}

#[test]
fn test_classify_series_single_bucket_without_tail_is_empty() {
    let series = resample(&[at(6, 0, 0)], BucketWidth::Minute);
    assert!(matches!(
        classify_series(&series, 1.0, true),
        Err(AnalysisError::EmptyInput { .. })
    ));
}

#[test]
fn test_rate_projection() {
    let rates = RateProjection::from_per_second(143.0);
    assert_eq!(rates.per_minute, 8_580.0);
    assert_eq!(rates.per_hour, 514_800.0);
    assert_eq!(rates.per_day, 12_355_200.0);
    assert!(rates.to_string().contains("Per day     12355200"));
}
