// Fixed-width time buckets for event counts
//
// Buckets are aligned to midnight UTC of the day holding the earliest event.
// Every supported width divides a day, so the grid is the same one a plain
// truncation of Unix time would give.

use crate::error::Result;
use crate::stats::{summarize, StatSummary};
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a resampling bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidth {
    #[serde(alias = "1D")]
    Day,
    #[serde(alias = "60min")]
    Hour,
    #[serde(alias = "1min")]
    Minute,
    #[serde(alias = "1s")]
    Second,
}

impl BucketWidth {
    pub const ALL: [BucketWidth; 4] = [
        BucketWidth::Day,
        BucketWidth::Hour,
        BucketWidth::Minute,
        BucketWidth::Second,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            BucketWidth::Day => 86_400,
            BucketWidth::Hour => 3_600,
            BucketWidth::Minute => 60,
            BucketWidth::Second => 1,
        }
    }

    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BucketWidth::Day => "day",
            BucketWidth::Hour => "hour",
            BucketWidth::Minute => "minute",
            BucketWidth::Second => "second",
        };
        f.write_str(name)
    }
}

/// Number of events in the half-open interval `[start, start + width)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub count: u64,
}

/// Contiguous bucket counts at one width
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSeries {
    pub width: BucketWidth,
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of events across all buckets
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.count).collect()
    }

    /// All buckets except the last one, which usually covers only part of
    /// its interval
    pub fn without_partial_tail(&self) -> &[Bucket] {
        match self.buckets.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Bucket with the most events (earliest one on ties)
    pub fn busiest(&self) -> Option<&Bucket> {
        self.buckets
            .iter()
            .reduce(|best, b| if b.count > best.count { b } else { best })
    }

    /// Bucket with the fewest events (earliest one on ties)
    pub fn quietest(&self) -> Option<&Bucket> {
        self.buckets
            .iter()
            .reduce(|low, b| if b.count < low.count { b } else { low })
    }

    /// Statistics over the bucket counts, optionally without the last bucket
    pub fn summary(&self, exclude_tail: bool) -> Result<StatSummary> {
        let buckets = if exclude_tail {
            self.without_partial_tail()
        } else {
            &self.buckets[..]
        };
        let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();
        summarize(&counts)
    }
}

/// Group event timestamps into gapless buckets of `width`
///
/// The series spans from the bucket holding the earliest event to the
/// bucket holding the latest one; buckets without events have a zero count.
/// Input order does not matter. An empty input gives an empty series.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use consumer_perf::throughput::{resample, BucketWidth};
///
/// let events = vec![
///     Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 5).unwrap(),
///     Utc.with_ymd_and_hms(2020, 4, 1, 10, 2, 59).unwrap(),
///     Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 30).unwrap(),
/// ];
/// let series = resample(&events, BucketWidth::Minute);
/// assert_eq!(series.counts(), vec![2, 0, 1]);
/// ```
pub fn resample(timestamps: &[DateTime<Utc>], width: BucketWidth) -> BucketSeries {
    let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else {
        return BucketSeries {
            width,
            buckets: Vec::new(),
        };
    };

    let epoch = first.date_naive().and_time(NaiveTime::MIN).and_utc();
    let step = width.seconds();
    // Timestamps are never before the epoch, so truncation is a floor
    let slot = |t: &DateTime<Utc>| ((*t - epoch).num_seconds() / step) as usize;

    let first_slot = slot(first);
    let mut counts = vec![0u64; slot(last) - first_slot + 1];
    for t in timestamps {
        counts[slot(t) - first_slot] += 1;
    }

    let buckets = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bucket {
            start: epoch + TimeDelta::seconds((first_slot + i) as i64 * step),
            count,
        })
        .collect();

    BucketSeries { width, buckets }
}
