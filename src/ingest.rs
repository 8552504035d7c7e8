//! CSV readers for the consumer benchmark logs
//!
//! Four tables are understood:
//!
//! * consumer durations: `Offset,Duration` (milliseconds)
//! * step durations: `Read,Whitelisting,Marshalling,Time check,DB store` (nanoseconds by default)
//! * upload timestamps: one date-time per row in the first column
//! * memory consumption: a timestamp column followed by runtime metric columns
//!
//! Rows that break a value invariant are [`AnalysisError::MalformedRecord`]s
//! and are either fatal or skipped depending on the [`RecordPolicy`].
//! Timestamps that cannot be parsed always abort the load.

use crate::error::{AnalysisError, Result};
use crate::latency::DurationSample;
use crate::memory::{MemoryMetric, MemorySample};
use crate::steps::{Step, StepDurationSample};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// What to do with a row that violates its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Fail the whole load on the first malformed row
    #[default]
    Abort,
    /// Drop malformed rows and keep going
    Skip,
}

/// Records read from one table
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    /// Rows dropped under [`RecordPolicy::Skip`]
    pub skipped: usize,
}

impl<T> Loaded<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }

    fn accept(&mut self, row: Result<T>, policy: RecordPolicy, table: &str) -> Result<()> {
        match row {
            Ok(record) => self.records.push(record),
            Err(err) if policy == RecordPolicy::Skip && err.is_skippable() => {
                warn!(table, %err, "skipping malformed record");
                self.skipped += 1;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn extend(&mut self, rows: Result<Vec<T>>, policy: RecordPolicy, table: &str) -> Result<()> {
        match rows {
            Ok(records) => {
                self.records.extend(records);
                Ok(())
            }
            Err(err) => self.accept(Err(err), policy, table),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DurationRow {
    #[serde(rename = "Offset")]
    offset: i64,
    #[serde(rename = "Duration")]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct StepRow {
    #[serde(rename = "Read")]
    read: f64,
    #[serde(rename = "Whitelisting")]
    whitelisting: f64,
    #[serde(rename = "Marshalling")]
    marshalling: f64,
    #[serde(rename = "Time check")]
    time_check: f64,
    #[serde(rename = "DB store")]
    db_store: f64,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Convert a row-level CSV failure into a malformed record when possible
fn row_error(err: csv::Error) -> AnalysisError {
    match err.kind() {
        csv::ErrorKind::Deserialize { pos, err: de } => AnalysisError::MalformedRecord {
            line: pos.as_ref().map_or(0, |p| p.line()),
            reason: de.to_string(),
        },
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => AnalysisError::MalformedRecord {
            line: pos.as_ref().map_or(0, |p| p.line()),
            reason: format!("expected {expected_len} fields, found {len}"),
        },
        _ => AnalysisError::Csv(err),
    }
}

fn malformed(line: u64, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

/// Fail on the header line when a required column is absent
fn require_columns<'a>(
    headers: &csv::StringRecord,
    required: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h == column) {
            return Err(malformed(1, format!("missing column {column:?}")));
        }
    }
    Ok(())
}

/// Parse a date-time as written by the upload and metrics logs
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` and the `T`-separated form
/// (both read as UTC), and integer Unix seconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Read the per-message duration table
///
/// Offsets must strictly increase; a row that does not advance the offset is
/// malformed.
pub fn read_durations<R: Read>(
    reader: R,
    policy: RecordPolicy,
) -> Result<Loaded<DurationSample>> {
    let mut csv = csv_reader(reader);
    let headers = csv.headers()?.clone();
    require_columns(&headers, ["Offset", "Duration"])?;
    let mut loaded = Loaded::new();
    let mut last_offset: Option<i64> = None;

    for record in csv.records() {
        let row = record.map_err(row_error).and_then(|record| {
            let line = line_of(&record);
            let row: DurationRow = record
                .deserialize(Some(&headers))
                .map_err(|e| malformed(line, e.to_string()))?;
            if let Some(previous) = last_offset {
                if row.offset <= previous {
                    return Err(malformed(
                        line,
                        format!("offset {} does not advance past {}", row.offset, previous),
                    ));
                }
            }
            DurationSample::new(row.offset, row.duration).map_err(|reason| malformed(line, reason))
        });
        if let Ok(sample) = &row {
            last_offset = Some(sample.offset);
        }
        loaded.accept(row, policy, "consumer_durations")?;
    }

    debug!(
        records = loaded.records.len(),
        skipped = loaded.skipped,
        "loaded consumer durations"
    );
    Ok(loaded)
}

/// Read the per-step duration table
pub fn read_step_durations<R: Read>(
    reader: R,
    policy: RecordPolicy,
) -> Result<Loaded<StepDurationSample>> {
    let mut csv = csv_reader(reader);
    let headers = csv.headers()?.clone();
    require_columns(&headers, Step::ALL.iter().map(|step| step.column_name()))?;
    let mut loaded = Loaded::new();

    for record in csv.records() {
        let row = record.map_err(row_error).and_then(|record| {
            let line = line_of(&record);
            let row: StepRow = record
                .deserialize(Some(&headers))
                .map_err(|e| malformed(line, e.to_string()))?;
            StepDurationSample::new([
                row.read,
                row.whitelisting,
                row.marshalling,
                row.time_check,
                row.db_store,
            ])
            .map_err(|reason| malformed(line, reason))
        });
        loaded.accept(row, policy, "consumer_steps_durations")?;
    }

    debug!(
        records = loaded.records.len(),
        skipped = loaded.skipped,
        "loaded step durations"
    );
    Ok(loaded)
}

/// Read upload event timestamps from the first column
pub fn read_upload_timestamps<R: Read>(
    reader: R,
    policy: RecordPolicy,
) -> Result<Loaded<DateTime<Utc>>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut loaded = Loaded::new();

    for record in csv.records() {
        let row = record.map_err(row_error).and_then(|record| {
            let line = line_of(&record);
            let value = record.get(0).unwrap_or_default();
            parse_timestamp(value).ok_or_else(|| AnalysisError::UnparseableTimestamp {
                line,
                value: value.to_string(),
            })
        });
        loaded.accept(row, policy, "upload_timestamps")?;
    }

    debug!(records = loaded.records.len(), "loaded upload timestamps");
    Ok(loaded)
}

/// Read the wide memory consumption table into one sample per metric cell
///
/// The first column is the snapshot time; every other column must name a
/// known [`MemoryMetric`]. Empty cells mean the metric was not scraped in
/// that snapshot.
pub fn read_memory<R: Read>(reader: R, policy: RecordPolicy) -> Result<Loaded<MemorySample>> {
    let mut csv = csv_reader(reader);
    let headers = csv.headers()?.clone();

    let metrics = headers
        .iter()
        .skip(1)
        .map(|name| name.parse::<MemoryMetric>().map_err(|reason| malformed(1, reason)))
        .collect::<Result<Vec<_>>>()?;
    if metrics.is_empty() {
        return Err(malformed(1, "memory log has no metric columns"));
    }

    let mut loaded = Loaded::new();
    for record in csv.records() {
        let rows = record.map_err(row_error).and_then(|record| {
            let line = line_of(&record);
            let raw = record.get(0).unwrap_or_default();
            let timestamp =
                parse_timestamp(raw).ok_or_else(|| AnalysisError::UnparseableTimestamp {
                    line,
                    value: raw.to_string(),
                })?;

            let mut samples = Vec::with_capacity(metrics.len());
            for (metric, cell) in metrics.iter().zip(record.iter().skip(1)) {
                if cell.is_empty() {
                    continue;
                }
                let value: f64 = cell.parse().map_err(|_| {
                    malformed(line, format!("{metric} value {cell:?} is not a number"))
                })?;
                if !value.is_finite() || value < 0.0 {
                    return Err(malformed(
                        line,
                        format!("{metric} value {value} must be a non-negative number"),
                    ));
                }
                samples.push(MemorySample {
                    timestamp,
                    metric: *metric,
                    value,
                });
            }
            Ok(samples)
        });
        loaded.extend(rows, policy, "memory_consumption")?;
    }

    debug!(
        samples = loaded.records.len(),
        skipped = loaded.skipped,
        "loaded memory consumption"
    );
    Ok(loaded)
}

pub fn load_durations<P: AsRef<Path>>(
    path: P,
    policy: RecordPolicy,
) -> Result<Loaded<DurationSample>> {
    read_durations(File::open(path)?, policy)
}

pub fn load_step_durations<P: AsRef<Path>>(
    path: P,
    policy: RecordPolicy,
) -> Result<Loaded<StepDurationSample>> {
    read_step_durations(File::open(path)?, policy)
}

pub fn load_upload_timestamps<P: AsRef<Path>>(
    path: P,
    policy: RecordPolicy,
) -> Result<Loaded<DateTime<Utc>>> {
    read_upload_timestamps(File::open(path)?, policy)
}

pub fn load_memory<P: AsRef<Path>>(
    path: P,
    policy: RecordPolicy,
) -> Result<Loaded<MemorySample>> {
    read_memory(File::open(path)?, policy)
}
