//! Process memory behavior from periodic runtime metric snapshots
//!
//! The consumer exports a fixed set of Go runtime metrics. Gauges are
//! summarized as levels; counters additionally get an average rate over the
//! observed window.

use crate::error::{AnalysisError, Result};
use crate::stats::{summarize, StatSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Runtime metric captured in the memory consumption log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryMetric {
    #[serde(rename = "go_gc_duration_seconds_sum")]
    GcPauseSum,
    #[serde(rename = "go_gc_duration_seconds_count")]
    GcPauseCount,
    #[serde(rename = "go_memstats_alloc_bytes")]
    AllocBytes,
    #[serde(rename = "go_memstats_sys_bytes")]
    SysBytes,
    #[serde(rename = "go_memstats_mallocs_total")]
    MallocsTotal,
    #[serde(rename = "go_memstats_frees_total")]
    FreesTotal,
}

impl MemoryMetric {
    pub const ALL: [MemoryMetric; 6] = [
        MemoryMetric::GcPauseSum,
        MemoryMetric::GcPauseCount,
        MemoryMetric::AllocBytes,
        MemoryMetric::SysBytes,
        MemoryMetric::MallocsTotal,
        MemoryMetric::FreesTotal,
    ];

    /// Name used by the metrics exporter and the log header
    pub fn name(self) -> &'static str {
        match self {
            MemoryMetric::GcPauseSum => "go_gc_duration_seconds_sum",
            MemoryMetric::GcPauseCount => "go_gc_duration_seconds_count",
            MemoryMetric::AllocBytes => "go_memstats_alloc_bytes",
            MemoryMetric::SysBytes => "go_memstats_sys_bytes",
            MemoryMetric::MallocsTotal => "go_memstats_mallocs_total",
            MemoryMetric::FreesTotal => "go_memstats_frees_total",
        }
    }

    /// Monotonic counters, as opposed to gauges
    pub fn is_counter(self) -> bool {
        !matches!(self, MemoryMetric::AllocBytes | MemoryMetric::SysBytes)
    }
}

impl fmt::Display for MemoryMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MemoryMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let wanted = s.trim();
        MemoryMetric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| format!("unknown memory metric {wanted:?}"))
    }
}

/// One snapshot of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySample {
    pub timestamp: DateTime<Utc>,
    pub metric: MemoryMetric,
    pub value: f64,
}

/// Behavior of one metric over the captured window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricProfile {
    pub metric: MemoryMetric,
    pub summary: StatSummary,
    pub first: f64,
    pub last: f64,
    /// `last - first`
    pub growth: f64,
    pub span_seconds: f64,
    /// Average increase per second, for counters observed over a non-zero span
    pub rate_per_second: Option<f64>,
}

/// Profiles of every metric present in the log, in vocabulary order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryProfile {
    pub metrics: Vec<MetricProfile>,
}

impl MemoryProfile {
    pub fn from_samples(samples: &[MemorySample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyInput {
                what: "memory profile",
            });
        }

        let mut series: BTreeMap<MemoryMetric, Vec<&MemorySample>> = BTreeMap::new();
        for sample in samples {
            series.entry(sample.metric).or_default().push(sample);
        }

        let mut metrics = Vec::with_capacity(series.len());
        for (metric, mut points) in series {
            // Stable: snapshots sharing a timestamp keep their log order
            points.sort_by_key(|p| p.timestamp);

            let values: Vec<f64> = points.iter().map(|p| p.value).collect();
            let summary = summarize(&values)?;
            let (first, last) = (points[0], points[points.len() - 1]);
            let growth = last.value - first.value;
            let span_seconds =
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1e3;
            let rate_per_second =
                (metric.is_counter() && span_seconds > 0.0).then(|| growth / span_seconds);

            metrics.push(MetricProfile {
                metric,
                summary,
                first: first.value,
                last: last.value,
                growth,
                span_seconds,
                rate_per_second,
            });
        }

        Ok(Self { metrics })
    }

    pub fn get(&self, metric: MemoryMetric) -> Option<&MetricProfile> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    /// Allocations not yet freed at the end of the window
    pub fn live_objects(&self) -> Option<f64> {
        let mallocs = self.get(MemoryMetric::MallocsTotal)?;
        let frees = self.get(MemoryMetric::FreesTotal)?;
        Some(mallocs.last - frees.last)
    }
}
