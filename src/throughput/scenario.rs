// Average/best/worst throughput scenarios
//
// Best is the busiest bucket, worst the quietest: the scenarios describe how
// much load the consumer has to absorb at peak and at idle.

use super::buckets::BucketSeries;
use crate::error::{AnalysisError, Result};
use serde::Serialize;
use std::fmt;

/// A per-second rate extrapolated to longer periods
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateProjection {
    pub per_second: f64,
    pub per_minute: f64,
    pub per_hour: f64,
    pub per_day: f64,
}

impl RateProjection {
    pub fn from_per_second(per_second: f64) -> Self {
        let per_minute = per_second * 60.0;
        let per_hour = per_minute * 60.0;
        Self {
            per_second,
            per_minute,
            per_hour,
            per_day: per_hour * 24.0,
        }
    }
}

impl fmt::Display for RateProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Per second  {:.0}", self.per_second)?;
        writeln!(f, "Per minute  {:.0}", self.per_minute)?;
        writeln!(f, "Per hour    {:.0}", self.per_hour)?;
        write!(f, "Per day     {:.0}", self.per_day)
    }
}

/// Observed events per bucket compared with the theoretical capacity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scenario {
    pub observed: f64,
    /// `observed / theoretical`; above 1.0 the consumer cannot keep up
    pub ratio: f64,
}

/// Scenario classification of a bucket count series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Capacity per bucket the scenarios are compared against
    pub theoretical_peak: f64,
    /// Number of buckets classified
    pub buckets: usize,
    pub average: Scenario,
    pub best: Scenario,
    pub worst: Scenario,
}

impl ScenarioReport {
    /// Whether the consumer keeps up even in the busiest bucket
    pub fn within_capacity(&self) -> bool {
        self.best.ratio <= 1.0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = |f: &mut fmt::Formatter<'_>, name: &str, s: &Scenario| {
            writeln!(
                f,
                "{:<18}{:>12.2} {:>12.2} {:>8.2}%",
                name,
                self.theoretical_peak,
                s.observed,
                s.ratio * 100.0
            )
        };
        line(f, "Average scenario:", &self.average)?;
        line(f, "Best scenario:", &self.best)?;
        line(f, "Worst scenario:", &self.worst)
    }
}

/// Classify per-bucket counts against a theoretical per-bucket capacity
///
/// # Errors
///
/// * [`AnalysisError::EmptyInput`] for an empty series
/// * [`AnalysisError::DivisionByZero`] when `theoretical_peak` is not a
///   positive number
pub fn classify(counts: &[u64], theoretical_peak: f64) -> Result<ScenarioReport> {
    if counts.is_empty() {
        return Err(AnalysisError::EmptyInput {
            what: "throughput scenarios",
        });
    }
    if !theoretical_peak.is_finite() || theoretical_peak <= 0.0 {
        return Err(AnalysisError::DivisionByZero {
            reason: format!("theoretical peak must be positive, got {theoretical_peak}"),
        });
    }

    let scenario = |observed: f64| Scenario {
        observed,
        ratio: observed / theoretical_peak,
    };

    let average = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
    let best = counts.iter().copied().max().unwrap_or_default() as f64;
    let worst = counts.iter().copied().min().unwrap_or_default() as f64;

    Ok(ScenarioReport {
        theoretical_peak,
        buckets: counts.len(),
        average: scenario(average),
        best: scenario(best),
        worst: scenario(worst),
    })
}

/// Classify a resampled series against a capacity given per second
///
/// The capacity is scaled to the series' bucket width. With `exclude_tail`
/// the last, usually partial, bucket is left out.
pub fn classify_series(
    series: &BucketSeries,
    theoretical_per_second: f64,
    exclude_tail: bool,
) -> Result<ScenarioReport> {
    let buckets = if exclude_tail {
        series.without_partial_tail()
    } else {
        &series.buckets[..]
    };
    let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
    classify(
        &counts,
        theoretical_per_second * series.width.seconds() as f64,
    )
}
