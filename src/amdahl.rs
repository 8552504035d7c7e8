//! Theoretical speedup from running the parallelizable steps on more workers
//!
//! Applies Amdahl's Law to the measured step means. The parallel share `p`
//! is by default the ratio of parallelizable to sequential work, which is
//! how the consumer benchmarks have always been evaluated; the textbook
//! fraction-of-total form is available through [`ParallelModel`].

use crate::error::{AnalysisError, Result};
use crate::steps::{StepMeans, StepPartition, StepRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Unit of the step durations, which fixes the scale to "per second"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    #[default]
    #[serde(alias = "ns")]
    #[value(name = "ns")]
    Nanoseconds,
    #[serde(alias = "us")]
    #[value(name = "us")]
    Microseconds,
    #[serde(alias = "ms")]
    #[value(name = "ms")]
    Milliseconds,
}

impl DurationUnit {
    /// Number of units in one second
    pub fn per_second(self) -> f64 {
        match self {
            DurationUnit::Nanoseconds => 1e9,
            DurationUnit::Microseconds => 1e6,
            DurationUnit::Milliseconds => 1e3,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DurationUnit::Nanoseconds => "ns",
            DurationUnit::Microseconds => "us",
            DurationUnit::Milliseconds => "ms",
        }
    }
}

/// How the parallel share `p` is derived from the two parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelModel {
    /// `p = parallel / sequential`
    #[default]
    RatioToSequential,
    /// `p = parallel / (parallel + sequential)`
    FractionOfTotal,
}

/// Result of applying Amdahl's Law to a set of step means
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmdahlProjection {
    pub unit: DurationUnit,
    pub model: ParallelModel,
    /// Summed mean duration of the parallelizable steps
    pub parallel_part: f64,
    /// Summed mean duration of the sequential steps
    pub sequence_part: f64,
    /// Parallel share `p` used in the speedup formula
    pub parallel_ratio: f64,
    /// Messages per second with a single worker
    pub single_worker_throughput: f64,
}

impl AmdahlProjection {
    /// Project throughput from per-step means and a parallel/sequential split
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::DivisionByZero`] when no time is spent in sequential
    ///   steps or a mean is negative
    /// * [`AnalysisError::UnboundedSpeedup`] when the ratio model yields `p >= 1`
    ///
    /// # Example
    /// ```
    /// use consumer_perf::amdahl::{AmdahlProjection, DurationUnit, ParallelModel};
    /// use consumer_perf::steps::{StepMeans, StepPartition};
    ///
    /// let means = StepMeans::new([50.0, 30.0, 20.0, 10.0, 9890.0]);
    /// let projection = AmdahlProjection::project(
    ///     &means,
    ///     &StepPartition::default(),
    ///     DurationUnit::Nanoseconds,
    ///     ParallelModel::RatioToSequential,
    /// )
    /// .unwrap();
    /// assert_eq!(projection.parallel_part, 110.0);
    /// assert_eq!(projection.single_worker_throughput, 100_000.0);
    /// ```
    pub fn project(
        means: &StepMeans,
        partition: &StepPartition,
        unit: DurationUnit,
        model: ParallelModel,
    ) -> Result<Self> {
        if let Some((step, mean)) = means.iter().find(|(_, m)| !m.is_finite() || *m < 0.0) {
            return Err(AnalysisError::DivisionByZero {
                reason: format!("mean duration of {step} is {mean}, expected a non-negative value"),
            });
        }

        let part = |role: StepRole| -> f64 {
            partition.steps_with(role).map(|step| means[step]).sum()
        };
        Self::from_parts(part(StepRole::Parallel), part(StepRole::Sequential), unit, model)
    }

    /// Project throughput from already summed parallel and sequential parts
    pub fn from_parts(
        parallel_part: f64,
        sequence_part: f64,
        unit: DurationUnit,
        model: ParallelModel,
    ) -> Result<Self> {
        if parallel_part < 0.0 || sequence_part < 0.0 {
            return Err(AnalysisError::DivisionByZero {
                reason: format!(
                    "negative duration (parallel {parallel_part}, sequential {sequence_part})"
                ),
            });
        }
        if sequence_part == 0.0 {
            return Err(AnalysisError::DivisionByZero {
                reason: "sequential part is zero".to_string(),
            });
        }

        let parallel_ratio = match model {
            ParallelModel::RatioToSequential => parallel_part / sequence_part,
            ParallelModel::FractionOfTotal => parallel_part / (parallel_part + sequence_part),
        };
        if parallel_ratio >= 1.0 {
            return Err(AnalysisError::UnboundedSpeedup {
                ratio: parallel_ratio,
            });
        }

        Ok(Self {
            unit,
            model,
            parallel_part,
            sequence_part,
            parallel_ratio,
            single_worker_throughput: unit.per_second() / (parallel_part + sequence_part),
        })
    }

    /// Projected messages per second with `workers` consumers
    pub fn throughput(&self, workers: u32) -> f64 {
        // 1 - p + p/n, arranged so a single worker divides by exactly 1.0
        let n = f64::from(workers.max(1));
        self.single_worker_throughput / (1.0 - self.parallel_ratio * (1.0 - 1.0 / n))
    }

    /// Limit of [`throughput`](Self::throughput) as workers grow without bound
    pub fn asymptote(&self) -> f64 {
        self.single_worker_throughput / (1.0 - self.parallel_ratio)
    }
}

impl fmt::Display for AmdahlProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.unit.suffix();
        writeln!(f, "Parallel:   {:.3} {}", self.parallel_part, suffix)?;
        writeln!(f, "Sequence:   {:.3} {}", self.sequence_part, suffix)?;
        writeln!(f, "Ratio:      {:.6}", self.parallel_ratio)?;
        write!(
            f,
            "Throughput for 1 worker: {:.3} per second",
            self.single_worker_throughput
        )
    }
}

/// One point of the projected throughput curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedupPoint {
    pub workers: u32,
    /// Messages per second
    pub throughput: f64,
    /// Throughput relative to a single worker
    pub speedup: f64,
}

/// Projected throughput for a contiguous range of worker counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedupCurve {
    pub points: Vec<SpeedupPoint>,
    /// Upper bound the curve approaches
    pub asymptote: f64,
}

impl SpeedupCurve {
    /// Evaluate the projection for every worker count in `workers`
    pub fn new(projection: &AmdahlProjection, workers: RangeInclusive<u32>) -> Result<Self> {
        let (start, end) = (*workers.start(), *workers.end());
        if start == 0 || start > end {
            return Err(AnalysisError::InvalidWorkerRange { start, end });
        }

        let base = projection.single_worker_throughput;
        let points = workers
            .map(|n| {
                let throughput = projection.throughput(n);
                SpeedupPoint {
                    workers: n,
                    throughput,
                    speedup: throughput / base,
                }
            })
            .collect();

        Ok(Self {
            points,
            asymptote: projection.asymptote(),
        })
    }

    pub fn at(&self, workers: u32) -> Option<&SpeedupPoint> {
        self.points.iter().find(|p| p.workers == workers)
    }

    pub fn peak(&self) -> Option<&SpeedupPoint> {
        self.points.last()
    }
}
