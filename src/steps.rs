//! Per-message processing steps of the consumer
//!
//! Every consumed message passes through five fixed steps. Timings are kept
//! in arrays indexed by [`Step`] instead of string-keyed maps.

use crate::amdahl::DurationUnit;
use crate::error::{AnalysisError, Result};
use crate::latency::DurationSample;
use crate::stats::{summarize, StatSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// One processing step of a consumed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "Read")]
    Read,
    #[serde(rename = "Whitelisting")]
    Whitelisting,
    #[serde(rename = "Marshalling")]
    Marshalling,
    #[serde(rename = "Time check")]
    TimeCheck,
    #[serde(rename = "DB store")]
    DbStore,
}

impl Step {
    pub const COUNT: usize = 5;

    /// All steps in processing order
    pub const ALL: [Step; Step::COUNT] = [
        Step::Read,
        Step::Whitelisting,
        Step::Marshalling,
        Step::TimeCheck,
        Step::DbStore,
    ];

    /// Column header used by the step durations log
    pub fn column_name(self) -> &'static str {
        match self {
            Step::Read => "Read",
            Step::Whitelisting => "Whitelisting",
            Step::Marshalling => "Marshalling",
            Step::TimeCheck => "Time check",
            Step::DbStore => "DB store",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Step {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Step::ALL
            .into_iter()
            .find(|step| step.column_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AnalysisError::InvalidPartition(format!("unknown step {wanted:?}")))
    }
}

/// Step timings of a single message, in the unit of the step log
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepDurationSample {
    durations: [f64; Step::COUNT],
}

impl StepDurationSample {
    /// Build a sample, rejecting negative or non-finite timings
    pub fn new(durations: [f64; Step::COUNT]) -> std::result::Result<Self, String> {
        for step in Step::ALL {
            let value = durations[step.index()];
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{step} duration must be a non-negative number, got {value}"));
            }
        }
        Ok(Self { durations })
    }

    /// Sum of all step timings
    pub fn total(&self) -> f64 {
        self.durations.iter().sum()
    }
}

impl Index<Step> for StepDurationSample {
    type Output = f64;

    fn index(&self, step: Step) -> &f64 {
        &self.durations[step.index()]
    }
}

/// Mean duration of every step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StepMeans {
    means: [f64; Step::COUNT],
}

impl StepMeans {
    /// Build means directly, e.g. from a previously computed table
    pub fn new(means: [f64; Step::COUNT]) -> Self {
        Self { means }
    }

    /// Compute means over all samples
    pub fn from_samples(samples: &[StepDurationSample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyInput { what: "step means" });
        }

        let mut means = [0.0; Step::COUNT];
        for sample in samples {
            for (acc, value) in means.iter_mut().zip(sample.durations.iter()) {
                *acc += value;
            }
        }
        let n = samples.len() as f64;
        for mean in &mut means {
            *mean /= n;
        }
        Ok(Self { means })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Step, f64)> + '_ {
        Step::ALL.into_iter().map(|step| (step, self.means[step.index()]))
    }

    pub fn total(&self) -> f64 {
        self.means.iter().sum()
    }
}

impl Index<Step> for StepMeans {
    type Output = f64;

    fn index(&self, step: Step) -> &f64 {
        &self.means[step.index()]
    }
}

/// Whether a step can be spread over several workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Parallel,
    Sequential,
}

/// Assignment of every step to exactly one role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPartition {
    roles: [StepRole; Step::COUNT],
}

impl Default for StepPartition {
    /// Read, whitelisting, marshalling and time check run independently per
    /// message; the database store is serialized.
    fn default() -> Self {
        let mut roles = [StepRole::Parallel; Step::COUNT];
        roles[Step::DbStore.index()] = StepRole::Sequential;
        Self { roles }
    }
}

impl StepPartition {
    /// Build a partition, requiring each step in exactly one of the two sets
    ///
    /// # Example
    /// ```
    /// use consumer_perf::steps::{Step, StepPartition};
    ///
    /// let partition = StepPartition::new(
    ///     &[Step::Read, Step::Whitelisting, Step::Marshalling, Step::TimeCheck],
    ///     &[Step::DbStore],
    /// )
    /// .unwrap();
    /// assert_eq!(partition, StepPartition::default());
    /// ```
    pub fn new(parallel: &[Step], sequential: &[Step]) -> Result<Self> {
        let mut roles: [Option<StepRole>; Step::COUNT] = [None; Step::COUNT];

        let assignments = parallel
            .iter()
            .map(|s| (*s, StepRole::Parallel))
            .chain(sequential.iter().map(|s| (*s, StepRole::Sequential)));
        for (step, role) in assignments {
            if roles[step.index()].replace(role).is_some() {
                return Err(AnalysisError::InvalidPartition(format!(
                    "step {step} is listed more than once"
                )));
            }
        }

        let mut resolved = [StepRole::Parallel; Step::COUNT];
        for step in Step::ALL {
            resolved[step.index()] = roles[step.index()].ok_or_else(|| {
                AnalysisError::InvalidPartition(format!("step {step} is not assigned"))
            })?;
        }
        Ok(Self { roles: resolved })
    }

    pub fn role(&self, step: Step) -> StepRole {
        self.roles[step.index()]
    }

    pub fn steps_with(&self, role: StepRole) -> impl Iterator<Item = Step> + '_ {
        Step::ALL.into_iter().filter(move |s| self.role(*s) == role)
    }
}

/// Statistics and relative weight of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepShare {
    pub step: Step,
    pub role: StepRole,
    pub unit: DurationUnit,
    pub summary: StatSummary,
    /// Share of the summed step means, in percent
    pub percentage: f64,
}

impl fmt::Display for StepShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2}% (mean {:.1} {}, {} samples)",
            self.step,
            self.percentage,
            self.summary.mean,
            self.unit.suffix(),
            self.summary.count
        )
    }
}

/// Per-step breakdown sorted by share, largest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepBreakdown {
    pub means: StepMeans,
    pub shares: Vec<StepShare>,
}

impl StepBreakdown {
    pub fn from_samples(
        samples: &[StepDurationSample],
        partition: &StepPartition,
        unit: DurationUnit,
    ) -> Result<Self> {
        let means = StepMeans::from_samples(samples)?;
        let total = means.total();

        let mut shares = Vec::with_capacity(Step::COUNT);
        for step in Step::ALL {
            let column: Vec<f64> = samples.iter().map(|s| s[step]).collect();
            let summary = summarize(&column)?;
            let percentage = if total > 0.0 {
                means[step] / total * 100.0
            } else {
                0.0
            };
            shares.push(StepShare {
                step,
                role: partition.role(step),
                unit,
                summary,
                percentage,
            });
        }
        // Stable sort keeps processing order for equal shares
        shares.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

        Ok(Self { means, shares })
    }
}

/// Count messages whose step timings exceed the measured total duration
///
/// Samples are paired by position (both logs are in arrival order); extra
/// records on either side are ignored. Step timings are in `unit` and
/// message durations in milliseconds. `tolerance` is relative, so 0.05
/// accepts step sums up to 5% above the total.
pub fn consistency_violations(
    durations: &[DurationSample],
    steps: &[StepDurationSample],
    unit: DurationUnit,
    tolerance: f64,
) -> usize {
    let to_ms = 1e3 / unit.per_second();
    durations
        .iter()
        .zip(steps)
        .filter(|(total, steps)| steps.total() * to_ms > total.duration_ms * (1.0 + tolerance))
        .count()
}
