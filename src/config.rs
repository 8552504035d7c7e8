// Configuration for a benchmark analysis run
//
// Every field has a default matching how the consumer benchmarks were
// captured: step timings in nanoseconds, DB store as the only sequential
// step, projections up to 31 workers.

use crate::amdahl::{DurationUnit, ParallelModel};
use crate::ingest::RecordPolicy;
use crate::steps::{Step, StepPartition};
use crate::throughput::BucketWidth;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for [`AnalysisReport::build`](crate::report::AnalysisReport::build)
///
/// # Example
/// ```
/// use consumer_perf::config::AnalysisConfig;
///
/// let config = AnalysisConfig::from_toml_str("max_workers = 8").unwrap();
/// assert_eq!(config.max_workers, 8);
/// assert_eq!(config.deployed_workers, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Unit of the step durations log
    pub step_unit: DurationUnit,

    /// How the parallel share is derived for Amdahl's Law
    pub parallel_model: ParallelModel,

    /// Steps that can run on any number of workers
    pub parallel_steps: Vec<Step>,

    /// Steps that stay serialized regardless of worker count
    pub sequential_steps: Vec<Step>,

    /// Largest worker count of the projected speedup curve
    pub max_workers: u32,

    /// Worker count whose projected throughput is the theoretical peak
    /// for the scenario comparison
    pub deployed_workers: u32,

    /// Widths the upload log is resampled at
    pub bucket_widths: Vec<BucketWidth>,

    /// Width used for average/best/worst scenarios
    pub scenario_width: BucketWidth,

    /// Leave the last, usually partial, bucket out of scenarios
    pub exclude_partial_tail: bool,

    /// Handling of malformed rows in the input logs
    pub record_policy: RecordPolicy,

    /// Relative slack when checking that step timings fit in the message
    /// duration (0.05 = 5%)
    pub consistency_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            step_unit: DurationUnit::Nanoseconds,
            parallel_model: ParallelModel::RatioToSequential,
            parallel_steps: vec![
                Step::Read,
                Step::Whitelisting,
                Step::Marshalling,
                Step::TimeCheck,
            ],
            sequential_steps: vec![Step::DbStore],
            max_workers: 31,
            deployed_workers: 1,
            bucket_widths: BucketWidth::ALL.to_vec(),
            scenario_width: BucketWidth::Second,
            exclude_partial_tail: true,
            record_policy: RecordPolicy::Abort,
            consistency_tolerance: 0.05,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Step partition described by `parallel_steps` and `sequential_steps`
    pub fn partition(&self) -> crate::error::Result<StepPartition> {
        StepPartition::new(&self.parallel_steps, &self.sequential_steps)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers < 1 {
            return Err(format!(
                "max_workers must be >= 1, got {}",
                self.max_workers
            ));
        }

        if self.deployed_workers < 1 || self.deployed_workers > self.max_workers {
            return Err(format!(
                "deployed_workers must be in 1..={}, got {}",
                self.max_workers, self.deployed_workers
            ));
        }

        if !self.consistency_tolerance.is_finite() || self.consistency_tolerance < 0.0 {
            return Err(format!(
                "consistency_tolerance must be non-negative, got {}",
                self.consistency_tolerance
            ));
        }

        if self.bucket_widths.is_empty() {
            return Err("bucket_widths must name at least one width".to_string());
        }

        self.partition().map_err(|e| e.to_string())?;
        Ok(())
    }
}
