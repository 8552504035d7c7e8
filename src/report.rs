//! Analysis report: runs every analysis the inputs allow and renders it
//!
//! Sections whose input log was not supplied are left out. The scenario
//! comparison needs both upload timestamps and step durations, since the
//! theoretical peak comes from the Amdahl projection.

use crate::amdahl::{AmdahlProjection, SpeedupCurve};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::latency::{DurationSample, LatencyProfile};
use crate::memory::{MemoryProfile, MemorySample};
use crate::stats::StatSummary;
use crate::steps::{consistency_violations, StepBreakdown, StepDurationSample, StepRole};
use crate::throughput::{classify_series, resample, BucketSeries, BucketWidth, ScenarioReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Rows dropped from each input log while loading it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SkippedRecords {
    pub durations: usize,
    pub steps: usize,
    pub uploads: usize,
    pub memory: usize,
}

impl SkippedRecords {
    pub fn total(&self) -> usize {
        self.durations + self.steps + self.uploads + self.memory
    }
}

/// Raw samples of one analysis run
#[derive(Debug, Clone, Default)]
pub struct AnalysisInputs {
    pub durations: Option<Vec<DurationSample>>,
    pub steps: Option<Vec<StepDurationSample>>,
    pub uploads: Option<Vec<DateTime<Utc>>>,
    pub memory: Option<Vec<MemorySample>>,
    pub skipped: SkippedRecords,
}

impl AnalysisInputs {
    pub fn is_empty(&self) -> bool {
        self.durations.is_none()
            && self.steps.is_none()
            && self.uploads.is_none()
            && self.memory.is_none()
    }
}

/// Step breakdown and the speedup it allows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepAnalysis {
    pub breakdown: StepBreakdown,
    pub projection: AmdahlProjection,
    pub curve: SpeedupCurve,
    pub deployed_workers: u32,
    /// Projected messages per second at `deployed_workers`
    pub deployed_throughput: f64,
    /// Messages whose step timings exceed their total duration; only known
    /// when the duration log was supplied too
    pub consistency_violations: Option<usize>,
}

/// Upload counts at one bucket width
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampledThroughput {
    pub series: BucketSeries,
    pub summary: StatSummary,
    /// Whether the last bucket was left out of `summary`
    pub tail_excluded: bool,
}

/// Upload throughput over time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputAnalysis {
    pub events: usize,
    pub resampled: Vec<ResampledThroughput>,
    pub scenario_width: BucketWidth,
    pub scenarios: Option<ScenarioReport>,
}

/// Everything computed for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub latency: Option<LatencyProfile>,
    pub steps: Option<StepAnalysis>,
    pub throughput: Option<ThroughputAnalysis>,
    pub memory: Option<MemoryProfile>,
    /// Malformed rows left out of the analysis
    pub skipped: SkippedRecords,
}

impl AnalysisReport {
    /// Run every analysis the inputs allow
    ///
    /// Building twice from the same inputs gives equal reports.
    pub fn build(inputs: &AnalysisInputs, config: &AnalysisConfig) -> Result<Self> {
        let latency = inputs
            .durations
            .as_deref()
            .map(LatencyProfile::from_samples)
            .transpose()?;

        let steps = inputs
            .steps
            .as_deref()
            .map(|samples| analyze_steps(samples, inputs.durations.as_deref(), config))
            .transpose()?;

        let throughput = inputs
            .uploads
            .as_deref()
            .map(|uploads| {
                let peak = steps.as_ref().map(|s| s.deployed_throughput);
                analyze_throughput(uploads, peak, config)
            })
            .transpose()?;

        let memory = inputs
            .memory
            .as_deref()
            .map(MemoryProfile::from_samples)
            .transpose()?;

        Ok(Self {
            latency,
            steps,
            throughput,
            memory,
            skipped: inputs.skipped,
        })
    }

    /// Pretty-printed JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn analyze_steps(
    samples: &[StepDurationSample],
    durations: Option<&[DurationSample]>,
    config: &AnalysisConfig,
) -> Result<StepAnalysis> {
    let partition = config.partition()?;
    let breakdown = StepBreakdown::from_samples(samples, &partition, config.step_unit)?;
    let projection = AmdahlProjection::project(
        &breakdown.means,
        &partition,
        config.step_unit,
        config.parallel_model,
    )?;
    let curve = SpeedupCurve::new(&projection, 1..=config.max_workers)?;
    debug!(
        parallel_ratio = projection.parallel_ratio,
        single_worker = projection.single_worker_throughput,
        "projected speedup"
    );

    let violations = durations.map(|d| {
        consistency_violations(d, samples, config.step_unit, config.consistency_tolerance)
    });
    if let Some(count) = violations.filter(|c| *c > 0) {
        warn!(
            count,
            tolerance = config.consistency_tolerance,
            "step timings exceed total message duration"
        );
    }

    Ok(StepAnalysis {
        breakdown,
        deployed_workers: config.deployed_workers,
        deployed_throughput: projection.throughput(config.deployed_workers),
        projection,
        curve,
        consistency_violations: violations,
    })
}

fn analyze_throughput(
    uploads: &[DateTime<Utc>],
    theoretical_per_second: Option<f64>,
    config: &AnalysisConfig,
) -> Result<ThroughputAnalysis> {
    let mut resampled = Vec::with_capacity(config.bucket_widths.len());
    for &width in &config.bucket_widths {
        let series = resample(uploads, width);
        if series.is_empty() {
            continue;
        }
        // A lone bucket is kept even when it is partial
        let tail_excluded = config.exclude_partial_tail && series.len() > 1;
        let summary = series.summary(tail_excluded)?;
        debug!(%width, buckets = series.len(), "resampled uploads");
        resampled.push(ResampledThroughput {
            series,
            summary,
            tail_excluded,
        });
    }

    let scenarios = match theoretical_per_second {
        Some(peak) if !uploads.is_empty() => {
            let reused = resampled
                .iter()
                .find(|r| r.series.width == config.scenario_width)
                .map(|r| &r.series);
            let owned;
            let series = match reused {
                Some(series) => series,
                None => {
                    owned = resample(uploads, config.scenario_width);
                    &owned
                }
            };
            let exclude = config.exclude_partial_tail && series.len() > 1;
            Some(classify_series(series, peak, exclude)?)
        }
        _ => None,
    };

    Ok(ThroughputAnalysis {
        events: uploads.len(),
        resampled,
        scenario_width: config.scenario_width,
        scenarios,
    })
}

fn write_summary(f: &mut fmt::Formatter<'_>, summary: &StatSummary, unit: &str) -> fmt::Result {
    writeln!(f, "count  {:>16}", summary.count)?;
    writeln!(f, "mean   {:>16.3} {}", summary.mean, unit)?;
    writeln!(f, "std    {:>16.3} {}", summary.std, unit)?;
    writeln!(f, "min    {:>16.3} {}", summary.min, unit)?;
    writeln!(f, "25%    {:>16.3} {}", summary.quantiles.p25, unit)?;
    writeln!(f, "50%    {:>16.3} {}", summary.quantiles.p50, unit)?;
    writeln!(f, "75%    {:>16.3} {}", summary.quantiles.p75, unit)?;
    writeln!(f, "max    {:>16.3} {}", summary.max, unit)
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(latency) = &self.latency {
            writeln!(f, "=== Message Durations ===\n")?;
            write_summary(f, &latency.summary, "ms")?;
            writeln!(f, "\nBusy time: {:.3} s", latency.busy_seconds)?;
            if let Some(rate) = &latency.measured_rate {
                writeln!(f, "Measured consumer throughput:\n{}", rate)?;
            }
            writeln!(f)?;
        }

        if let Some(steps) = &self.steps {
            let unit = steps.projection.unit.suffix();
            writeln!(f, "=== Step Durations ({}) ===\n", unit)?;
            writeln!(
                f,
                "{:<14} {:<11} {:>12} {:>12} {:>12} {:>12} {:>8}",
                "step", "role", "mean", "std", "50%", "max", "share"
            )?;
            writeln!(f, "{}", "-".repeat(87))?;
            for share in &steps.breakdown.shares {
                let role = match share.role {
                    StepRole::Parallel => "parallel",
                    StepRole::Sequential => "sequential",
                };
                writeln!(
                    f,
                    "{:<14} {:<11} {:>12.1} {:>12.1} {:>12.1} {:>12.1} {:>7.2}%",
                    share.step.column_name(),
                    role,
                    share.summary.mean,
                    share.summary.std,
                    share.summary.quantiles.p50,
                    share.summary.max,
                    share.percentage
                )?;
            }
            writeln!(f, "\n{}\n", steps.projection)?;

            writeln!(f, "{:>7} {:>16} {:>9}", "workers", "throughput/s", "speedup")?;
            for point in &steps.curve.points {
                writeln!(
                    f,
                    "{:>7} {:>16.3} {:>8.4}x",
                    point.workers, point.throughput, point.speedup
                )?;
            }
            writeln!(f, "Asymptotic throughput: {:.3} per second", steps.curve.asymptote)?;
            if let Some(violations) = steps.consistency_violations {
                writeln!(
                    f,
                    "Messages with step time above total duration: {}",
                    violations
                )?;
            }
            writeln!(f)?;
        }

        if let Some(throughput) = &self.throughput {
            writeln!(f, "=== Upload Throughput ({} events) ===\n", throughput.events)?;
            writeln!(
                f,
                "{:<7} {:>9} {:>12} {:>12} {:>10} {:>10}  busiest",
                "per", "buckets", "mean", "std", "min", "max"
            )?;
            for r in &throughput.resampled {
                let busiest = r
                    .series
                    .busiest()
                    .map(|b| b.start.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                writeln!(
                    f,
                    "{:<7} {:>9} {:>12.3} {:>12.3} {:>10} {:>10}  {}{}",
                    r.series.width.to_string(),
                    r.series.len(),
                    r.summary.mean,
                    r.summary.std,
                    r.summary.min,
                    r.summary.max,
                    busiest,
                    if r.tail_excluded { " (last bucket excluded)" } else { "" }
                )?;
            }
            if let Some(scenarios) = &throughput.scenarios {
                writeln!(
                    f,
                    "\nScenarios per {} (theoretical, observed, load):",
                    throughput.scenario_width
                )?;
                write!(f, "{}", scenarios)?;
                if !scenarios.within_capacity() {
                    writeln!(f, "Busiest bucket exceeds projected capacity")?;
                }
            }
            writeln!(f)?;
        }

        if let Some(memory) = &self.memory {
            writeln!(f, "=== Memory Consumption ===\n")?;
            writeln!(
                f,
                "{:<30} {:>7} {:>16} {:>16} {:>16} {:>14}",
                "metric", "count", "mean", "max", "growth", "rate/s"
            )?;
            for m in &memory.metrics {
                let rate = m
                    .rate_per_second
                    .map(|r| format!("{:.3}", r))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "{:<30} {:>7} {:>16.3} {:>16.3} {:>16.3} {:>14}",
                    m.metric.name(),
                    m.summary.count,
                    m.summary.mean,
                    m.summary.max,
                    m.growth,
                    rate
                )?;
            }
            if let Some(live) = memory.live_objects() {
                writeln!(f, "Live objects at end of window: {:.0}", live)?;
            }
        }

        if self.skipped.total() > 0 {
            writeln!(
                f,
                "\nSkipped malformed rows: durations {}, steps {}, uploads {}, memory {}",
                self.skipped.durations,
                self.skipped.steps,
                self.skipped.uploads,
                self.skipped.memory
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amdahl::DurationUnit;
    use crate::error::AnalysisError;
    use crate::memory::MemoryMetric;
    use chrono::{TimeDelta, TimeZone};

    fn step_samples() -> Vec<StepDurationSample> {
        (0..10)
            .map(|_| StepDurationSample::new([50.0, 30.0, 20.0, 10.0, 9890.0]).unwrap())
            .collect()
    }

    fn durations() -> Vec<DurationSample> {
        (0..10)
            .map(|i| DurationSample::new(i, 0.01).unwrap())
            .collect()
    }

    fn uploads() -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2020, 4, 1, 8, 0, 0).unwrap();
        (0..600)
            .map(|i| start + TimeDelta::milliseconds(i * 250))
            .collect()
    }

    fn full_inputs() -> AnalysisInputs {
        AnalysisInputs {
            durations: Some(durations()),
            steps: Some(step_samples()),
            uploads: Some(uploads()),
            memory: Some(vec![MemorySample {
                timestamp: Utc.with_ymd_and_hms(2020, 4, 1, 8, 0, 0).unwrap(),
                metric: MemoryMetric::AllocBytes,
                value: 1024.0,
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_inputs_give_empty_report() {
        let inputs = AnalysisInputs::default();
        assert!(inputs.is_empty());
        let report = AnalysisReport::build(&inputs, &AnalysisConfig::default()).unwrap();
        assert!(report.latency.is_none());
        assert!(report.steps.is_none());
        assert!(report.throughput.is_none());
        assert!(report.memory.is_none());
    }

    #[test]
    fn test_full_report() {
        let report = AnalysisReport::build(&full_inputs(), &AnalysisConfig::default()).unwrap();

        let steps = report.steps.as_ref().unwrap();
        assert_eq!(steps.projection.single_worker_throughput, 100_000.0);
        assert_eq!(steps.curve.points.len(), 31);
        assert_eq!(steps.deployed_throughput, 100_000.0);
        // 10 us of steps inside 10 us messages
        assert_eq!(steps.consistency_violations, Some(0));

        let throughput = report.throughput.as_ref().unwrap();
        assert_eq!(throughput.events, 600);
        assert_eq!(throughput.resampled.len(), 4);

        // 4 uploads per second over 150 seconds
        let scenarios = throughput.scenarios.unwrap();
        assert_eq!(scenarios.buckets, 149);
        assert_eq!(scenarios.best.observed, 4.0);
        assert_eq!(scenarios.worst.observed, 4.0);
        assert_eq!(scenarios.theoretical_peak, 100_000.0);
        assert!(scenarios.within_capacity());

        assert_eq!(report.memory.as_ref().unwrap().metrics.len(), 1);
    }

    #[test]
    fn test_single_bucket_keeps_tail() {
        let report = AnalysisReport::build(&full_inputs(), &AnalysisConfig::default()).unwrap();
        let throughput = report.throughput.unwrap();
        let daily = throughput
            .resampled
            .iter()
            .find(|r| r.series.width == BucketWidth::Day)
            .unwrap();
        assert!(!daily.tail_excluded);
        assert_eq!(daily.summary.count, 1);
        assert_eq!(daily.summary.mean, 600.0);
    }

    #[test]
    fn test_scenarios_need_step_projection() {
        let inputs = AnalysisInputs {
            uploads: Some(uploads()),
            ..Default::default()
        };
        let report = AnalysisReport::build(&inputs, &AnalysisConfig::default()).unwrap();
        assert!(report.throughput.unwrap().scenarios.is_none());
    }

    #[test]
    fn test_scenario_width_outside_bucket_widths() {
        let config = AnalysisConfig {
            bucket_widths: vec![BucketWidth::Hour],
            scenario_width: BucketWidth::Minute,
            ..Default::default()
        };
        let report = AnalysisReport::build(&full_inputs(), &config).unwrap();
        let throughput = report.throughput.unwrap();
        assert_eq!(throughput.resampled.len(), 1);
        let scenarios = throughput.scenarios.unwrap();
        assert_eq!(scenarios.theoretical_peak, 6_000_000.0);
        assert_eq!(scenarios.buckets, 2);
    }

    #[test]
    fn test_empty_durations_fail() {
        let inputs = AnalysisInputs {
            durations: Some(Vec::new()),
            ..Default::default()
        };
        let err = AnalysisReport::build(&inputs, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput { .. }));
    }

    #[test]
    fn test_consistency_check_uses_step_unit() {
        let inputs = AnalysisInputs {
            durations: Some(vec![DurationSample::new(0, 1.0).unwrap()]),
            steps: Some(vec![StepDurationSample::new([0.1, 0.1, 0.1, 0.1, 5.0]).unwrap()]),
            ..Default::default()
        };
        let config = AnalysisConfig {
            step_unit: DurationUnit::Milliseconds,
            ..Default::default()
        };
        let report = AnalysisReport::build(&inputs, &config).unwrap();
        let steps = report.steps.unwrap();
        assert_eq!(steps.consistency_violations, Some(1));
        assert_eq!(steps.breakdown.shares[0].unit, DurationUnit::Milliseconds);
    }

    #[test]
    fn test_skipped_rows_reach_the_report() {
        let inputs = AnalysisInputs {
            durations: Some(durations()),
            skipped: SkippedRecords {
                durations: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let report = AnalysisReport::build(&inputs, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.skipped.total(), 2);
        assert!(report
            .to_string()
            .contains("Skipped malformed rows: durations 2, steps 0, uploads 0, memory 0"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["skipped"]["durations"], 2);
    }

    #[test]
    fn test_build_is_idempotent() {
        let inputs = full_inputs();
        let config = AnalysisConfig::default();
        let first = AnalysisReport::build(&inputs, &config).unwrap();
        let second = AnalysisReport::build(&inputs, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_text_rendering() {
        let report = AnalysisReport::build(&full_inputs(), &AnalysisConfig::default()).unwrap();
        let text = report.to_string();
        assert!(text.contains("=== Message Durations ==="));
        assert!(text.contains("=== Step Durations (ns) ==="));
        assert!(text.contains("DB store"));
        assert!(text.contains("Throughput for 1 worker: 100000.000 per second"));
        assert!(text.contains("=== Upload Throughput (600 events) ==="));
        assert!(text.contains("Average scenario:"));
        assert!(text.contains("go_memstats_alloc_bytes"));
    }

    #[test]
    fn test_json_rendering() {
        let report = AnalysisReport::build(&full_inputs(), &AnalysisConfig::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(
            json["steps"]["projection"]["single_worker_throughput"],
            100_000.0
        );
        assert_eq!(json["steps"]["curve"]["points"][0]["workers"], 1);
        assert_eq!(
            json["throughput"]["resampled"][0]["series"]["buckets"][0]["start"],
            "2020-04-01T00:00:00Z"
        );
        assert_eq!(json["memory"]["metrics"][0]["metric"], "go_memstats_alloc_bytes");
    }
}
