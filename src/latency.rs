//! End-to-end latency of consumed messages

use crate::error::Result;
use crate::stats::{summarize, StatSummary};
use crate::throughput::RateProjection;
use serde::Serialize;

/// Total processing time of one consumed message
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationSample {
    /// Broker-assigned message position
    pub offset: i64,
    pub duration_ms: f64,
}

impl DurationSample {
    pub fn new(offset: i64, duration_ms: f64) -> std::result::Result<Self, String> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(format!(
                "duration must be a non-negative number, got {duration_ms}"
            ));
        }
        Ok(Self {
            offset,
            duration_ms,
        })
    }
}

/// Latency statistics plus the throughput a single consumer sustained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyProfile {
    pub summary: StatSummary,
    /// Sum of all message durations, in seconds
    pub busy_seconds: f64,
    /// Messages per second while busy; `None` when no time was recorded
    pub measured_rate: Option<RateProjection>,
}

impl LatencyProfile {
    pub fn from_samples(samples: &[DurationSample]) -> Result<Self> {
        let durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        let summary = summarize(&durations)?;

        let busy_seconds = durations.iter().sum::<f64>() / 1e3;
        let measured_rate = (busy_seconds > 0.0)
            .then(|| RateProjection::from_per_second(summary.count as f64 / busy_seconds));

        Ok(Self {
            summary,
            busy_seconds,
            measured_rate,
        })
    }
}
