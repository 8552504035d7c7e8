//! CLI argument parsing for consumer-perf

use crate::amdahl::DurationUnit;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    Text,
    /// JSON format for machine parsing and plotting
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "consumer-perf")]
#[command(version)]
#[command(about = "Analyze message consumer benchmark logs", long_about = None)]
pub struct Cli {
    /// Per-message durations log (Offset,Duration in ms)
    #[arg(short = 'd', long = "durations", value_name = "FILE")]
    pub durations: Option<PathBuf>,

    /// Per-step durations log (Read,Whitelisting,Marshalling,Time check,DB store)
    #[arg(short = 's', long = "steps", value_name = "FILE")]
    pub steps: Option<PathBuf>,

    /// Upload timestamps log, one date-time per row
    #[arg(short = 'u', long = "uploads", value_name = "FILE")]
    pub uploads: Option<PathBuf>,

    /// Memory consumption log (timestamp plus Go runtime metric columns)
    #[arg(short = 'm', long = "memory", value_name = "FILE")]
    pub memory: Option<PathBuf>,

    /// Analysis configuration (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Largest worker count of the speedup projection
    #[arg(long = "max-workers", value_name = "N")]
    pub max_workers: Option<u32>,

    /// Worker count whose projected throughput is compared with the uploads
    #[arg(long = "deployed-workers", value_name = "N")]
    pub deployed_workers: Option<u32>,

    /// Unit of the step durations log
    #[arg(long = "step-unit", value_enum, value_name = "UNIT")]
    pub step_unit: Option<DurationUnit>,

    /// Skip malformed rows instead of aborting
    #[arg(long = "skip-malformed")]
    pub skip_malformed: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Whether at least one input log was given
    pub fn has_inputs(&self) -> bool {
        self.durations.is_some()
            || self.steps.is_some()
            || self.uploads.is_some()
            || self.memory.is_some()
    }
}
