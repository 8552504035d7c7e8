//! consumer-perf - Latency, throughput and speedup analysis for message consumers
//!
//! This library turns the logs captured while benchmarking a message consumer
//! into descriptive statistics, per-step latency breakdowns, an Amdahl's Law
//! projection of multi-worker throughput, and ingestion throughput resampled
//! over time.

pub mod amdahl;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod latency;
pub mod memory;
pub mod report;
pub mod stats;
pub mod steps;
pub mod throughput;

pub use error::{AnalysisError, Result};
