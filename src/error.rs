//! Error type shared by the analysis core and the ingestion layer

use thiserror::Error;

/// Errors raised while loading or analyzing benchmark logs
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Empty input: cannot compute {what} over zero samples")]
    EmptyInput { what: &'static str },

    #[error("Non-finite sample at index {index}: {value}")]
    NonFiniteSample { index: usize, value: f64 },

    #[error("Division by zero: {reason}")]
    DivisionByZero { reason: String },

    #[error("Unbounded speedup: parallel ratio {ratio} must be below 1.0")]
    UnboundedSpeedup { ratio: f64 },

    #[error("Invalid step partition: {0}")]
    InvalidPartition(String),

    #[error("Invalid worker range {start}..={end}: worker counts start at 1")]
    InvalidWorkerRange { start: u32, end: u32 },

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Unparseable timestamp at line {line}: {value:?}")]
    UnparseableTimestamp { line: u64, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Whether a row-level skip policy may drop the offending record
    pub fn is_skippable(&self) -> bool {
        matches!(self, AnalysisError::MalformedRecord { .. })
    }
}
