//! Error types for benchmark runs and report output.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use xsbench_core::HarnessError;

/// Errors raised by runners, suites and report writers.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Command, timing or aggregation failure
    #[error(transparent)]
    Harness(#[from] HarnessError),

    /// Iteration count must be positive
    #[error("iterations must be a positive integer, got {0}")]
    InvalidIterations(usize),

    /// A path argument does not exist or has the wrong type
    #[error("{path:?} {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// A benchmark config file could not be used
    #[error("invalid config {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// No config file was found in the given locations
    #[error("no valid config files found")]
    NoValidConfig,

    /// Layered harness settings could not be loaded
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Benchmark name filter is not a valid regex
    #[error("invalid filter: {0}")]
    Filter(#[from] regex::Error),

    /// Unknown output format
    #[error("unknown format {0:?}, choose from [json, csv, markdown]")]
    UnknownFormat(String),

    /// Sample data download failed
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BenchError {
    /// Shorthand for [`BenchError::InvalidPath`].
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BenchError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;
