// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by every benchmark driver.

use crate::timing::CaptureError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running or aggregating benchmark commands.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The executable of a command could not be resolved on the search path.
    #[error("command {name:?} not found: {program:?} is not an executable on PATH")]
    CommandNotFound { name: String, program: String },

    /// The command ran but its timing output could not be parsed.
    #[error("command {name:?} failed: {source}")]
    CommandFailed {
        name: String,
        #[source]
        source: CaptureError,
    },

    /// A setup, cleanup or precondition command exited unsuccessfully.
    #[error("command {name:?} exited with status {}", status_label(.code))]
    NonZeroExit { name: String, code: Option<i32> },

    /// Dropping the page cache requires privileges this process lacks.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A measurement does not carry the dimensions already stored for its command.
    #[error("dimension mismatch for {name:?}: series has {expected:?}, measurement has {actual:?}")]
    AggregationMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// The watchdog killed a command that ran past its timeout.
    #[error("command {name:?} timed out after {timeout:?}")]
    TimedOut { name: String, timeout: Duration },

    /// The command could not be launched at all.
    #[error("failed to launch {name:?}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Filesystem error while redirecting or reading process output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    /// Whether this error stems from unparseable timing output of a single run.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, HarnessError::CommandFailed { .. })
    }
}

fn status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<killed by signal>".to_string(),
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
