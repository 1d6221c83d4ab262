// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Timing capture.
//!
//! A [`TimingCapture`] decides how a command is launched and how the text its
//! diagnostic stream produced becomes a [`RunMeasurement`]. Two variants
//! exist:
//!
//! - [`GnuTime`] wraps the invocation with `/usr/bin/time -f "%e\t%U\t%S"` and
//!   reads the wall, user and system seconds from the last stderr line.
//! - [`StructuredTiming`] expects the invocation itself to print an
//!   InlineBench JSON payload on stderr:
//!
//! ```text
//! {"CPU":  {"<task>": {"<thread>": {"time": <ns>}, ...}, ...},
//!  "Wall": {"<task>": {"<thread>": {"time": <ns>}, ...}, ...}}
//! ```
//!
//!   Thread records of one task are averaged into one value per
//!   `<clock>/<task>` dimension.

use crate::command::Invocation;
use crate::measurement::{RunMeasurement, SYS, USR, WALL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default GNU time invocation prefix.
pub const GNU_TIME_PROGRAM: [&str; 3] = ["/usr/bin/time", "-f", "%e\t%U\t%S"];

/// Clock names accepted in structured payloads.
pub const STRUCTURED_CLOCKS: [&str; 2] = ["CPU", "Wall"];

/// Reasons a captured diagnostic stream could not be parsed.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Nothing was written to the diagnostic stream
    #[error("no timing output captured")]
    Empty,

    /// The timer line does not have three tab-separated fields
    #[error("malformed timing line {0:?}")]
    MalformedLine(String),

    /// A timer field is not a finite number
    #[error("invalid {field} time {value:?}")]
    InvalidNumber { field: String, value: String },

    /// The structured payload is not valid JSON
    #[error("invalid timing JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The structured payload is JSON but not shaped as expected
    #[error("unexpected timing payload: {0}")]
    UnexpectedShape(String),
}

/// What the runner does when one run's output cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and continue with the next run.
    Skip,
    /// Abort the enclosing benchmark.
    Abort,
}

/// The timing mechanism a benchmark uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// External GNU time wrapper
    #[serde(rename = "GNU time")]
    GnuTime,
    /// Structured JSON emitted by an InlineBench-instrumented binary
    #[serde(rename = "InlineBench")]
    InlineBench,
}

impl TimerKind {
    /// Unit of the measured values.
    pub fn unit(&self) -> &'static str {
        match self {
            TimerKind::GnuTime => "s",
            TimerKind::InlineBench => "ns",
        }
    }

    /// Capture implementation with default settings.
    pub fn capture(&self) -> Box<dyn TimingCapture> {
        match self {
            TimerKind::GnuTime => Box::new(GnuTime::default()),
            TimerKind::InlineBench => Box::new(StructuredTiming::default()),
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::GnuTime => write!(f, "GNU time"),
            TimerKind::InlineBench => write!(f, "InlineBench"),
        }
    }
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gnu time" | "gnutime" | "gnu-time" | "time" => Ok(TimerKind::GnuTime),
            "inlinebench" | "inline-bench" | "structured" => Ok(TimerKind::InlineBench),
            other => Err(format!(
                "unknown timer {other:?}, choose from [\"GNU time\", \"InlineBench\"]"
            )),
        }
    }
}

/// Runs a command under some timing mechanism and parses the result.
pub trait TimingCapture {
    /// Which timer this is.
    fn kind(&self) -> TimerKind;

    /// The invocation to actually launch for `invocation`.
    fn wrap(&self, invocation: &Invocation) -> Invocation;

    /// Parse the captured diagnostic stream of one run.
    fn parse(&self, diagnostics: &str) -> Result<RunMeasurement, CaptureError>;

    /// What to do when [`TimingCapture::parse`] fails.
    fn failure_policy(&self) -> FailurePolicy;
}

/// GNU time capture: wall, user and system seconds.
#[derive(Debug, Clone)]
pub struct GnuTime {
    program: Vec<String>,
    policy: FailurePolicy,
}

impl Default for GnuTime {
    fn default() -> Self {
        Self {
            program: GNU_TIME_PROGRAM.iter().map(|s| s.to_string()).collect(),
            policy: FailurePolicy::Abort,
        }
    }
}

impl GnuTime {
    /// Use a different timer prefix. It must print `wall\tusr\tsys` as the
    /// last line of stderr.
    pub fn with_program(mut self, program: Vec<String>) -> Self {
        self.program = program;
        self
    }

    /// Override the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl TimingCapture for GnuTime {
    fn kind(&self) -> TimerKind {
        TimerKind::GnuTime
    }

    fn wrap(&self, invocation: &Invocation) -> Invocation {
        let mut argv = self.program.clone();
        match invocation {
            Invocation::Argv(args) => argv.extend(args.iter().cloned()),
            Invocation::Shell(line) => {
                argv.extend(["sh".to_string(), "-c".to_string(), line.clone()]);
            }
        }
        Invocation::Argv(argv)
    }

    fn parse(&self, diagnostics: &str) -> Result<RunMeasurement, CaptureError> {
        // GNU time prints its line last, after anything the child wrote to
        // stderr and after "Command exited with non-zero status".
        let line = diagnostics
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(CaptureError::Empty)?;

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(CaptureError::MalformedLine(line.to_string()));
        }

        let mut measurement = RunMeasurement::new();
        for (dimension, raw) in [WALL, USR, SYS].into_iter().zip(fields) {
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| CaptureError::InvalidNumber {
                    field: dimension.to_string(),
                    value: raw.to_string(),
                })?;
            measurement.insert(dimension, value);
        }
        Ok(measurement)
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
}

#[derive(Debug, Deserialize)]
struct ThreadRecord {
    time: f64,
}

type StructuredPayload = BTreeMap<String, BTreeMap<String, BTreeMap<String, ThreadRecord>>>;

/// Structured InlineBench capture: one averaged nanosecond value per task.
#[derive(Debug, Clone)]
pub struct StructuredTiming {
    policy: FailurePolicy,
}

impl Default for StructuredTiming {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Skip,
        }
    }
}

impl StructuredTiming {
    /// Override the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dimension name of `task` measured on `clock`.
    pub fn dimension(clock: &str, task: &str) -> String {
        format!("{clock}/{task}")
    }
}

impl TimingCapture for StructuredTiming {
    fn kind(&self) -> TimerKind {
        TimerKind::InlineBench
    }

    fn wrap(&self, invocation: &Invocation) -> Invocation {
        invocation.clone()
    }

    fn parse(&self, diagnostics: &str) -> Result<RunMeasurement, CaptureError> {
        let text = diagnostics.trim();
        if text.is_empty() {
            return Err(CaptureError::Empty);
        }

        let payload: StructuredPayload = serde_json::from_str(text)?;
        let mut measurement = RunMeasurement::new();
        for (clock, tasks) in &payload {
            if !STRUCTURED_CLOCKS.contains(&clock.as_str()) {
                return Err(CaptureError::UnexpectedShape(format!(
                    "unknown clock {clock:?}"
                )));
            }
            for (task, threads) in tasks {
                if threads.is_empty() {
                    return Err(CaptureError::UnexpectedShape(format!(
                        "task {task:?} has no thread records"
                    )));
                }
                let total: f64 = threads.values().map(|record| record.time).sum();
                measurement.insert(
                    Self::dimension(clock, task),
                    total / threads.len() as f64,
                );
            }
        }

        if measurement.is_empty() {
            return Err(CaptureError::UnexpectedShape("no tasks reported".to_string()));
        }
        Ok(measurement)
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
}
