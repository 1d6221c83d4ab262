// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement model for xsbench.
//!
//! This crate holds the pieces every benchmark driver shares: a [`Command`]
//! to run, a [`TimingCapture`] that turns one run into a [`RunMeasurement`],
//! and a [`ResultAccumulator`] that merges repeated runs into per-command
//! [`ResultSeries`] with derived [`Statistics`].
//!
//! # Modules
//!
//! - [`command`] - Command definitions and process execution
//! - [`timing`] - GNU time and structured (InlineBench) timing capture
//! - [`measurement`] - Single-run measurements
//! - [`series`] - Result accumulation, statistics and ranking
//! - [`setup`] - Benchmark setup metadata and host detection
//! - [`cache`] - OS page cache control
//! - [`error`] - Error taxonomy

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cache;
pub mod command;
pub mod error;
pub mod measurement;
pub mod series;
pub mod setup;
pub mod timing;

pub use cache::{CacheControl, ExecutableCacheControl, KernelCacheControl};
pub use command::{find_executable, Command, Invocation, RunOptions};
pub use error::{HarnessError, Result};
pub use measurement::RunMeasurement;
pub use series::{compare_summaries, CommandSummary, ResultAccumulator, ResultSeries, Statistics};
pub use setup::{BenchmarkSetup, BenchmarkSetupBuilder, Hardware};
pub use timing::{CaptureError, FailurePolicy, GnuTime, StructuredTiming, TimerKind, TimingCapture};
