// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result accumulation across repeated runs.
//!
//! A [`ResultAccumulator`] keeps one [`ResultSeries`] per command name, in
//! the order commands were first seen. Every series stores one chronological
//! sample vector per dimension; all vectors of a series have the same length.
//!
//! # Invariants
//!
//! - A measurement merged into an existing series must carry exactly the
//!   dimensions already stored, otherwise the merge is rejected and the
//!   series is left untouched.
//! - The `cpu` dimension is never stored. It is derived on demand as the
//!   elementwise sum of `usr` and `sys`.

use crate::error::{HarnessError, Result};
use crate::measurement::{RunMeasurement, CPU, SYS, USR, WALL};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Summary statistics of one dimension of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of samples
    pub count: usize,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation, NaN for fewer than two samples
    pub stdev: f64,
}

impl Statistics {
    /// Compute statistics over `samples`. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let stdev = if n < 2 {
            f64::NAN
        } else {
            let variance = samples
                .iter()
                .map(|x| {
                    let diff = x - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (n - 1) as f64;
            variance.sqrt()
        };

        Some(Self {
            count: n,
            min,
            max,
            mean,
            stdev,
        })
    }
}

/// The accumulated samples of one named command across all iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct ResultSeries {
    /// Command name (the merge key)
    pub name: String,
    /// Human-readable invocation of the command
    pub command: String,
    samples: BTreeMap<String, Vec<f64>>,
}

/// Serialized form of [`ResultSeries`], checked before use.
#[derive(Deserialize)]
struct RawSeries {
    name: String,
    command: String,
    samples: BTreeMap<String, Vec<f64>>,
}

impl TryFrom<RawSeries> for ResultSeries {
    type Error = String;

    fn try_from(raw: RawSeries) -> std::result::Result<Self, Self::Error> {
        let mut lengths = raw.samples.iter().map(|(dim, values)| (dim, values.len()));
        if let Some((first_dim, expected)) = lengths.next() {
            if let Some((dim, found)) = lengths.find(|(_, len)| *len != expected) {
                return Err(format!(
                    "series {:?}: dimension {dim:?} has {found} samples, {first_dim:?} has {expected}",
                    raw.name
                ));
            }
        }
        Ok(Self {
            name: raw.name,
            command: raw.command,
            samples: raw.samples,
        })
    }
}

impl ResultSeries {
    /// Start a series seeded with a single measurement.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        first: &RunMeasurement,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            samples: first
                .iter()
                .map(|(dim, value)| (dim.clone(), vec![*value]))
                .collect(),
        }
    }

    /// Number of runs merged into this series.
    pub fn len(&self) -> usize {
        self.samples.values().next().map_or(0, Vec::len)
    }

    /// Whether the series holds no runs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored dimension names in sorted order.
    pub fn stored_dimensions(&self) -> Vec<&str> {
        self.samples.keys().map(String::as_str).collect()
    }

    /// All reportable dimensions, stored and derived.
    ///
    /// GNU time dimensions come first as `wall, usr, sys, cpu`; anything else
    /// follows in sorted order.
    pub fn dimensions(&self) -> Vec<String> {
        let mut ordered: Vec<String> = [WALL, USR, SYS]
            .iter()
            .filter(|dim| self.samples.contains_key(**dim))
            .map(|dim| dim.to_string())
            .collect();
        if self.has_derived_cpu() {
            ordered.push(CPU.to_string());
        }
        ordered.extend(
            self.samples
                .keys()
                .filter(|dim| ![WALL, USR, SYS, CPU].contains(&dim.as_str()))
                .cloned(),
        );
        ordered
    }

    /// Raw stored samples keyed by dimension.
    pub fn raw_samples(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.samples
    }

    /// Samples of `dimension`, in run order. `cpu` is derived from `usr + sys`
    /// unless the series stores a `cpu` dimension of its own.
    pub fn samples(&self, dimension: &str) -> Option<Cow<'_, [f64]>> {
        if let Some(stored) = self.samples.get(dimension) {
            return Some(Cow::Borrowed(stored.as_slice()));
        }
        if dimension == CPU && self.has_derived_cpu() {
            let usr = &self.samples[USR];
            let sys = &self.samples[SYS];
            return Some(Cow::Owned(
                usr.iter().zip(sys).map(|(u, s)| u + s).collect(),
            ));
        }
        None
    }

    /// Statistics of `dimension`, or `None` if the dimension is unknown.
    pub fn statistics(&self, dimension: &str) -> Option<Statistics> {
        self.samples(dimension)
            .and_then(|samples| Statistics::from_samples(&samples))
    }

    /// Statistics for every reportable dimension.
    pub fn summary(&self) -> CommandSummary {
        CommandSummary {
            name: self.name.clone(),
            statistics: self
                .dimensions()
                .into_iter()
                .filter_map(|dim| self.statistics(&dim).map(|stats| (dim, stats)))
                .collect(),
        }
    }

    /// Append one measurement. Rejects mismatching dimension sets without
    /// modifying the series.
    pub fn push(&mut self, measurement: &RunMeasurement) -> Result<()> {
        self.check_dimensions(measurement.dimensions())?;
        for (dim, value) in measurement {
            if let Some(values) = self.samples.get_mut(dim) {
                values.push(*value);
            }
        }
        Ok(())
    }

    /// Append every run of `other`, which must describe the same command.
    pub fn extend_from(&mut self, other: &ResultSeries) -> Result<()> {
        self.check_dimensions(other.samples.keys().map(String::as_str))?;
        for (dim, values) in &other.samples {
            if let Some(stored) = self.samples.get_mut(dim) {
                stored.extend_from_slice(values);
            }
        }
        Ok(())
    }

    fn has_derived_cpu(&self) -> bool {
        !self.samples.contains_key(CPU)
            && self.samples.contains_key(USR)
            && self.samples.contains_key(SYS)
    }

    fn check_dimensions<'a>(&self, incoming: impl Iterator<Item = &'a str>) -> Result<()> {
        let actual: Vec<String> = incoming.map(str::to_string).collect();
        let matches = actual.len() == self.samples.len()
            && actual.iter().all(|dim| self.samples.contains_key(dim));
        if matches {
            Ok(())
        } else {
            Err(HarnessError::AggregationMismatch {
                name: self.name.clone(),
                expected: self.samples.keys().cloned().collect(),
                actual,
            })
        }
    }
}

/// Holds one growing series per distinct command name.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    series: Vec<ResultSeries>,
    index: HashMap<String, usize>,
}

impl ResultAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one run of command `name` into its series.
    pub fn merge(
        &mut self,
        name: &str,
        command: &str,
        measurement: RunMeasurement,
    ) -> Result<()> {
        match self.index.get(name) {
            Some(&i) => self.series[i].push(&measurement),
            None => {
                self.insert(ResultSeries::new(name, command, &measurement));
                Ok(())
            }
        }
    }

    /// Merge a whole series, appending to an existing one of the same name.
    pub fn merge_series(&mut self, series: ResultSeries) -> Result<()> {
        match self.index.get(&series.name) {
            Some(&i) => self.series[i].extend_from(&series),
            None => {
                self.insert(series);
                Ok(())
            }
        }
    }

    /// Series of command `name`.
    pub fn get(&self, name: &str) -> Option<&ResultSeries> {
        self.index.get(name).map(|&i| &self.series[i])
    }

    /// Statistics of `dimension` for command `name`.
    pub fn statistics(&self, name: &str, dimension: &str) -> Option<Statistics> {
        self.get(name).and_then(|series| series.statistics(dimension))
    }

    /// All series in insertion order.
    pub fn series(&self) -> &[ResultSeries] {
        &self.series
    }

    /// Consume the accumulator, keeping insertion order.
    pub fn into_series(self) -> Vec<ResultSeries> {
        self.series
    }

    /// Number of distinct commands.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether nothing was merged yet.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn insert(&mut self, series: ResultSeries) {
        self.index.insert(series.name.clone(), self.series.len());
        self.series.push(series);
    }
}

/// Named statistics of one command, used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSummary {
    /// Command name
    pub name: String,
    /// Statistics per dimension
    pub statistics: BTreeMap<String, Statistics>,
}

impl CommandSummary {
    fn min_of(&self, dimension: &str) -> f64 {
        self.statistics
            .get(dimension)
            .map_or(f64::INFINITY, |stats| stats.min)
    }
}

/// Ascending by minimum wall time, tie-broken by minimum cpu time.
///
/// Summaries lacking a dimension sort after those that have it.
pub fn compare_summaries(a: &CommandSummary, b: &CommandSummary) -> Ordering {
    a.min_of(WALL)
        .total_cmp(&b.min_of(WALL))
        .then_with(|| a.min_of(CPU).total_cmp(&b.min_of(CPU)))
}
