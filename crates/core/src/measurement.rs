// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-run measurements.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Wall clock time dimension of GNU time measurements (seconds).
pub const WALL: &str = "wall";
/// User CPU time dimension of GNU time measurements (seconds).
pub const USR: &str = "usr";
/// System CPU time dimension of GNU time measurements (seconds).
pub const SYS: &str = "sys";
/// Derived dimension: `usr + sys`. Never stored, always recomputed.
pub const CPU: &str = "cpu";

/// The timing result of exactly one execution of a command.
///
/// Maps a dimension name (`wall`, `usr`, `sys`, or `<clock>/<task>` for
/// structured captures) to a duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunMeasurement {
    values: BTreeMap<String, f64>,
}

impl RunMeasurement {
    /// Create an empty measurement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, dimension: impl Into<String>, value: f64) -> Self {
        self.insert(dimension, value);
        self
    }

    /// Record `value` for `dimension`, replacing an earlier value.
    pub fn insert(&mut self, dimension: impl Into<String>, value: f64) {
        self.values.insert(dimension.into(), value);
    }

    /// Value recorded for `dimension`.
    pub fn get(&self, dimension: &str) -> Option<f64> {
        self.values.get(dimension).copied()
    }

    /// Dimension names in sorted order.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate `(dimension, value)` pairs in sorted order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.values.iter()
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no dimension was recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RunMeasurement {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RunMeasurement {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let m = RunMeasurement::new().with(WALL, 0.5).with(USR, 0.25).with(SYS, 0.0);
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(WALL), Some(0.5));
        assert_eq!(m.get(CPU), None);
        assert_eq!(m.dimensions().collect::<Vec<_>>(), vec!["sys", "usr", "wall"]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let m: RunMeasurement = [("Wall/search", 200.0)].into_iter().collect();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json, serde_json::json!({"Wall/search": 200.0}));
    }
}
