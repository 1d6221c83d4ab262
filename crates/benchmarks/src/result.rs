//! Benchmark report types.
//!
//! A [`Report`] is the immutable outcome of one benchmark run: the setup it
//! ran under plus one [`ResultSeries`] per command, in the order the commands
//! were first measured.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use xsbench_core::measurement::{CPU, WALL};
use xsbench_core::{compare_summaries, BenchmarkSetup, ResultAccumulator, ResultSeries, Statistics};

/// Completed benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Metadata captured when the run started
    pub setup: BenchmarkSetup,
    /// Raw samples per command, in insertion order
    pub results: Vec<ResultSeries>,
    /// Name of the baseline command, if the benchmark has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
}

impl Report {
    /// Freeze the accumulated results of a run.
    pub fn new(setup: BenchmarkSetup, results: ResultAccumulator, baseline: Option<String>) -> Self {
        Self {
            setup,
            results: results.into_series(),
            baseline,
        }
    }

    /// Series of command `name`.
    pub fn series(&self, name: &str) -> Option<&ResultSeries> {
        self.results.iter().find(|series| series.name == name)
    }

    /// Statistics of `dimension` for command `name`.
    pub fn statistics(&self, name: &str, dimension: &str) -> Option<Statistics> {
        self.series(name).and_then(|series| series.statistics(dimension))
    }

    /// Every reportable dimension across all series, in first-seen order.
    pub fn dimensions(&self) -> Vec<String> {
        let mut dimensions: Vec<String> = Vec::new();
        for series in &self.results {
            for dimension in series.dimensions() {
                if !dimensions.contains(&dimension) {
                    dimensions.push(dimension);
                }
            }
        }
        dimensions
    }

    /// Dimensions shown in charts: wall and cpu for GNU time reports, the
    /// wall clock of every task for structured reports.
    pub fn plot_dimensions(&self) -> Vec<String> {
        let dimensions = self.dimensions();
        if dimensions.iter().any(|d| d == WALL) {
            return dimensions
                .into_iter()
                .filter(|d| d == WALL || d == CPU)
                .collect();
        }
        let wall: Vec<String> = dimensions
            .iter()
            .filter(|d| d.starts_with("Wall/"))
            .cloned()
            .collect();
        if wall.is_empty() {
            dimensions
        } else {
            wall
        }
    }

    /// Series sorted by minimum wall time, then minimum cpu time.
    pub fn ranked(&self) -> Vec<&ResultSeries> {
        let mut ranked: Vec<(&ResultSeries, _)> = self
            .results
            .iter()
            .map(|series| (series, series.summary()))
            .collect();
        ranked.sort_by(|(_, a), (_, b)| compare_summaries(a, b));
        ranked.into_iter().map(|(series, _)| series).collect()
    }

    /// Mean wall time of the baseline divided by the mean wall time of `name`.
    ///
    /// `None` without a baseline. NaN when `name` has a zero mean.
    pub fn wall_speedup(&self, name: &str) -> Option<f64> {
        let baseline = self.statistics(self.baseline.as_deref()?, WALL)?.mean;
        let mean = self.statistics(name, WALL)?.mean;
        if mean == 0.0 {
            Some(f64::NAN)
        } else {
            Some(baseline / mean)
        }
    }

    /// Compare two commands the way [`Report::ranked`] does.
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(compare_summaries(
            &self.series(a)?.summary(),
            &self.series(b)?.summary(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use xsbench_core::measurement::{SYS, USR};
    use xsbench_core::{Hardware, RunMeasurement, TimerKind};

    pub(crate) fn setup(timer: TimerKind) -> BenchmarkSetup {
        BenchmarkSetup::builder("literal")
            .description("Case sensitive search of matching lines")
            .pattern("Sherlock")
            .timer(timer)
            .hardware(Hardware {
                host: "bench-01".into(),
                cpu: "Test CPU".into(),
            })
            .build()
    }

    pub(crate) fn gnu_report() -> Report {
        let mut acc = ResultAccumulator::new();
        let runs = [
            ("cat", [0.10, 0.00, 0.05]),
            ("GNU grep", [0.40, 0.30, 0.05]),
            ("xs grep", [0.20, 0.50, 0.10]),
            ("cat", [0.12, 0.00, 0.05]),
            ("GNU grep", [0.44, 0.31, 0.06]),
            ("xs grep", [0.22, 0.52, 0.10]),
        ];
        for (name, [wall, usr, sys]) in runs {
            let m = RunMeasurement::new().with(WALL, wall).with(USR, usr).with(SYS, sys);
            acc.merge(name, &format!("{} Sherlock en.txt", name.to_lowercase()), m)
                .unwrap();
        }
        Report::new(setup(TimerKind::GnuTime), acc, Some("cat".into()))
    }

    #[test]
    fn test_dimensions() {
        let report = gnu_report();
        assert_eq!(report.dimensions(), vec!["wall", "usr", "sys", "cpu"]);
        assert_eq!(report.plot_dimensions(), vec!["wall", "cpu"]);
    }

    #[test]
    fn test_structured_plot_dimensions() {
        let mut acc = ResultAccumulator::new();
        let m = RunMeasurement::new()
            .with("CPU/search", 10.0)
            .with("Wall/read", 5.0)
            .with("Wall/search", 12.0);
        acc.merge("re2", "re2_search Sherlock f", m).unwrap();
        let report = Report::new(setup(TimerKind::InlineBench), acc, None);
        assert_eq!(report.plot_dimensions(), vec!["Wall/read", "Wall/search"]);
        assert_eq!(report.wall_speedup("re2"), None);
    }

    #[test]
    fn test_ranked_by_min_wall() {
        let report = gnu_report();
        let names: Vec<&str> = report.ranked().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cat", "xs grep", "GNU grep"]);
        assert_eq!(report.compare("xs grep", "GNU grep"), Some(Ordering::Less));
        // insertion order is untouched
        assert_eq!(report.results[1].name, "GNU grep");
    }

    #[test]
    fn test_wall_speedup() {
        let report = gnu_report();
        assert!((report.wall_speedup("cat").unwrap() - 1.0).abs() < 1e-12);
        let speedup = report.wall_speedup("xs grep").unwrap();
        assert!((speedup - 0.11 / 0.21).abs() < 1e-9);
    }
}
