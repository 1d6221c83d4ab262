// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark setup metadata.

use crate::timing::TimerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

/// Host the benchmark ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    /// Host name
    pub host: String,
    /// CPU model string
    pub cpu: String,
}

impl Hardware {
    /// Detect the current host from `/proc`, falling back to `"unknown"`.
    pub fn detect() -> Self {
        let host = fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let cpu = fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|info| parse_cpu_model(&info))
            .unwrap_or_else(|| "unknown".to_string());
        Self { host, cpu }
    }
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| matches!(key.trim(), "model name" | "Model" | "cpu model"))
        .map(|(_, value)| value.trim().to_string())
}

/// Metadata captured once per benchmark run and attached to its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSetup {
    /// Benchmark name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Search pattern, for search benchmarks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Timed iterations per command
    pub iterations: usize,
    /// Whether the page cache was kept warm
    pub cached: bool,
    /// Timer used for every measurement
    pub timer: TimerKind,
    /// Host information
    pub hardware: Hardware,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl BenchmarkSetup {
    /// Start describing a benchmark called `name`.
    pub fn builder(name: impl Into<String>) -> BenchmarkSetupBuilder {
        BenchmarkSetupBuilder {
            name: name.into(),
            description: String::new(),
            pattern: None,
            iterations: 3,
            cached: false,
            timer: TimerKind::GnuTime,
            hardware: None,
        }
    }

    /// Unit of every stored value.
    pub fn unit(&self) -> &'static str {
        self.timer.unit()
    }
}

/// Builder for [`BenchmarkSetup`].
#[derive(Debug, Clone)]
pub struct BenchmarkSetupBuilder {
    name: String,
    description: String,
    pattern: Option<String>,
    iterations: usize,
    cached: bool,
    timer: TimerKind,
    hardware: Option<Hardware>,
}

impl BenchmarkSetupBuilder {
    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the search pattern.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the iteration count.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Mark the page cache as kept warm.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Set the timer.
    pub fn timer(mut self, timer: TimerKind) -> Self {
        self.timer = timer;
        self
    }

    /// Use fixed host information instead of detecting it.
    pub fn hardware(mut self, hardware: Hardware) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Freeze the setup, stamping it with the current time.
    pub fn build(self) -> BenchmarkSetup {
        BenchmarkSetup {
            name: self.name,
            description: self.description,
            pattern: self.pattern,
            iterations: self.iterations,
            cached: self.cached,
            timer: self.timer,
            hardware: self.hardware.unwrap_or_else(Hardware::detect),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let setup = BenchmarkSetup::builder("grep").build();
        assert_eq!(setup.iterations, 3);
        assert!(!setup.cached);
        assert_eq!(setup.timer, TimerKind::GnuTime);
        assert_eq!(setup.unit(), "s");
        assert!(setup.created_at <= Utc::now());
        assert!(!setup.hardware.host.is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let hardware = Hardware {
            host: "bench-01".into(),
            cpu: "Test CPU".into(),
        };
        let setup = BenchmarkSetup::builder("readers")
            .description("file readers")
            .pattern("Sherlock")
            .iterations(5)
            .cached(true)
            .timer(TimerKind::InlineBench)
            .hardware(hardware.clone())
            .build();
        assert_eq!(setup.pattern.as_deref(), Some("Sherlock"));
        assert_eq!(setup.iterations, 5);
        assert_eq!(setup.hardware, hardware);
        assert_eq!(setup.unit(), "ns");
    }

    #[test]
    fn test_parse_cpu_model() {
        let info = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU @ 2.20GHz\n";
        assert_eq!(
            parse_cpu_model(info).as_deref(),
            Some("Intel(R) Xeon(R) CPU @ 2.20GHz")
        );
        assert_eq!(parse_cpu_model("processor : 0\n"), None);
    }
}
