//! Benchmarks defined in JSON config files.
//!
//! ```json
//! {
//!   "name": "grep vs xs",
//!   "timer": "GNU time",
//!   "commands": {
//!     "grep": "grep Sherlock en.txt",
//!     "xs": {"cmd": ["xs", "Sherlock", "en.txt"]}
//!   },
//!   "setup_cmd": ["cat en.txt"],
//!   "cleanup_cmd": []
//! }
//! ```
//!
//! A command is a shell line or an argument vector, optionally wrapped in
//! `{"cmd": ...}`. Commands keep the order they are written in.

use crate::error::{BenchError, Result};
use crate::runner::Benchmark;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use xsbench_core::{Command, Invocation, TimerKind};

/// Contents of one config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigFile {
    /// Benchmark name
    pub name: String,
    /// `"GNU time"` or `"InlineBench"`
    #[serde(deserialize_with = "deserialize_timer")]
    pub timer: TimerKind,
    /// Measured commands, in file order
    pub commands: OrderedCommands,
    /// Run once before measuring
    #[serde(default)]
    pub setup_cmd: Vec<Invocation>,
    /// Run once after measuring
    #[serde(default)]
    pub cleanup_cmd: Vec<Invocation>,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Named commands in the order the file lists them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCommands(pub Vec<(String, Invocation)>);

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandSpec {
    Plain(Invocation),
    Wrapped { cmd: Invocation },
}

impl From<CommandSpec> for Invocation {
    fn from(spec: CommandSpec) -> Self {
        match spec {
            CommandSpec::Plain(invocation) | CommandSpec::Wrapped { cmd: invocation } => invocation,
        }
    }
}

impl<'de> Deserialize<'de> for OrderedCommands {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CommandsVisitor;

        impl<'de> Visitor<'de> for CommandsVisitor {
            type Value = OrderedCommands;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of command names to commands")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut commands: Vec<(String, Invocation)> = Vec::new();
                while let Some((name, spec)) = map.next_entry::<String, CommandSpec>()? {
                    if commands.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!("duplicate command {name:?}")));
                    }
                    commands.push((name, spec.into()));
                }
                Ok(OrderedCommands(commands))
            }
        }

        deserializer.deserialize_map(CommandsVisitor)
    }
}

fn deserialize_timer<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<TimerKind, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(|_| {
        de::Error::custom(format!("unknown timer {raw:?}, choose from ['GNU time', 'InlineBench']"))
    })
}

impl ConfigFile {
    /// Build the benchmark; every command runs inside `data_dir`.
    pub fn into_benchmark(self, data_dir: &Path) -> Benchmark {
        let mut benchmark = Benchmark::new(self.name, self.timer).with_description(self.description);
        for (name, invocation) in self.commands.0 {
            benchmark = benchmark.with_command(Command::new(name, invocation).in_dir(data_dir));
        }
        for (index, invocation) in self.setup_cmd.into_iter().enumerate() {
            benchmark = benchmark.with_setup(Command::new(format!("setup {index}"), invocation).in_dir(data_dir));
        }
        for (index, invocation) in self.cleanup_cmd.into_iter().enumerate() {
            benchmark =
                benchmark.with_cleanup(Command::new(format!("cleanup {index}"), invocation).in_dir(data_dir));
        }
        benchmark
    }
}

/// Parse the config file at `path`.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let config_error = |reason: String| BenchError::Config {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let config: ConfigFile = serde_json::from_str(&content).map_err(|e| config_error(e.to_string()))?;
    if config.commands.0.is_empty() {
        return Err(config_error("no commands defined".to_string()));
    }
    Ok(config)
}

/// Config files named by `paths`: files as given, directories by their
/// `*.json` entries in name order.
///
/// A path that does not exist is an error.
pub fn discover_configs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(BenchError::invalid_path(path, "does not exist"));
        }
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            debug!(dir = %path.display(), configs = entries.len(), "scanned config directory");
            found.extend(entries);
        } else {
            found.push(path.clone());
        }
    }
    Ok(found)
}

/// Discover and parse the configs under `paths`. Files that fail to parse
/// are logged and skipped; having none left is [`BenchError::NoValidConfig`].
pub fn load_configs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, ConfigFile)>> {
    let mut configs = Vec::new();
    for path in discover_configs(paths)? {
        match load_config(&path) {
            Ok(config) => configs.push((path, config)),
            Err(e) => warn!(error = %e, "skipping config"),
        }
    }
    if configs.is_empty() {
        return Err(BenchError::NoValidConfig);
    }
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "name": "grep vs xs",
        "timer": "GNU time",
        "commands": {
            "xs": {"cmd": ["xs", "Sherlock", "en.txt"]},
            "grep": "grep Sherlock en.txt | wc -l",
            "cat": ["cat", "en.txt"]
        },
        "setup_cmd": ["cat en.txt"],
        "cleanup_cmd": [["rm", "-f", "out.txt"]]
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_config_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&write(dir.path(), "bench.json", CONFIG)).unwrap();

        assert_eq!(config.timer, TimerKind::GnuTime);
        let names: Vec<&str> = config.commands.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["xs", "grep", "cat"]);
        assert_eq!(
            config.commands.0[0].1,
            Invocation::Argv(vec!["xs".into(), "Sherlock".into(), "en.txt".into()])
        );
        assert_eq!(config.commands.0[1].1, Invocation::Shell("grep Sherlock en.txt | wc -l".into()));
        assert_eq!(config.setup_cmd, vec![Invocation::Shell("cat en.txt".into())]);
    }

    #[test]
    fn test_into_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&write(dir.path(), "bench.json", CONFIG)).unwrap();
        let benchmark = config.into_benchmark(Path::new("sample_data"));

        assert_eq!(benchmark.name, "grep vs xs");
        assert_eq!(benchmark.commands.len(), 3);
        assert_eq!(benchmark.setup.len(), 1);
        assert_eq!(benchmark.cleanup.len(), 1);
        assert!(benchmark
            .timed_commands()
            .all(|c| c.working_directory() == Some(Path::new("sample_data"))));
    }

    #[test]
    fn test_inline_bench_timer_any_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "inline.json",
            r#"{"name": "n", "timer": "inlinebench", "commands": {"a": {"cmd": "./a"}}}"#,
        );
        assert_eq!(load_config(&path).unwrap().timer, TimerKind::InlineBench);
    }

    #[test]
    fn test_invalid_configs() {
        let dir = tempfile::tempdir().unwrap();
        let unknown_timer = write(
            dir.path(),
            "timer.json",
            r#"{"name": "n", "timer": "stopwatch", "commands": {"a": "a"}}"#,
        );
        let err = load_config(&unknown_timer).unwrap_err();
        assert!(matches!(err, BenchError::Config { .. }));
        assert!(err.to_string().contains("stopwatch"));

        let empty = write(dir.path(), "empty.json", r#"{"name": "n", "timer": "GNU time", "commands": {}}"#);
        assert!(matches!(load_config(&empty), Err(BenchError::Config { .. })));

        let duplicate = write(
            dir.path(),
            "dup.json",
            r#"{"name": "n", "timer": "GNU time", "commands": {"a": "a", "a": "b"}}"#,
        );
        assert!(load_config(&duplicate).unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_discover_configs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", CONFIG);
        write(dir.path(), "a.json", CONFIG);
        write(dir.path(), "notes.txt", "");
        let single = write(dir.path(), "single.conf", CONFIG);

        let found = discover_configs(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "single.conf"]);

        let err = discover_configs(&[dir.path().join("missing")]).unwrap_err();
        assert!(matches!(err, BenchError::InvalidPath { .. }));
    }

    #[test]
    fn test_load_configs_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.json", CONFIG);
        write(dir.path(), "bad.json", "{ not json");
        let configs = load_configs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].1.name, "grep vs xs");

        let empty = tempfile::tempdir().unwrap();
        let err = load_configs(&[empty.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, BenchError::NoValidConfig));
    }
}
