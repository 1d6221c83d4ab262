//! The per-directory result index and report file naming.

use crate::error::Result;
use crate::io::OutputFormat;
use crate::plot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use xsbench_core::BenchmarkSetup;

/// Name of the index file inside an output directory.
pub const INDEX_FILE: &str = "results.info.json";

/// What the index records about one report file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Setup of the benchmark run
    #[serde(flatten)]
    pub setup: BenchmarkSetup,
    /// Report format
    pub format: OutputFormat,
    /// Chart file name, relative to the output directory
    pub plot: String,
    /// Input data file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Config file the benchmark was defined in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

/// `results.info.json`: report file name to [`IndexEntry`].
#[derive(Debug, Clone)]
pub struct ResultIndex {
    path: PathBuf,
    entries: BTreeMap<String, IndexEntry>,
}

impl ResultIndex {
    /// Load the index of `dir`; a missing file is an empty index.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(INDEX_FILE);
        let entries = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Record `entry` for `file_name`, replacing an older entry.
    pub fn insert(&mut self, file_name: impl Into<String>, entry: IndexEntry) {
        self.entries.insert(file_name.into(), entry);
    }

    /// Entry of `file_name`.
    pub fn get(&self, file_name: &str) -> Option<&IndexEntry> {
        self.entries.get(file_name)
    }

    /// All entries by file name.
    pub fn entries(&self) -> &BTreeMap<String, IndexEntry> {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the index back to its directory.
    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

/// File-system friendly form of a benchmark name.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect()
}

/// First `<name>_<id>` with `id` counting from 0 that no report or chart in
/// `dir` uses yet, on disk or in `index`.
pub fn next_report_stem(dir: &Path, name: &str, index: &ResultIndex) -> String {
    let base = file_stem(name);
    (0usize..)
        .map(|id| format!("{base}_{id}"))
        .find(|stem| !stem_taken(dir, stem, index))
        .unwrap_or(base)
}

fn stem_taken(dir: &Path, stem: &str, index: &ResultIndex) -> bool {
    let on_disk = OutputFormat::ALL
        .iter()
        .map(|format| format.extension())
        .chain([plot::EXTENSION])
        .any(|extension| dir.join(format!("{stem}.{extension}")).exists());
    on_disk
        || index.entries().iter().any(|(file_name, entry)| {
            Path::new(file_name).file_stem() == Some(OsStr::new(stem))
                || Path::new(&entry.plot).file_stem() == Some(OsStr::new(stem))
        })
}
