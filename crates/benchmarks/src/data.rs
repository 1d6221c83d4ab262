//! Sample corpus preparation: download, decompress, preprocess.

use crate::error::Result;
use crate::settings::DEFAULT_DATA_URL;
use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use xsbench_core::{find_executable, Command, RunOptions};

/// Name of the sample corpus inside the data directory.
pub const DATA_FILE: &str = "en.sample.txt";

/// Name of the sample corpus metadata file.
pub const META_FILE: &str = "en.sample.meta";

/// Preprocessor producing metadata files.
pub const PREPROCESSOR: &str = "xspp";

/// The sample corpus in a data directory.
#[derive(Debug, Clone)]
pub struct SampleData {
    dir: PathBuf,
    url: String,
    progress: bool,
}

impl SampleData {
    /// Corpus in `dir`, downloaded from the default URL.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            url: DEFAULT_DATA_URL.to_string(),
            progress: true,
        }
    }

    /// Download from `url` instead.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Show or hide the download progress bar.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Path of the corpus.
    pub fn data_file(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    /// Path of the corpus metadata.
    pub fn meta_file(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Path the compressed download is stored at.
    pub fn archive_file(&self) -> PathBuf {
        self.dir.join(format!("{DATA_FILE}.gz"))
    }

    /// Make sure the corpus exists, downloading and decompressing it as
    /// needed. Returns its path.
    pub fn ensure(&self) -> Result<PathBuf> {
        let data = self.data_file();
        if data.exists() {
            return Ok(data);
        }
        fs::create_dir_all(&self.dir)?;

        let archive = self.archive_file();
        if !archive.exists() {
            self.download(&archive)?;
        }
        info!(archive = %archive.display(), "decompressing data");
        let bytes = decompress(&archive, &data)?;
        fs::remove_file(&archive)?;
        info!(file = %data.display(), bytes, "data ready");
        Ok(data)
    }

    fn download(&self, target: &Path) -> Result<()> {
        info!(url = %self.url, "downloading data");
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()?;
        let response = client.get(&self.url).send()?.error_for_status()?;

        let pb = if self.progress {
            ProgressBar::new(response.content_length().unwrap_or(0))
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        // Partial downloads must not be mistaken for a finished archive.
        let partial = target.with_extension("gz.part");
        let mut out = BufWriter::new(File::create(&partial)?);
        io::copy(&mut pb.wrap_read(response), &mut out)?;
        drop(out);
        fs::rename(&partial, target)?;
        pb.finish_and_clear();
        Ok(())
    }

    /// Create the corpus metadata file if it is missing.
    pub fn preprocess(&self) -> Result<bool> {
        preprocess_file(&self.data_file(), &self.meta_file())
    }
}

/// Gunzip `archive` into `out`, returning the decompressed size.
pub fn decompress(archive: &Path, out: &Path) -> Result<u64> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(archive)?));
    let mut writer = BufWriter::new(File::create(out)?);
    Ok(io::copy(&mut decoder, &mut writer)?)
}

/// Run the preprocessor to create `meta` for `data` unless it exists.
///
/// Returns whether a metadata file is available afterwards. A missing
/// preprocessor is not an error; benchmarks using the metadata will fail
/// their own preflight instead.
pub fn preprocess_file(data: &Path, meta: &Path) -> Result<bool> {
    if meta.exists() {
        return Ok(true);
    }
    if find_executable(PREPROCESSOR).is_none() {
        warn!(program = PREPROCESSOR, "preprocessor not found, no metadata created");
        return Ok(false);
    }
    info!(file = %data.display(), "preprocessing data");
    Command::argv(
        PREPROCESSOR,
        [
            PREPROCESSOR.to_string(),
            data.to_string_lossy().into_owned(),
            "-m".to_string(),
            meta.to_string_lossy().into_owned(),
        ],
    )
    .run_checked(&RunOptions::default())?;
    Ok(meta.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(path: &Path, content: &[u8]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_paths() {
        let data = SampleData::new("bench_data");
        assert_eq!(data.data_file(), Path::new("bench_data/en.sample.txt"));
        assert_eq!(data.meta_file(), Path::new("bench_data/en.sample.meta"));
        assert_eq!(data.archive_file(), Path::new("bench_data/en.sample.txt.gz"));
    }

    #[test]
    fn test_decompress() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("text.gz");
        let out = dir.path().join("text");
        gzip(&archive, b"Sherlock Holmes\nDr. Watson\n");

        assert_eq!(decompress(&archive, &out).unwrap(), 27);
        assert_eq!(fs::read_to_string(&out).unwrap(), "Sherlock Holmes\nDr. Watson\n");
    }

    #[test]
    fn test_ensure_uses_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let data = SampleData::new(dir.path()).with_url("http://127.0.0.1:9/unused");
        gzip(&data.archive_file(), b"Sherlock\n");

        let path = data.ensure().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Sherlock\n");
        assert!(!data.archive_file().exists());
        // second call finds the data in place
        assert_eq!(data.ensure().unwrap(), path);
    }

    #[test]
    fn test_preprocess_existing_meta() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("x.meta");
        fs::write(&meta, "").unwrap();
        assert!(preprocess_file(&dir.path().join("x"), &meta).unwrap());
    }
}
