// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! OS page cache control for cold-cache benchmarks.

use crate::command::{Command, RunOptions};
use crate::error::{HarnessError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Kernel interface for releasing the page cache.
pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

/// Pause after a drop so its cost is not measured.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Something that can empty the OS page cache between timed runs.
pub trait CacheControl {
    /// Fail with [`HarnessError::PermissionDenied`] if dropping will not work.
    fn check_access(&self) -> Result<()>;

    /// Flush dirty pages, release the cache and wait for the system to settle.
    fn drop_caches(&self) -> Result<()>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Writes `3` to the kernel's `drop_caches` file after a `sync`.
#[derive(Debug, Clone)]
pub struct KernelCacheControl {
    control_file: PathBuf,
    settle: Duration,
}

impl Default for KernelCacheControl {
    fn default() -> Self {
        Self {
            control_file: PathBuf::from(DROP_CACHES_PATH),
            settle: DEFAULT_SETTLE,
        }
    }
}

impl KernelCacheControl {
    /// Use another control file.
    pub fn with_control_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_file = path.into();
        self
    }

    /// Override the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn permission_error(&self, e: std::io::Error) -> HarnessError {
        HarnessError::PermissionDenied(format!(
            "cannot write {}: {e} (run as root or keep the cache warm)",
            self.control_file.display()
        ))
    }
}

impl CacheControl for KernelCacheControl {
    fn check_access(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .open(&self.control_file)
            .map(|_| ())
            .map_err(|e| self.permission_error(e))
    }

    fn drop_caches(&self) -> Result<()> {
        Command::argv("sync", ["sync"]).run_checked(&RunOptions::default())?;

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.control_file)
            .map_err(|e| self.permission_error(e))?;
        file.write_all(b"3\n").map_err(|e| self.permission_error(e))?;
        drop(file);

        debug!(settle = ?self.settle, "page cache dropped");
        thread::sleep(self.settle);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("kernel ({})", self.control_file.display())
    }
}

/// Delegates to an external program, e.g. a setuid helper script.
#[derive(Debug, Clone)]
pub struct ExecutableCacheControl {
    command: Command,
    settle: Duration,
}

impl ExecutableCacheControl {
    /// Drop caches by running `program` without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            command: Command::argv("drop-cache", [program]),
            settle: DEFAULT_SETTLE,
        }
    }

    /// Override the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl CacheControl for ExecutableCacheControl {
    fn check_access(&self) -> Result<()> {
        self.command.ensure_exists().map_err(|_| {
            HarnessError::PermissionDenied(format!(
                "drop-cache program {:?} is not executable",
                self.command.invocation().program()
            ))
        })
    }

    fn drop_caches(&self) -> Result<()> {
        self.command.run_checked(&RunOptions::default())?;
        thread::sleep(self.settle);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("program {}", self.command.invocation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_control_writes_three() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let control = KernelCacheControl::default()
            .with_control_file(file.path())
            .with_settle(Duration::ZERO);
        control.check_access().unwrap();
        control.drop_caches().unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "3\n");
    }

    #[test]
    fn test_kernel_control_without_access() {
        let control = KernelCacheControl::default()
            .with_control_file("/nonexistent/xsbench/drop_caches")
            .with_settle(Duration::ZERO);
        assert!(matches!(control.check_access(), Err(HarnessError::PermissionDenied(_))));
        assert!(matches!(control.drop_caches(), Err(HarnessError::PermissionDenied(_))));
    }

    #[test]
    fn test_executable_control() {
        let ok = ExecutableCacheControl::new("true").with_settle(Duration::ZERO);
        ok.check_access().unwrap();
        ok.drop_caches().unwrap();

        let failing = ExecutableCacheControl::new("false").with_settle(Duration::ZERO);
        assert!(matches!(failing.drop_caches(), Err(HarnessError::NonZeroExit { .. })));

        let missing = ExecutableCacheControl::new("xsbench-no-such-dropper");
        assert!(matches!(missing.check_access(), Err(HarnessError::PermissionDenied(_))));
    }
}
