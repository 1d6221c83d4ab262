// Copyright 2025 xsbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command definitions and process execution.

use crate::error::{HarnessError, Result};
use crate::measurement::RunMeasurement;
use crate::timing::TimingCapture;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval at which a watched child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a command is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Invocation {
    /// A line interpreted by `sh -c`
    Shell(String),
    /// A program followed by its arguments, passed verbatim
    Argv(Vec<String>),
}

impl Invocation {
    /// The program that is launched first.
    pub fn program(&self) -> &str {
        match self {
            Invocation::Shell(_) => "sh",
            Invocation::Argv(args) => args.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Build the process for this invocation.
    pub fn to_process(&self) -> io::Result<std::process::Command> {
        match self {
            Invocation::Shell(line) => {
                let mut process = std::process::Command::new("sh");
                process.arg("-c").arg(line);
                Ok(process)
            }
            Invocation::Argv(args) => {
                let (program, rest) = args.split_first().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector")
                })?;
                let mut process = std::process::Command::new(program);
                process.args(rest);
                Ok(process)
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Shell(line) => f.write_str(line),
            Invocation::Argv(args) => f.write_str(&args.join(" ")),
        }
    }
}

/// Options applied to every process launched for a benchmark.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill children that run longer than this.
    pub timeout: Option<Duration>,
    /// Directory for the files that receive redirected output.
    pub scratch_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Set the watchdog timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn scratch_file(&self) -> io::Result<File> {
        match &self.scratch_dir {
            Some(dir) => tempfile::tempfile_in(dir),
            None => tempfile::tempfile(),
        }
    }
}

/// One invocable unit of work.
///
/// The name is the merge key used by [`crate::ResultAccumulator`]. Preconditions
/// run before every execution; their output is discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    invocation: Invocation,
    preconditions: Vec<Command>,
    working_directory: Option<PathBuf>,
}

struct Finished {
    status: ExitStatus,
    diagnostics: String,
}

impl Command {
    /// Create a command from an explicit invocation.
    pub fn new(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            name: name.into(),
            invocation,
            preconditions: Vec::new(),
            working_directory: None,
        }
    }

    /// Create a command from an argument vector.
    pub fn argv<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, Invocation::Argv(args.into_iter().map(Into::into).collect()))
    }

    /// Create a command from a shell line.
    pub fn shell(name: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(name, Invocation::Shell(line.into()))
    }

    /// Run `precondition` before every execution of this command.
    pub fn with_precondition(mut self, precondition: Command) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// Launch the command in `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// The merge key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The invocation.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Commands run before every execution.
    pub fn preconditions(&self) -> &[Command] {
        &self.preconditions
    }

    /// Working directory, if any.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Whether the program can be launched. Shell lines are assumed present.
    pub fn exists(&self) -> bool {
        match &self.invocation {
            Invocation::Shell(_) => true,
            Invocation::Argv(_) => {
                let program = self.invocation.program();
                match &self.working_directory {
                    Some(dir) if program.contains('/') && Path::new(program).is_relative() => {
                        find_executable(&dir.join(program).to_string_lossy()).is_some()
                    }
                    _ => find_executable(program).is_some(),
                }
            }
        }
    }

    /// Fail with [`HarnessError::CommandNotFound`] unless this command and
    /// all of its preconditions exist.
    pub fn ensure_exists(&self) -> Result<()> {
        for precondition in &self.preconditions {
            precondition.ensure_exists()?;
        }
        if self.exists() {
            Ok(())
        } else {
            Err(HarnessError::CommandNotFound {
                name: self.name.clone(),
                program: self.invocation.program().to_string(),
            })
        }
    }

    /// Run once under `capture` and return the parsed measurement.
    ///
    /// A non-zero exit status of the measured process is only logged: search
    /// tools exit with 1 when nothing matches.
    pub fn run(&self, capture: &dyn TimingCapture, options: &RunOptions) -> Result<RunMeasurement> {
        self.run_preconditions(options)?;

        let invocation = capture.wrap(&self.invocation);
        debug!(command = %self.name, invocation = %invocation, "running");
        let finished = self.execute(&invocation, options)?;
        if !finished.status.success() {
            warn!(command = %self.name, status = %finished.status, "command exited unsuccessfully");
        }

        capture
            .parse(&finished.diagnostics)
            .map_err(|source| HarnessError::CommandFailed {
                name: self.name.clone(),
                source,
            })
    }

    /// Run once without timing and return the exit status.
    pub fn run_plain(&self, options: &RunOptions) -> Result<ExitStatus> {
        self.run_preconditions(options)?;
        debug!(command = %self.name, invocation = %self.invocation, "running untimed");
        Ok(self.execute(&self.invocation, options)?.status)
    }

    /// Like [`Command::run_plain`], but a non-zero exit is an error.
    pub fn run_checked(&self, options: &RunOptions) -> Result<()> {
        let status = self.run_plain(options)?;
        if status.success() {
            Ok(())
        } else {
            Err(HarnessError::NonZeroExit {
                name: self.name.clone(),
                code: status.code(),
            })
        }
    }

    fn run_preconditions(&self, options: &RunOptions) -> Result<()> {
        for precondition in &self.preconditions {
            precondition.run_checked(options)?;
        }
        Ok(())
    }

    fn execute(&self, invocation: &Invocation, options: &RunOptions) -> Result<Finished> {
        // Some tools stop early when stdout is /dev/null, so output goes to
        // a real file that is removed once it is closed.
        let stdout = options.scratch_file()?;
        let mut stderr = options.scratch_file()?;

        let mut process = invocation.to_process().map_err(|source| self.spawn_error(invocation, source))?;
        if let Some(dir) = &self.working_directory {
            process.current_dir(dir);
        }
        // own process group, so a timeout reaches the wrapped tool too
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut process, 0);
        process
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr.try_clone()?));

        let mut child = process
            .spawn()
            .map_err(|source| self.spawn_error(invocation, source))?;
        let status = self.wait(&mut child, options.timeout)?;

        stderr.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        stderr.read_to_end(&mut raw)?;

        Ok(Finished {
            status,
            diagnostics: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    fn wait(&self, child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus> {
        let Some(timeout) = timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                self.kill_group(child);
                if let Err(e) = child.wait() {
                    warn!(command = %self.name, error = %e, "failed to reap timed out command");
                }
                return Err(HarnessError::TimedOut {
                    name: self.name.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Kill `child` and everything it spawned.
    fn kill_group(&self, child: &mut Child) {
        let group = format!("-{}", child.id());
        let killed = std::process::Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match killed {
            Ok(status) if status.success() => {}
            other => {
                debug!(command = %self.name, result = ?other, "group kill failed, killing child only");
                if let Err(e) = child.kill() {
                    warn!(command = %self.name, error = %e, "failed to kill timed out command");
                }
            }
        }
    }

    fn spawn_error(&self, invocation: &Invocation, source: io::Error) -> HarnessError {
        let missing_dir = self.working_directory.as_deref().is_some_and(|dir| !dir.is_dir());
        if source.kind() == io::ErrorKind::NotFound && !missing_dir {
            HarnessError::CommandNotFound {
                name: self.name.clone(),
                program: invocation.program().to_string(),
            }
        } else {
            HarnessError::Spawn {
                name: self.name.clone(),
                source,
            }
        }
    }
}

/// Resolve `program` to an executable file.
///
/// Programs containing a `/` are checked as paths, everything else is looked
/// up in the directories of `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{CPU, USR, WALL};
    use crate::series::ResultAccumulator;
    use crate::timing::{GnuTime, StructuredTiming};

    /// GNU time stand-in that reports fixed values and then runs the command.
    fn fixed_timer(line: &str) -> GnuTime {
        GnuTime::default().with_program(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("printf '{line}\\n' >&2; exec \"$@\""),
            "timer".to_string(),
        ])
    }

    #[test]
    fn test_invocation_display_and_program() {
        let argv = Invocation::Argv(vec!["grep".into(), "-n".into(), "Sherlock".into()]);
        assert_eq!(argv.to_string(), "grep -n Sherlock");
        assert_eq!(argv.program(), "grep");

        let shell = Invocation::Shell("cat file | grep x".into());
        assert_eq!(shell.to_string(), "cat file | grep x");
        assert_eq!(shell.program(), "sh");

        assert!(Invocation::Argv(Vec::new()).to_process().is_err());
    }

    #[test]
    fn test_invocation_deserializes_untagged() {
        let shell: Invocation = serde_json::from_str("\"echo hi\"").unwrap();
        assert_eq!(shell, Invocation::Shell("echo hi".into()));
        let argv: Invocation = serde_json::from_str(r#"["echo", "hi"]"#).unwrap();
        assert_eq!(argv, Invocation::Argv(vec!["echo".into(), "hi".into()]));
    }

    #[test]
    fn test_exists() {
        assert!(Command::argv("sh", ["sh", "-c", "true"]).exists());
        assert!(!Command::argv("missing", ["xsbench-no-such-binary", "x"]).exists());
        assert!(Command::shell("pipeline", "xsbench-no-such-binary | wc").exists());
        assert!(find_executable("/definitely/not/here").is_none());
    }

    #[test]
    fn test_ensure_exists_checks_preconditions() {
        let cmd = Command::argv("echo", ["echo", "hi"])
            .with_precondition(Command::argv("prep", ["xsbench-no-such-binary"]));
        match cmd.ensure_exists() {
            Err(HarnessError::CommandNotFound { name, program }) => {
                assert_eq!(name, "prep");
                assert_eq!(program, "xsbench-no-such-binary");
            }
            other => panic!("expected CommandNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_run_parses_timer_output() {
        let cmd = Command::argv("echo", ["echo", "hi"]);
        let m = cmd
            .run(&fixed_timer("0.50\\t0.10\\t0.02"), &RunOptions::default())
            .unwrap();
        assert_eq!(m.get(WALL), Some(0.5));
        assert_eq!(m.get(USR), Some(0.1));
    }

    #[test]
    fn test_scenario_echo_three_runs() {
        let cmd = Command::argv("echo", ["echo", "hi"]);
        let mut acc = ResultAccumulator::new();
        for line in ["0.10\\t0.01\\t0.00", "0.12\\t0.01\\t0.00", "0.11\\t0.02\\t0.00"] {
            let m = cmd.run(&fixed_timer(line), &RunOptions::default()).unwrap();
            acc.merge(cmd.name(), &cmd.invocation().to_string(), m).unwrap();
        }
        let series = acc.get("echo").unwrap();
        assert_eq!(series.len(), 3);
        assert!((acc.statistics("echo", WALL).unwrap().mean - 0.11).abs() < 1e-9);
        assert!((acc.statistics("echo", CPU).unwrap().mean - 0.013_333).abs() < 1e-5);
        assert!(acc.statistics("echo", WALL).unwrap().stdev > 0.0);
    }

    #[test]
    fn test_run_reports_unparseable_output() {
        let cmd = Command::shell("noisy", "echo 'not a timing line' >&2");
        let err = cmd
            .run(&StructuredTiming::default(), &RunOptions::default())
            .unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_structured_output_from_child() {
        let cmd = Command::shell(
            "inline",
            r#"echo '{"Wall": {"search": {"0": {"time": 100}, "1": {"time": 300}}}}' >&2"#,
        );
        let m = cmd.run(&StructuredTiming::default(), &RunOptions::default()).unwrap();
        assert_eq!(m.get("Wall/search"), Some(200.0));
    }

    #[test]
    fn test_failing_precondition_aborts_run() {
        let cmd = Command::argv("echo", ["echo", "hi"]).with_precondition(Command::shell("prep", "exit 3"));
        match cmd.run_plain(&RunOptions::default()) {
            Err(HarnessError::NonZeroExit { name, code }) => {
                assert_eq!(name, "prep");
                assert_eq!(code, Some(3));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[test]
    fn test_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();
        let cmd = Command::shell("check", "test -f marker").in_dir(dir.path());
        cmd.run_checked(&RunOptions::default()).unwrap();
        assert!(Command::shell("check", "test -f marker").run_checked(&RunOptions::default()).is_err());
    }

    #[test]
    fn test_scratch_dir_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions::default().with_scratch_dir(dir.path());
        let status = Command::argv("echo", ["echo", "hi"]).run_plain(&options).unwrap();
        assert!(status.success());
        // Scratch files are unlinked on creation.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_timeout_kills_child() {
        let options = RunOptions::default().with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = Command::argv("sleep", ["sleep", "5"]).run_plain(&options).unwrap_err();
        assert!(matches!(err, HarnessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_wrapped_process() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let cmd = Command::shell("slow", format!("sleep 1; touch '{}'", marker.display()));
        let options = RunOptions::default().with_timeout(Duration::from_millis(200));

        let err = cmd.run(&fixed_timer("0.10\\t0.01\\t0.00"), &options).unwrap_err();
        assert!(matches!(err, HarnessError::TimedOut { .. }));
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn test_missing_working_directory_is_not_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = Command::argv("echo", ["echo", "hi"])
            .in_dir(dir.path().join("absent"))
            .run_plain(&RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn test_missing_program_on_spawn() {
        let err = Command::argv("ghost", ["/nonexistent/xsbench-ghost"])
            .run_plain(&RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::CommandNotFound { .. }));
    }
}
