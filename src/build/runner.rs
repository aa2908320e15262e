// src/build/runner.rs

//! Subprocess execution for build steps
//!
//! Steps run through the [`StepRunner`] trait so the orchestrator and the
//! installation pipeline stay decoupled from real processes. [`ShellRunner`]
//! is the production implementation.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// The shared, append-only build log
///
/// Subprocess output is appended raw. The file is never truncated, so output
/// from earlier runs stays in place above the current one.
#[derive(Debug)]
pub struct BuildLog {
    path: PathBuf,
    file: File,
}

impl BuildLog {
    /// Open (creating if needed) the log at `path` in append mode
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create directory {}", parent.display()), e)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(format!("Failed to open log {}", path.display()), e))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw bytes
    pub fn append(&self, bytes: &[u8]) -> Result<()> {
        (&self.file)
            .write_all(bytes)
            .map_err(|e| Error::io(format!("Failed to write log {}", self.path.display()), e))
    }

    /// A handle suitable for a child's stdout or stderr
    pub fn stdio(&self) -> Result<Stdio> {
        let handle = self
            .file
            .try_clone()
            .map_err(|e| Error::io(format!("Failed to clone log {}", self.path.display()), e))?;
        Ok(Stdio::from(handle))
    }
}

/// Exit status of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    code: Option<i32>,
}

impl CommandStatus {
    /// `None` means the process was terminated by a signal
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

/// Runs one shell command line
pub trait StepRunner: Send + Sync {
    /// Run `command` in `workdir` with stdout and stderr appended to `log`
    ///
    /// Returns the exit status; only a failure to start the process is an
    /// error.
    fn run(&self, command: &str, workdir: &Path, log: &BuildLog) -> Result<CommandStatus>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl StepRunner for ShellRunner {
    fn run(&self, command: &str, workdir: &Path, log: &BuildLog) -> Result<CommandStatus> {
        debug!("Command: {} (in {})", command, workdir.display());

        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(log.stdio()?)
            .stderr(log.stdio()?)
            .status()
            .map_err(|source| Error::CommandSpawn {
                command: command.to_string(),
                source,
            })?;

        Ok(CommandStatus::from_code(status.code()))
    }
}

/// Quote a path or argument for `sh`
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_runner_appends_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("log").join("build.log")).unwrap();
        log.append(b"previous run\n").unwrap();

        let status = ShellRunner
            .run("echo out; echo err >&2; pwd", dir.path(), &log)
            .unwrap();
        assert!(status.success());

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.starts_with("previous run\n"));
        assert!(content.contains("out\n"));
        assert!(content.contains("err\n"));
        assert!(!content.contains("echo out"));
    }

    #[test]
    fn test_shell_runner_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();

        let status = ShellRunner.run("exit 3", dir.path(), &log).unwrap();
        assert!(!status.success());
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();

        let err = ShellRunner
            .run("true", &dir.path().join("missing"), &log)
            .unwrap_err();
        assert!(matches!(err, Error::CommandSpawn { .. }));
    }

    #[test]
    fn test_log_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        BuildLog::open(&path).unwrap().append(b"one\n").unwrap();
        BuildLog::open(&path).unwrap().append(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/opt/pythons/Python-2.7.2"), "'/opt/pythons/Python-2.7.2'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
