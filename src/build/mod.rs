// src/build/mod.rs

//! Native build sequence
//!
//! A source tree is turned into an installation by four shell steps run in
//! the build directory:
//!
//! 1. `./configure --prefix=<install_dir> <flags>`
//! 2. `make`
//! 3. `make test` (skipped when forced)
//! 4. `make install`
//!
//! The first non-zero exit aborts the sequence. Nothing is retried; cleanup
//! of a half-written installation is the caller's responsibility.

mod runner;

pub use runner::{BuildLog, CommandStatus, ShellRunner, StepRunner, shell_quote};

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// One step of the native build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Configure,
    Build,
    Test,
    Install,
}

impl BuildStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Test => "test",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-version deviations from the standard sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionQuirk {
    pub version: &'static str,
    /// `make install` expects the prefix to exist already
    pub precreate_install_dir: bool,
}

pub const VERSION_QUIRKS: &[VersionQuirk] = &[
    VersionQuirk {
        version: "1.5.2",
        precreate_install_dir: true,
    },
    VersionQuirk {
        version: "1.6.1",
        precreate_install_dir: true,
    },
];

/// Look up the quirk entry for a version
pub fn quirk_for(version: &str) -> Option<&'static VersionQuirk> {
    VERSION_QUIRKS.iter().find(|q| q.version == version)
}

/// Inputs for one build
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub version: &'a str,
    pub build_dir: &'a Path,
    pub install_dir: &'a Path,
    pub configure_flags: &'a str,
    /// Skip the test step
    pub force: bool,
}

/// Drives the build steps through a [`StepRunner`]
pub struct BuildOrchestrator<'a> {
    runner: &'a dyn StepRunner,
    log: &'a BuildLog,
    make: &'a str,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(runner: &'a dyn StepRunner, log: &'a BuildLog, make: &'a str) -> Self {
        Self { runner, log, make }
    }

    /// Configure, compile and (unless forced) test
    pub fn build(&self, ctx: &BuildContext<'_>) -> Result<()> {
        self.run_step(BuildStep::Configure, ctx)?;
        self.run_step(BuildStep::Build, ctx)?;
        if ctx.force {
            debug!("Skipping test step");
        } else {
            self.run_step(BuildStep::Test, ctx)?;
        }
        Ok(())
    }

    /// Install into the prefix chosen at configure time
    pub fn install(&self, ctx: &BuildContext<'_>) -> Result<()> {
        if quirk_for(ctx.version).is_some_and(|q| q.precreate_install_dir) {
            fs::create_dir_all(ctx.install_dir).map_err(|e| {
                Error::io(
                    format!("Failed to create directory {}", ctx.install_dir.display()),
                    e,
                )
            })?;
        }
        self.run_step(BuildStep::Install, ctx)
    }

    /// Shell command line for a step
    pub fn command(&self, step: BuildStep, ctx: &BuildContext<'_>) -> String {
        match step {
            BuildStep::Configure => {
                let prefix = shell_quote(&ctx.install_dir.to_string_lossy());
                if ctx.configure_flags.is_empty() {
                    format!("./configure --prefix={prefix}")
                } else {
                    format!("./configure --prefix={prefix} {}", ctx.configure_flags)
                }
            }
            BuildStep::Build => self.make.to_string(),
            BuildStep::Test => format!("{} test", self.make),
            BuildStep::Install => format!("{} install", self.make),
        }
    }

    fn run_step(&self, step: BuildStep, ctx: &BuildContext<'_>) -> Result<()> {
        info!("Running {} step", step);
        let command = self.command(step, ctx);
        let status = self.runner.run(&command, ctx.build_dir, self.log)?;
        if !status.success() {
            return Err(Error::BuildStepFailure {
                step,
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records commands and fails the first one containing `fail_on`
    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl StepRunner for RecordingRunner {
        fn run(&self, command: &str, _workdir: &Path, _log: &BuildLog) -> Result<CommandStatus> {
            self.commands.lock().unwrap().push(command.to_string());
            let failed = self.fail_on.is_some_and(|pattern| command.contains(pattern));
            Ok(CommandStatus::from_code(Some(if failed { 2 } else { 0 })))
        }
    }

    fn context<'a>(dir: &'a Path, install: &'a Path, version: &'a str) -> BuildContext<'a> {
        BuildContext {
            version,
            build_dir: dir,
            install_dir: install,
            configure_flags: "",
            force: false,
        }
    }

    #[test]
    fn test_full_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();
        let runner = RecordingRunner::default();
        let install = PathBuf::from("/opt/pybrew/pythons/Python-2.7.2");
        let mut ctx = context(dir.path(), &install, "2.7.2");
        ctx.configure_flags = "--enable-shared";

        let orchestrator = BuildOrchestrator::new(&runner, &log, "make");
        orchestrator.build(&ctx).unwrap();
        orchestrator.install(&ctx).unwrap();

        assert_eq!(
            *runner.commands.lock().unwrap(),
            vec![
                "./configure --prefix='/opt/pybrew/pythons/Python-2.7.2' --enable-shared",
                "make",
                "make test",
                "make install",
            ]
        );
    }

    #[test]
    fn test_configure_flags_passed_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();
        let runner = RecordingRunner::default();
        let install = PathBuf::from("/opt/pybrew/pythons/Python-2.7.2");
        let orchestrator = BuildOrchestrator::new(&runner, &log, "make");

        let mut ctx = context(dir.path(), &install, "2.7.2");
        assert_eq!(
            orchestrator.command(BuildStep::Configure, &ctx),
            "./configure --prefix='/opt/pybrew/pythons/Python-2.7.2'"
        );

        ctx.configure_flags = " --with-pydebug  CFLAGS=-O0 ";
        assert_eq!(
            orchestrator.command(BuildStep::Configure, &ctx),
            "./configure --prefix='/opt/pybrew/pythons/Python-2.7.2'  --with-pydebug  CFLAGS=-O0 "
        );
    }

    #[test]
    fn test_force_skips_test_step() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();
        let runner = RecordingRunner::default();
        let install = dir.path().join("install");
        let mut ctx = context(dir.path(), &install, "2.7.2");
        ctx.force = true;

        BuildOrchestrator::new(&runner, &log, "gmake")
            .build(&ctx)
            .unwrap();

        let commands = runner.commands.lock().unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], "gmake");
        assert!(!commands.iter().any(|c| c.ends_with("test")));
    }

    #[test]
    fn test_failure_stops_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();
        let runner = RecordingRunner {
            fail_on: Some("configure"),
            ..Default::default()
        };
        let install = dir.path().join("install");
        let ctx = context(dir.path(), &install, "2.7.2");

        let err = BuildOrchestrator::new(&runner, &log, "make")
            .build(&ctx)
            .unwrap_err();

        match err {
            Error::BuildStepFailure { step, exit_code } => {
                assert_eq!(step, BuildStep::Configure);
                assert_eq!(exit_code, Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.commands.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_quirk_precreates_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::open(dir.path().join("build.log")).unwrap();
        let runner = RecordingRunner::default();
        let install = dir.path().join("pythons").join("Python-1.5.2");
        let ctx = context(dir.path(), &install, "1.5.2");

        BuildOrchestrator::new(&runner, &log, "make")
            .install(&ctx)
            .unwrap();
        assert!(install.is_dir());

        let other = dir.path().join("pythons").join("Python-2.7.2");
        let ctx = context(dir.path(), &other, "2.7.2");
        BuildOrchestrator::new(&runner, &log, "make")
            .install(&ctx)
            .unwrap();
        assert!(!other.exists());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(BuildStep::Configure.to_string(), "configure");
        assert_eq!(BuildStep::Install.as_str(), "install");
        assert!(quirk_for("1.6.1").is_some());
        assert!(quirk_for("2.7.2").is_none());
    }
}
