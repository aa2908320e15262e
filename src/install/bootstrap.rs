// src/install/bootstrap.rs

//! Packaging-tool bootstrap for a fresh installation
//!
//! Runs the distribute setup script with the new interpreter and, for 2.x
//! runtimes, installs pip through the resulting `easy_install`. The runtime
//! itself is already installed at this point, so every failure here is a
//! [`PostInstallWarning`]: logged, reported, and never fatal.

use crate::build::{BuildLog, StepRunner, shell_quote};
use crate::error::PostInstallWarning;
use crate::fetch::Downloader;
use crate::package::PackageSpec;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Script name used when the bootstrap URL has no usable filename
const FALLBACK_SCRIPT_NAME: &str = "distribute_setup.py";

/// What the bootstrap stage did
#[derive(Debug)]
pub enum BootstrapReport {
    /// Disabled by the operator
    Skipped,
    Completed {
        interpreter: PathBuf,
        pip_installed: bool,
    },
    Failed(PostInstallWarning),
}

impl BootstrapReport {
    pub fn warning(&self) -> Option<&PostInstallWarning> {
        match self {
            Self::Failed(warning) => Some(warning),
            _ => None,
        }
    }
}

/// Installs distribute and pip into a finished installation
pub struct PostInstallBootstrapper<'a> {
    downloader: &'a Downloader,
    runner: &'a dyn StepRunner,
    log: &'a BuildLog,
    script_url: &'a str,
    dists_dir: &'a Path,
}

impl<'a> PostInstallBootstrapper<'a> {
    pub fn new(
        downloader: &'a Downloader,
        runner: &'a dyn StepRunner,
        log: &'a BuildLog,
        script_url: &'a str,
        dists_dir: &'a Path,
    ) -> Self {
        Self {
            downloader,
            runner,
            log,
            script_url,
            dists_dir,
        }
    }

    /// Bootstrap the packaging tools, downgrading every failure to a warning
    pub fn run(&self, package: &PackageSpec, install_dir: &Path) -> BootstrapReport {
        match self.try_run(package, install_dir) {
            Ok(report) => report,
            Err(warning) => {
                warn!("{}", warning);
                warn!(
                    "Failed to install setuptools. See {} to see why.",
                    self.log.path().display()
                );
                info!("Skip installation of setuptools.");
                BootstrapReport::Failed(warning)
            }
        }
    }

    fn try_run(
        &self,
        package: &PackageSpec,
        install_dir: &Path,
    ) -> std::result::Result<BootstrapReport, PostInstallWarning> {
        let script = script_filename(self.script_url);
        self.downloader
            .download(&script, self.script_url, &self.dists_dir.join(&script))
            .map_err(|e| PostInstallWarning::ScriptFetch(Box::new(e)))?;

        let candidates = interpreter_candidates(package);
        let interpreter = candidates
            .iter()
            .map(|name| install_dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| PostInstallWarning::InterpreterNotFound {
                install_dir: install_dir.to_path_buf(),
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            })?;

        info!("Installing distribute into {}", install_dir.display());
        let command = format!(
            "{} {}",
            shell_quote(&interpreter.to_string_lossy()),
            shell_quote(&script)
        );
        let status = self
            .runner
            .run(&command, self.dists_dir, self.log)
            .map_err(|e| PostInstallWarning::Command(Box::new(e)))?;
        if !status.success() {
            return Err(PostInstallWarning::ScriptFailed {
                interpreter,
                exit_code: status.code(),
            });
        }

        let easy_install = install_dir.join("bin").join("easy_install");
        let mut pip_installed = false;
        if !package.is_python3() && easy_install.is_file() {
            info!("Installing pip into {}", install_dir.display());
            let command = format!("{} pip", shell_quote(&easy_install.to_string_lossy()));
            let status = self
                .runner
                .run(&command, install_dir, self.log)
                .map_err(|e| PostInstallWarning::Command(Box::new(e)))?;
            if !status.success() {
                return Err(PostInstallWarning::InstallerFailed {
                    exit_code: status.code(),
                });
            }
            pip_installed = true;
        }

        Ok(BootstrapReport::Completed {
            interpreter,
            pip_installed,
        })
    }
}

/// Interpreter paths relative to the installation, in preference order
pub fn interpreter_candidates(package: &PackageSpec) -> &'static [&'static str] {
    if package.is_python3() {
        &["bin/python3", "bin/python3.0"]
    } else {
        &["bin/python", "bin/python2"]
    }
}

fn script_filename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_SCRIPT_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CommandStatus;
    use crate::error::Result;
    use crate::fetch::{Fetched, RemoteMetadata, SourceFetcher};
    use crate::progress::{ProgressStyle, ProgressTracker};
    use std::fs;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    struct ScriptFetcher;

    impl SourceFetcher for ScriptFetcher {
        fn probe(&self, _url: &str) -> Result<RemoteMetadata> {
            Ok(RemoteMetadata::default())
        }

        fn fetch(
            &self,
            _url: &str,
            sink: &mut dyn Write,
            _progress: &dyn ProgressTracker,
        ) -> Result<Fetched> {
            sink.write_all(b"print('setup')\n").unwrap();
            Ok(Fetched {
                metadata: RemoteMetadata::default(),
                bytes: 15,
            })
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, PathBuf)>>,
        exit_code: i32,
    }

    impl StepRunner for RecordingRunner {
        fn run(&self, command: &str, workdir: &Path, _log: &BuildLog) -> Result<CommandStatus> {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), workdir.to_path_buf()));
            Ok(CommandStatus::from_code(Some(self.exit_code)))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        downloader: Downloader,
        log: BuildLog,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let log = BuildLog::open(dir.path().join("log/build.log")).unwrap();
            Self {
                downloader: Downloader::new(Arc::new(ScriptFetcher), ProgressStyle::Silent),
                log,
                dir,
            }
        }

        fn dists(&self) -> PathBuf {
            self.dir.path().join("dists")
        }

        fn install_dir(&self, name: &str, bins: &[&str]) -> PathBuf {
            let install = self.dir.path().join("pythons").join(name);
            fs::create_dir_all(install.join("bin")).unwrap();
            for bin in bins {
                fs::write(install.join("bin").join(bin), b"").unwrap();
            }
            install
        }
    }

    const SCRIPT_URL: &str = "http://python-distribute.org/distribute_setup.py";

    #[test]
    fn test_python2_bootstrap_installs_pip() {
        let fixture = Fixture::new();
        let runner = RecordingRunner::default();
        let install = fixture.install_dir("Python-2.7.2", &["python", "easy_install"]);
        let dists = fixture.dists();
        let package = PackageSpec::parse("2.7.2").unwrap();

        let report = PostInstallBootstrapper::new(
            &fixture.downloader,
            &runner,
            &fixture.log,
            SCRIPT_URL,
            &dists,
        )
        .run(&package, &install);

        match report {
            BootstrapReport::Completed {
                interpreter,
                pip_installed,
            } => {
                assert_eq!(interpreter, install.join("bin/python"));
                assert!(pip_installed);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert!(dists.join("distribute_setup.py").is_file());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.ends_with("'distribute_setup.py'"));
        assert_eq!(calls[0].1, dists);
        assert!(calls[1].0.ends_with("easy_install' pip"));
        assert_eq!(calls[1].1, install);
    }

    #[test]
    fn test_python3_skips_easy_install() {
        let fixture = Fixture::new();
        let runner = RecordingRunner::default();
        let install = fixture.install_dir("Python-3.1.4", &["python3.0", "easy_install"]);
        let dists = fixture.dists();
        let package = PackageSpec::parse("3.1.4").unwrap();

        let report = PostInstallBootstrapper::new(
            &fixture.downloader,
            &runner,
            &fixture.log,
            SCRIPT_URL,
            &dists,
        )
        .run(&package, &install);

        match report {
            BootstrapReport::Completed {
                interpreter,
                pip_installed,
            } => {
                assert_eq!(interpreter, install.join("bin/python3.0"));
                assert!(!pip_installed);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_interpreter_is_warning() {
        let fixture = Fixture::new();
        let runner = RecordingRunner::default();
        let install = fixture.install_dir("Python-3.2", &[]);
        let dists = fixture.dists();
        let package = PackageSpec::parse("3.2").unwrap();

        let report = PostInstallBootstrapper::new(
            &fixture.downloader,
            &runner,
            &fixture.log,
            SCRIPT_URL,
            &dists,
        )
        .run(&package, &install);

        assert!(matches!(
            report.warning(),
            Some(PostInstallWarning::InterpreterNotFound { .. })
        ));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_script_failure_is_warning() {
        let fixture = Fixture::new();
        let runner = RecordingRunner {
            exit_code: 1,
            ..Default::default()
        };
        let install = fixture.install_dir("Python-2.6.6", &["python", "easy_install"]);
        let dists = fixture.dists();
        let package = PackageSpec::parse("2.6.6").unwrap();

        let report = PostInstallBootstrapper::new(
            &fixture.downloader,
            &runner,
            &fixture.log,
            SCRIPT_URL,
            &dists,
        )
        .run(&package, &install);

        assert!(matches!(
            report.warning(),
            Some(PostInstallWarning::ScriptFailed {
                exit_code: Some(1),
                ..
            })
        ));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_interpreter_candidates() {
        let py2 = PackageSpec::parse("2.7.2").unwrap();
        let py3 = PackageSpec::parse("3.2").unwrap();
        assert_eq!(interpreter_candidates(&py2), ["bin/python", "bin/python2"]);
        assert_eq!(interpreter_candidates(&py3), ["bin/python3", "bin/python3.0"]);
    }

    #[test]
    fn test_script_filename() {
        assert_eq!(script_filename(SCRIPT_URL), "distribute_setup.py");
        assert_eq!(script_filename("http://example.com/"), FALLBACK_SCRIPT_NAME);
        assert_eq!(script_filename("not a url"), FALLBACK_SCRIPT_NAME);
    }
}
