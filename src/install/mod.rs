// src/install/mod.rs

//! Installation pipeline
//!
//! Drives one installation from locator to a runnable interpreter:
//!
//! ```text
//! resolve -> guard -> download -> extract -> build -> install -> bootstrap
//! ```
//!
//! Every stage gates the next. Failures before the build leave the
//! installation directory alone; failures while building or installing
//! remove it wholesale so a half-written prefix never looks installed. The
//! build directory and the downloaded archive are always kept for inspection
//! and reuse.

mod bootstrap;
mod request;

pub use bootstrap::{BootstrapReport, PostInstallBootstrapper, interpreter_candidates};
pub use request::{ArtifactPaths, BuildOptions, InstallationRequest, PreparedInstall};

use crate::archive::ArchiveExtractor;
use crate::build::{BuildContext, BuildLog, BuildOrchestrator, ShellRunner, StepRunner};
use crate::config::BrewConfig;
use crate::error::{Error, Result};
use crate::fetch::{Downloader, HttpFetcher, SourceFetcher, reject_html};
use crate::package::PackageSpec;
use crate::progress::ProgressStyle;
use crate::resolver::VersionResolver;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotStarted,
    AlreadyInstalled,
    Downloading,
    Downloaded,
    Unpacking,
    Unpacked,
    Building,
    Built,
    Installing,
    Installed,
    Bootstrapping,
    Done,
    Failed,
}

impl InstallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AlreadyInstalled | Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: InstallState) -> bool {
        use InstallState::*;
        match (self, next) {
            (NotStarted, AlreadyInstalled | Downloading) => true,
            (Downloading, Downloaded) => true,
            (Downloaded, Unpacking) => true,
            (Unpacking, Unpacked) => true,
            (Unpacked, Building) => true,
            (Building, Built) => true,
            (Built, Installing) => true,
            (Installing, Installed) => true,
            (Installed, Bootstrapping | Done) => true,
            (Bootstrapping, Done) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::AlreadyInstalled => "already-installed",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Unpacking => "unpacking",
            Self::Unpacked => "unpacked",
            Self::Building => "building",
            Self::Built => "built",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Bootstrapping => "bootstrapping",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the path taken to reach it
#[derive(Debug)]
struct StateTracker {
    current: InstallState,
    history: Vec<InstallState>,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            current: InstallState::NotStarted,
            history: vec![InstallState::NotStarted],
        }
    }

    fn advance(&mut self, next: InstallState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal transition {} -> {}",
            self.current,
            next
        );
        debug!("Install state: {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
    }

    fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.advance(InstallState::Failed);
        }
    }
}

/// Whether anything was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    /// The installation directory existed; nothing was done
    AlreadyInstalled,
    Installed,
}

/// Result of a successful pipeline run
#[derive(Debug)]
pub struct InstallOutcome {
    pub package: PackageSpec,
    pub install_dir: PathBuf,
    pub log_file: PathBuf,
    pub status: InstallStatus,
    pub bootstrap: BootstrapReport,
    /// Every state visited, starting with `NotStarted`
    pub history: Vec<InstallState>,
}

/// The build-from-source installer
pub struct InstallationPipeline {
    config: BrewConfig,
    fetcher: Arc<dyn SourceFetcher>,
    runner: Arc<dyn StepRunner>,
    progress: ProgressStyle,
}

impl InstallationPipeline {
    /// Create a pipeline using the network and real subprocesses
    pub fn new(config: BrewConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_components(config, fetcher, Arc::new(ShellRunner)))
    }

    /// Create a pipeline with explicit transport and subprocess seams
    pub fn with_components(
        config: BrewConfig,
        fetcher: Arc<dyn SourceFetcher>,
        runner: Arc<dyn StepRunner>,
    ) -> Self {
        Self {
            config,
            fetcher,
            runner,
            progress: ProgressStyle::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressStyle) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BrewConfig {
        &self.config
    }

    /// Resolve and probe the request's source and derive its paths
    ///
    /// Touches the network but never the filesystem.
    pub fn prepare(&self, request: InstallationRequest) -> Result<PreparedInstall> {
        let resolver = VersionResolver::new(&self.config, self.fetcher.clone());
        let source = resolver.resolve(&request.locator)?;
        let paths = ArtifactPaths::derive(&self.config, &source);
        Ok(PreparedInstall {
            request,
            source,
            paths,
        })
    }

    /// Resolve and install in one call
    pub fn run(&self, request: InstallationRequest) -> Result<InstallOutcome> {
        let prepared = self.prepare(request)?;
        self.install(prepared)
    }

    /// Run the pipeline for a prepared installation
    pub fn install(&self, prepared: PreparedInstall) -> Result<InstallOutcome> {
        let mut state = StateTracker::new();
        let result = self.drive(&prepared, &mut state);
        if result.is_err() {
            state.fail();
            debug!("Install history: {:?}", state.history);
        }
        result.map(|(status, bootstrap)| InstallOutcome {
            package: prepared.source.package.clone(),
            install_dir: prepared.paths.install_dir.clone(),
            log_file: prepared.paths.log_file.clone(),
            status,
            bootstrap,
            history: state.history,
        })
    }

    fn drive(
        &self,
        prepared: &PreparedInstall,
        state: &mut StateTracker,
    ) -> Result<(InstallStatus, BootstrapReport)> {
        let PreparedInstall {
            request,
            source,
            paths,
        } = prepared;
        let options = &request.options;
        let package = &source.package;

        if paths.install_dir.exists() {
            if !options.force {
                info!("You are already installed `{}`", package.name);
                state.advance(InstallState::AlreadyInstalled);
                return Ok((InstallStatus::AlreadyInstalled, BootstrapReport::Skipped));
            }
            info!(
                "Reinstalling `{}` over {}",
                package.name,
                paths.install_dir.display()
            );
        }

        // Stage 1: download
        state.advance(InstallState::Downloading);
        reject_html(&source.metadata, &source.url)?;
        let downloader = Downloader::new(self.fetcher.clone(), self.progress);
        downloader.download(&source.filename, &source.url, &paths.download_file)?;
        state.advance(InstallState::Downloaded);

        info!("");
        info!(
            "This could take a while. You can run the following command on another shell to track the status:"
        );
        info!("  tail -f {}", paths.log_file.display());
        info!("");

        // Stage 2: extract
        state.advance(InstallState::Unpacking);
        ArchiveExtractor::new().extract(&paths.download_file, &paths.build_dir)?;
        state.advance(InstallState::Unpacked);

        // Stage 3: build and install
        let log = BuildLog::open(&paths.log_file)?;
        info!(
            "Installing {} into {}",
            package.name,
            paths.install_dir.display()
        );

        let orchestrator =
            BuildOrchestrator::new(self.runner.as_ref(), &log, &self.config.make_command);
        let ctx = BuildContext {
            version: &package.version,
            build_dir: &paths.build_dir,
            install_dir: &paths.install_dir,
            configure_flags: &options.configure_flags,
            force: options.force,
        };

        state.advance(InstallState::Building);
        let built = remove_dir_if_present(&paths.install_dir).and_then(|()| orchestrator.build(&ctx));
        if let Err(e) = built {
            return Err(self.abandon(package, paths, e));
        }
        state.advance(InstallState::Built);

        state.advance(InstallState::Installing);
        if let Err(e) = orchestrator.install(&ctx) {
            return Err(self.abandon(package, paths, e));
        }
        state.advance(InstallState::Installed);

        // Stage 4: packaging tools
        let bootstrap = if options.skip_packaging_bootstrap {
            info!("Skip installation of setuptools.");
            BootstrapReport::Skipped
        } else {
            state.advance(InstallState::Bootstrapping);
            let dists = self.config.dists_dir();
            PostInstallBootstrapper::new(
                &downloader,
                self.runner.as_ref(),
                &log,
                &self.config.bootstrap_url,
                &dists,
            )
            .run(package, &paths.install_dir)
        };
        state.advance(InstallState::Done);

        info!(
            "Installed {} successfully. Run the following command to switch to {}.",
            package.name, package.name
        );
        info!("");
        info!("  pybrew switch {}", package.version);

        Ok((InstallStatus::Installed, bootstrap))
    }

    /// Remove the partial installation and report how to retry
    fn abandon(&self, package: &PackageSpec, paths: &ArtifactPaths, cause: Error) -> Error {
        if let Err(e) = remove_dir_if_present(&paths.install_dir) {
            warn!("{}", e);
        }
        error!(
            "Failed to install {}. See {} to see why.",
            package.name,
            paths.log_file.display()
        );
        error!("  pybrew install --force {}", package.version);
        cause
    }
}

fn remove_dir_if_present(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    debug!("Removing {}", path.display());
    fs::remove_dir_all(path)
        .map_err(|e| Error::io(format!("Failed to remove {}", path.display()), e))
}
