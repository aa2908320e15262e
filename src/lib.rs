// src/lib.rs

//! pybrew
//!
//! Build-from-source Python version manager. Given a version identifier or
//! a source archive URL, pybrew downloads the release, compiles it into a
//! version-named prefix under its root, and bootstraps distribute and pip
//! into the new interpreter.
//!
//! # Architecture
//!
//! - One root: `dists/`, `build/`, `pythons/`, `log/`, `etc/` under a single
//!   directory described by [`BrewConfig`]
//! - Sequential pipeline: resolve, download, extract, build, install, bootstrap
//! - Seams: network transport ([`fetch::SourceFetcher`]) and subprocesses
//!   ([`build::StepRunner`]) are traits
//! - Failures: fatal stage errors clean up the installation prefix;
//!   bootstrap problems are warnings only

pub mod archive;
pub mod build;
pub mod config;
mod error;
pub mod fetch;
pub mod install;
pub mod package;
pub mod progress;
pub mod resolver;

pub use config::BrewConfig;
pub use error::{Error, PostInstallWarning, Result};
pub use install::{
    BuildOptions, InstallOutcome, InstallState, InstallStatus, InstallationPipeline,
    InstallationRequest,
};
pub use package::PackageSpec;
pub use progress::{LogProgress, ProgressStyle, ProgressTracker, SilentProgress};
pub use resolver::{ResolvedSource, VersionResolver, known_versions};
