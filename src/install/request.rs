// src/install/request.rs

//! Installation inputs and derived paths

use crate::config::BrewConfig;
use crate::resolver::ResolvedSource;
use std::path::PathBuf;

/// Operator choices for one installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Extra arguments appended to `./configure`
    pub configure_flags: String,
    /// Bypass the already-installed guard and skip the test step
    pub force: bool,
    /// Do not bootstrap distribute and pip after installing
    pub skip_packaging_bootstrap: bool,
}

/// What the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    /// Version identifier or archive URL
    pub locator: String,
    pub options: BuildOptions,
}

impl InstallationRequest {
    pub fn new(locator: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            locator: locator.into(),
            options,
        }
    }
}

/// Filesystem locations for one installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub download_file: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub log_file: PathBuf,
}

impl ArtifactPaths {
    pub fn derive(config: &BrewConfig, source: &ResolvedSource) -> Self {
        Self {
            download_file: config.download_path(&source.filename),
            build_dir: config.build_dir(&source.package.name),
            install_dir: config.install_dir(&source.package.name),
            log_file: config.log_file(),
        }
    }
}

/// A request after resolution, ready for the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInstall {
    pub request: InstallationRequest,
    pub source: ResolvedSource,
    pub paths: ArtifactPaths,
}
