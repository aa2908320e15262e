// src/error.rs

//! Error types for the installation pipeline
//!
//! Every stage translates its failures into one [`Error`] variant at its
//! boundary. Fatal variants abort the pipeline; the post-install stage uses
//! [`PostInstallWarning`] instead, which is logged and never escalated.

use crate::archive::ArchiveFormat;
use crate::build::BuildStep;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors
#[derive(Error, Debug)]
pub enum Error {
    /// The version identifier has no known download source
    #[error("Unknown package: `{0}`")]
    UnknownPackage(String),

    /// The locator could not be parsed into a package name and version
    #[error("Cannot derive a package name and version from `{0}`")]
    InvalidLocator(String),

    /// The remote served something that is not a source archive
    #[error("Invalid content-type: `{content_type}` from {url}")]
    ContentType { content_type: String, url: String },

    /// The archive format was detected but is not one we can unpack
    #[error("Cannot determine archive format of {}: detected {format}", .path.display())]
    UnsupportedArchiveFormat { path: PathBuf, format: ArchiveFormat },

    /// The archive is a supported format but its contents are unusable
    #[error("Failed to extract {}: {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    /// A native build step exited unsuccessfully
    #[error("{step} step failed with exit code {}", display_exit_code(.exit_code))]
    BuildStepFailure {
        step: BuildStep,
        exit_code: Option<i32>,
    },

    /// Transport-level download failure
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    /// The operator interrupted a transfer
    #[error("Interrupted while downloading `{url}`")]
    DownloadInterrupted { url: String },

    /// A subprocess could not be started at all
    #[error("Failed to run `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Configuration file problems
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    /// Filesystem failure, annotated with what was being done
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with a description of the failed operation
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status for this error
    ///
    /// Resolution failures get a distinguished status so wrappers can tell
    /// "no such version" apart from a broken build.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownPackage(_) => 2,
            Self::DownloadInterrupted { .. } => 130,
            _ => 1,
        }
    }

    /// True for failures raised while building or installing
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::BuildStepFailure { .. } | Self::CommandSpawn { .. })
    }
}

fn display_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal failures from the packaging-tool bootstrap
///
/// These are reported to the operator but leave the installation marked as
/// successful.
#[derive(Error, Debug)]
pub enum PostInstallWarning {
    #[error("Failed to download the bootstrap script: {0}")]
    ScriptFetch(#[source] Box<Error>),

    #[error("No interpreter found in {} (tried {})", .install_dir.display(), .candidates.join(", "))]
    InterpreterNotFound {
        install_dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error("Bootstrap script failed under {} with exit code {}", .interpreter.display(), display_exit_code(.exit_code))]
    ScriptFailed {
        interpreter: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("Installing pip with easy_install failed with exit code {}", display_exit_code(.exit_code))]
    InstallerFailed { exit_code: Option<i32> },

    #[error("Failed to run a bootstrap command: {0}")]
    Command(#[source] Box<Error>),
}
