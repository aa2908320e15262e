// src/config.rs

//! Configuration context for pybrew
//!
//! A single [`BrewConfig`] is built once per invocation and handed to every
//! component constructor. It owns the root directory and derives the
//! directory layout from it:
//!
//! ```text
//! <root>/
//!   dists/     downloaded source archives (cache)
//!   build/     per-package extraction and build scratch
//!   pythons/   per-package installation targets
//!   log/       build.log, shared by all build steps
//!   etc/       config.toml
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides the default root directory
pub const ROOT_ENV_VAR: &str = "PYBREW_ROOT";

/// Default upstream mirror for source releases
pub const DEFAULT_MIRROR: &str = "https://www.python.org/ftp/python";

/// Default location of the packaging-tool bootstrap script
pub const DEFAULT_BOOTSTRAP_URL: &str = "http://python-distribute.org/distribute_setup.py";

/// Default timeout for connecting and for metadata probes
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the shared build log inside the log directory
const BUILD_LOG_NAME: &str = "build.log";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrewConfig {
    /// Root of the managed directory tree
    pub root: PathBuf,
    /// Base URL that version identifiers are resolved against
    pub mirror: String,
    /// URL of the packaging-tool bootstrap script
    pub bootstrap_url: String,
    /// Program used for the build, test and install steps
    pub make_command: String,
    /// Connect timeout for downloads and full timeout for probes
    pub http_timeout: Duration,
}

/// On-disk representation of `<root>/etc/config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    mirror: Option<String>,
    bootstrap_url: Option<String>,
    make_command: Option<String>,
    http_timeout_secs: Option<u64>,
}

impl BrewConfig {
    /// Create a configuration with defaults for the given root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mirror: DEFAULT_MIRROR.to_string(),
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            make_command: "make".to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Resolve the root directory and load the optional config file
    ///
    /// Precedence for the root: explicit argument, then `PYBREW_ROOT`,
    /// then `~/.pybrew`.
    pub fn load(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };
        let mut config = Self::new(root);
        config.apply_file()?;
        Ok(config)
    }

    /// Merge settings from `<root>/etc/config.toml` if the file exists
    pub fn apply_file(&mut self) -> Result<()> {
        let path = self.config_path();
        if !path.is_file() {
            debug!("No config file at {}", path.display());
            return Ok(());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| Error::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if let Some(mirror) = file.mirror {
            self.mirror = mirror.trim_end_matches('/').to_string();
        }
        if let Some(url) = file.bootstrap_url {
            self.bootstrap_url = url;
        }
        if let Some(make) = file.make_command {
            if make.trim().is_empty() {
                return Err(Error::Config {
                    path,
                    reason: "make_command must not be empty".to_string(),
                });
            }
            self.make_command = make;
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout = Duration::from_secs(secs);
        }

        debug!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Download cache for source archives and bootstrap scripts
    pub fn dists_dir(&self) -> PathBuf {
        self.root.join("dists")
    }

    /// Parent of all per-package build directories
    pub fn build_root(&self) -> PathBuf {
        self.root.join("build")
    }

    /// Parent of all installations
    pub fn pythons_dir(&self) -> PathBuf {
        self.root.join("pythons")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn config_path(&self) -> PathBuf {
        self.etc_dir().join("config.toml")
    }

    /// The single append-only build log
    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(BUILD_LOG_NAME)
    }

    pub fn build_dir(&self, package_name: &str) -> PathBuf {
        self.build_root().join(package_name)
    }

    pub fn install_dir(&self, package_name: &str) -> PathBuf {
        self.pythons_dir().join(package_name)
    }

    pub fn download_path(&self, filename: &str) -> PathBuf {
        self.dists_dir().join(filename)
    }
}

fn default_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    dirs::home_dir()
        .map(|home| home.join(".pybrew"))
        .ok_or_else(|| Error::Config {
            path: Path::new("~").to_path_buf(),
            reason: format!("cannot determine home directory; set {ROOT_ENV_VAR}"),
        })
}
