// src/resolver.rs

//! Locator resolution
//!
//! Turns what the operator typed into a concrete download source. A URL is
//! taken verbatim and the package is derived from its filename; anything
//! else is a version identifier looked up in the built-in table of releases
//! published on the mirror.
//!
//! Resolution ends with a metadata probe so a bad mirror is reported before
//! the pipeline creates a single directory.

use crate::config::BrewConfig;
use crate::error::{Error, Result};
use crate::fetch::{RemoteMetadata, SourceFetcher};
use crate::package::PackageSpec;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Schemes accepted as direct archive locators
const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "file"];

/// Releases published under the mirror, oldest first
const KNOWN_VERSIONS: &[&str] = &[
    "1.5.2", "1.6.1", "2.0.1", "2.1.3", "2.2.3", "2.3.7", "2.4.6", "2.5.5", "2.6", "2.6.1",
    "2.6.2", "2.6.3", "2.6.4", "2.6.5", "2.6.6", "2.7", "2.7.1", "2.7.2", "3.0.1", "3.1",
    "3.1.1", "3.1.2", "3.1.3", "3.1.4", "3.2", "3.2.1",
];

/// Releases whose archives do not follow the `<v>/Python-<v>.tgz` layout
const PATH_OVERRIDES: &[(&str, &str)] = &[
    ("1.5.2", "src/py152.tgz"),
    ("1.6.1", "1.6.1/Python-1.6.1.tar.gz"),
];

/// A locator resolved to a concrete download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub package: PackageSpec,
    pub url: String,
    /// Cache filename, taken from the last URL path segment
    pub filename: String,
    /// Probe result
    pub metadata: RemoteMetadata,
}

/// Resolves locators against the configured mirror
pub struct VersionResolver {
    mirror: String,
    fetcher: Arc<dyn SourceFetcher>,
}

impl VersionResolver {
    pub fn new(config: &BrewConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            mirror: config.mirror.trim_end_matches('/').to_string(),
            fetcher,
        }
    }

    /// Resolve a locator and probe its source
    pub fn resolve(&self, locator: &str) -> Result<ResolvedSource> {
        let (package, url) = self.locate(locator)?;
        let filename = url_filename(&url).ok_or_else(|| Error::InvalidLocator(url.clone()))?;

        debug!("Resolved {} to {}", locator, url);
        let metadata = self.fetcher.probe(&url)?;

        Ok(ResolvedSource {
            package,
            url,
            filename,
            metadata,
        })
    }

    /// Map a locator to its package and URL without touching the network
    pub fn locate(&self, locator: &str) -> Result<(PackageSpec, String)> {
        let locator = locator.trim();

        if is_url(locator) {
            let filename =
                url_filename(locator).ok_or_else(|| Error::InvalidLocator(locator.to_string()))?;
            let package = PackageSpec::from_archive_filename(&filename)?;
            return Ok((package, locator.to_string()));
        }

        let package = PackageSpec::parse(locator)?;
        let url = self
            .release_url(&package.version)
            .ok_or_else(|| Error::UnknownPackage(package.name.clone()))?;
        Ok((package, url))
    }

    /// Download URL of a known release
    pub fn release_url(&self, version: &str) -> Option<String> {
        if !KNOWN_VERSIONS.contains(&version) {
            return None;
        }
        let path = PATH_OVERRIDES
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, path)| path.to_string())
            .unwrap_or_else(|| format!("{version}/Python-{version}.tgz"));
        Some(format!("{}/{}", self.mirror, path))
    }
}

/// Versions that can be installed by identifier
pub fn known_versions() -> &'static [&'static str] {
    KNOWN_VERSIONS
}

fn is_url(locator: &str) -> bool {
    Url::parse(locator).is_ok_and(|url| URL_SCHEMES.contains(&url.scheme()))
}

fn url_filename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}
