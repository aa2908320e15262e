// src/package.rs

//! Package name/version parsing
//!
//! A [`PackageSpec`] names the installation directory. It is parsed from a
//! version identifier (`2.7.2`, `Python-2.7.2`) or from the filename of a
//! source archive once its suffix has been stripped.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Name prefix of every identifier in the release table
const NAME_PREFIX: &str = "Python-";

/// Archive suffixes stripped from filenames, longest first
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".tbz", ".txz", ".tar", ".zip",
];

/// `<Name>-<version>` archive stems where the version starts with a digit
static NAME_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[A-Za-z][A-Za-z0-9_.+]*?)-(?P<version>[0-9][A-Za-z0-9_.+-]*)$")
        .expect("name/version pattern is valid")
});

static PYTHON3_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Python-3").expect("python3 pattern is valid"));

/// Canonical name and version of a source distribution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    /// Installation-directory name, e.g. `Python-2.7.2`
    pub name: String,
    /// Version string, e.g. `2.7.2`
    pub version: String,
}

impl PackageSpec {
    /// Parse a version identifier
    ///
    /// `Python-<v>` is taken as is and anything else gets the `Python-`
    /// prefix, so `2.7.2` and `Python-2.7.2` name the same package. Whether
    /// the version exists is decided by the release table, not here.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidLocator(input.to_string()));
        }

        let version = input.strip_prefix(NAME_PREFIX).unwrap_or(input);
        Ok(Self {
            name: format!("{NAME_PREFIX}{version}"),
            version: version.to_string(),
        })
    }

    /// Parse the package from an archive filename such as `Python-2.7.2.tgz`
    ///
    /// Any `<Name>-<version>` stem is accepted, so alternative distributions
    /// served by URL keep their own name.
    pub fn from_archive_filename(filename: &str) -> Result<Self> {
        let stem = strip_archive_suffix(filename).trim();
        let caps = NAME_VERSION
            .captures(stem)
            .ok_or_else(|| Error::InvalidLocator(filename.to_string()))?;
        Ok(Self {
            name: stem.to_string(),
            version: caps["version"].to_string(),
        })
    }

    /// Major-version-3 variants use a different interpreter name and skip
    /// the legacy package-installer chain
    pub fn is_python3(&self) -> bool {
        PYTHON3_NAME.is_match(&self.name)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Remove a known archive suffix, leaving other names untouched
pub fn strip_archive_suffix(filename: &str) -> &str {
    let lower = filename.to_ascii_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &filename[..filename.len() - suffix.len()])
        .unwrap_or(filename)
}
