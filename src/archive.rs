// src/archive.rs

//! Source archive detection and extraction
//!
//! The format is sniffed from magic bytes, never from the filename or the
//! served content type. Only formats listed in [`SUPPORTED_FORMATS`] are
//! unpacked; the rest are reported by name so the operator knows what the
//! mirror actually served.
//!
//! Extraction makes two passes over the archive. The first collects member
//! paths to decide whether every member sits under one leading directory
//! (`Python-2.7.2/...`), the second unpacks with that directory stripped so
//! the build directory is the source tree itself.
//!
//! Symbolic links must stay inside the tree: a link target may not be
//! absolute or climb with `..`, and no member is written below a path that
//! is already a symlink on disk.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, info};

/// Bytes read from the head of a file for format detection
const SNIFF_LEN: u64 = 512;

/// Offset of the `ustar` magic in a tar header
const USTAR_MAGIC_OFFSET: usize = 257;

/// Formats the extractor can unpack
pub const SUPPORTED_FORMATS: &[ArchiveFormat] = &[ArchiveFormat::TarGz];

/// Archive container formats recognised by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarBz2,
    TarXz,
    TarZstd,
    Zip,
    Tar,
    Unknown,
}

impl ArchiveFormat {
    /// Detect the format from the leading bytes of a file
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - Bzip2: `BZh`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    /// - Zip: `PK 03 04`
    /// - Tar: `ustar` at offset 257
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::TarGz
        } else if data.starts_with(b"BZh") {
            Self::TarBz2
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::TarXz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::TarZstd
        } else if data.starts_with(b"PK\x03\x04") {
            Self::Zip
        } else if data
            .get(USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + 5)
            .is_some_and(|magic| magic == b"ustar")
        {
            Self::Tar
        } else {
            Self::Unknown
        }
    }

    /// Detect the format of a file on disk
    pub fn detect_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("Failed to open {}", path.display()), e))?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN)
            .read_to_end(&mut head)
            .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
        Ok(Self::detect(&head))
    }

    pub fn is_supported(self) -> bool {
        SUPPORTED_FORMATS.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::TarXz => "tar.xz",
            Self::TarZstd => "tar.zst",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an extraction produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Members written, excluding the stripped leading directory itself
    pub entries: usize,
    /// The leading directory that was removed from every member path
    pub stripped: Option<PathBuf>,
}

/// Unpacks source archives into a build directory
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract `archive` into `destination`
    ///
    /// Existing files in `destination` are replaced one by one as members
    /// are written; nothing else in the directory is removed.
    pub fn extract(&self, archive: &Path, destination: &Path) -> Result<ExtractSummary> {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Extracting {}", name);

        let format = ArchiveFormat::detect_file(archive)?;
        if !format.is_supported() {
            return Err(Error::UnsupportedArchiveFormat {
                path: archive.to_path_buf(),
                format,
            });
        }

        let members = self.member_paths(archive)?;
        let stripped = common_leading_dir(&members);
        debug!(
            "{} members in {}, leading directory {:?}",
            members.len(),
            name,
            stripped
        );

        fs::create_dir_all(destination).map_err(|e| {
            Error::io(
                format!("Failed to create directory {}", destination.display()),
                e,
            )
        })?;

        let entries = self.unpack(archive, destination, stripped.as_deref())?;
        Ok(ExtractSummary { entries, stripped })
    }

    fn member_paths(&self, archive: &Path) -> Result<Vec<PathBuf>> {
        let mut tar = open_tar(archive)?;
        let entries = tar.entries().map_err(|e| archive_error(archive, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| archive_error(archive, e))?;
            if is_extension_header(entry.header().entry_type()) {
                continue;
            }
            let raw = entry.path().map_err(|e| archive_error(archive, e))?;
            let member = sanitize_member(archive, &raw)?;
            if entry.header().entry_type().is_symlink() {
                let link = entry
                    .link_name()
                    .map_err(|e| archive_error(archive, e))?
                    .unwrap_or_default();
                check_symlink_target(archive, &member, &link)?;
            }
            paths.push(member);
        }
        Ok(paths)
    }

    fn unpack(&self, archive: &Path, destination: &Path, strip: Option<&Path>) -> Result<usize> {
        let mut tar = open_tar(archive)?;
        let entries = tar.entries().map_err(|e| archive_error(archive, e))?;

        let mut written = 0;
        for entry in entries {
            let mut entry = entry.map_err(|e| archive_error(archive, e))?;
            let kind = entry.header().entry_type();
            if is_extension_header(kind) {
                continue;
            }

            let member = {
                let raw = entry.path().map_err(|e| archive_error(archive, e))?;
                sanitize_member(archive, &raw)?
            };
            let Some(relative) = strip_leading(&member, strip) else {
                continue;
            };
            let target = destination.join(&relative);
            reject_symlinked_path(archive, destination, &relative, kind.is_dir())?;

            if kind.is_dir() {
                fs::create_dir_all(&target).map_err(|e| {
                    Error::io(format!("Failed to create directory {}", target.display()), e)
                })?;
                written += 1;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::io(format!("Failed to create directory {}", parent.display()), e)
                })?;
            }
            remove_existing(&target)?;

            if kind.is_hard_link() {
                let link = entry
                    .link_name()
                    .map_err(|e| archive_error(archive, e))?
                    .ok_or_else(|| Error::Archive {
                        path: archive.to_path_buf(),
                        reason: format!("hard link {} has no target", member.display()),
                    })?;
                let link = sanitize_member(archive, &link)?;
                let source = match strip_leading(&link, strip) {
                    Some(rel) => {
                        reject_symlinked_path(archive, destination, &rel, false)?;
                        destination.join(rel)
                    }
                    None => destination.to_path_buf(),
                };
                fs::hard_link(&source, &target).map_err(|e| {
                    Error::io(
                        format!(
                            "Failed to link {} to {}",
                            target.display(),
                            source.display()
                        ),
                        e,
                    )
                })?;
            } else {
                entry.unpack(&target).map_err(|e| Error::Archive {
                    path: archive.to_path_buf(),
                    reason: format!("failed to unpack {}: {}", member.display(), e),
                })?;
            }
            written += 1;
        }
        Ok(written)
    }
}

fn open_tar(archive: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(archive)
        .map_err(|e| Error::io(format!("Failed to open {}", archive.display()), e))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);
    Ok(tar)
}

fn archive_error(archive: &Path, e: std::io::Error) -> Error {
    Error::Archive {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    }
}

fn is_extension_header(kind: EntryType) -> bool {
    kind.is_pax_global_extensions() || kind.is_pax_local_extensions()
}

/// Normalise a member path, rejecting anything that escapes the destination
fn sanitize_member(archive: &Path, raw: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Archive {
                    path: archive.to_path_buf(),
                    reason: format!("unsafe member path {}", raw.display()),
                });
            }
        }
    }
    Ok(clean)
}

/// Symlink targets must be relative and must not climb out of the tree
fn check_symlink_target(archive: &Path, member: &Path, link: &Path) -> Result<()> {
    let escapes = link.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || link.as_os_str().is_empty() {
        return Err(Error::Archive {
            path: archive.to_path_buf(),
            reason: format!(
                "unsafe symlink {} -> {}",
                member.display(),
                link.display()
            ),
        });
    }
    Ok(())
}

/// Fail if a directory on the way to `relative` is a symlink on disk
///
/// With `inclusive` the final component is checked too, for directory
/// members that would otherwise be created through an existing link.
fn reject_symlinked_path(
    archive: &Path,
    destination: &Path,
    relative: &Path,
    inclusive: bool,
) -> Result<()> {
    let mut current = destination.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() && !inclusive {
            break;
        }
        current.push(component);
        let is_link = fs::symlink_metadata(&current).is_ok_and(|m| m.file_type().is_symlink());
        if is_link {
            return Err(Error::Archive {
                path: archive.to_path_buf(),
                reason: format!(
                    "member {} would be written through symlink {}",
                    relative.display(),
                    current.display()
                ),
            });
        }
    }
    Ok(())
}

/// The first component shared by every member, if there is one
///
/// A lone top-level file is never treated as a directory to strip.
fn common_leading_dir(members: &[PathBuf]) -> Option<PathBuf> {
    let mut common: Option<OsString> = None;
    let mut nested = false;
    for member in members {
        let mut components = member.components();
        let Some(Component::Normal(first)) = components.next() else {
            continue;
        };
        nested |= components.next().is_some();
        match &common {
            None => common = Some(first.to_os_string()),
            Some(prefix) if prefix.as_os_str() == first => {}
            Some(_) => return None,
        }
    }
    if nested { common.map(PathBuf::from) } else { None }
}

/// Member path relative to the destination; `None` for the leading dir itself
fn strip_leading(member: &Path, strip: Option<&Path>) -> Option<PathBuf> {
    let relative = match strip {
        Some(prefix) => member.strip_prefix(prefix).ok()?.to_path_buf(),
        None => member.to_path_buf(),
    };
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn remove_existing(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target)
            .map_err(|e| Error::io(format!("Failed to replace {}", target.display()), e)),
        _ => Ok(()),
    }
}
