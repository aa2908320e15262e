// src/fetch/mod.rs

//! Source archive downloads
//!
//! The [`Downloader`] owns the cache policy and failure cleanup; the actual
//! transport sits behind the [`SourceFetcher`] trait so the pipeline can be
//! driven without a network.
//!
//! # Cache policy
//!
//! An existing destination file is always a cache hit. There is no checksum,
//! staleness check or forced re-download; deleting the file from the cache
//! directory is the only way to fetch again.
//!
//! # Failure policy
//!
//! Bytes are streamed into `<destination>.part` and renamed into place only
//! after the transfer completes and its content type has been accepted. Any
//! failure removes the partial file, so a later run never mistakes it for a
//! cache hit.

mod client;
mod interrupt;

pub use client::HttpFetcher;
pub use interrupt::InterruptGuard;

use crate::error::{Error, Result};
use crate::progress::{ProgressStyle, ProgressTracker};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Response metadata from a probe or a transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Raw `Content-Type` header, if the server sent one
    pub content_type: Option<String>,
    /// `Content-Length`, if known
    pub content_length: Option<u64>,
}

impl RemoteMetadata {
    /// True when the response is an HTML document rather than a payload
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_html)
    }
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub metadata: RemoteMetadata,
    pub bytes: u64,
}

/// Transport for remote resources
pub trait SourceFetcher: Send + Sync {
    /// Read response metadata without downloading the body
    fn probe(&self, url: &str) -> Result<RemoteMetadata>;

    /// Stream the resource into `sink`, reporting progress as bytes arrive
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &dyn ProgressTracker,
    ) -> Result<Fetched>;
}

/// Outcome of [`Downloader::download`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The destination already existed; nothing was fetched
    CacheHit,
    /// A fresh copy was written
    Downloaded { bytes: u64 },
}

/// Cache-aware downloader
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn SourceFetcher>,
    progress: ProgressStyle,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, progress: ProgressStyle) -> Self {
        Self { fetcher, progress }
    }

    /// Fetch `url` into `destination` unless it is already cached
    pub fn download(
        &self,
        display_name: &str,
        url: &str,
        destination: &Path,
    ) -> Result<DownloadStatus> {
        if destination.is_file() {
            info!("Use the previously fetched {}", destination.display());
            return Ok(DownloadStatus::CacheHit);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create directory {}", parent.display()), e)
            })?;
        }

        info!("Downloading {}", url);
        let part_path = partial_path(destination);
        let tracker = self.progress.tracker(display_name);

        let result = self.transfer(url, &part_path, tracker.as_ref());
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                tracker.finish_with_error(&format!("{display_name} [failed]"));
                remove_partial(&part_path);
                if matches!(e, Error::DownloadInterrupted { .. }) {
                    info!("Interrupt to abort. `{}`", url);
                }
                return Err(e);
            }
        };

        if let Err(e) = reject_html(&fetched.metadata, url) {
            tracker.finish_with_error(&format!("{display_name} [rejected]"));
            remove_partial(&part_path);
            return Err(e);
        }

        fs::rename(&part_path, destination).map_err(|e| {
            remove_partial(&part_path);
            Error::io(
                format!(
                    "Failed to move {} to {}",
                    part_path.display(),
                    destination.display()
                ),
                e,
            )
        })?;

        tracker.finish_with_message(&format!("{display_name} [done]"));
        debug!("Downloaded {} bytes to {}", fetched.bytes, destination.display());
        Ok(DownloadStatus::Downloaded {
            bytes: fetched.bytes,
        })
    }

    fn transfer(
        &self,
        url: &str,
        part_path: &Path,
        tracker: &dyn ProgressTracker,
    ) -> Result<Fetched> {
        let _guard = InterruptGuard::install();

        let mut file = File::create(part_path)
            .map_err(|e| Error::io(format!("Failed to create file {}", part_path.display()), e))?;
        let fetched = self.fetcher.fetch(url, &mut file, tracker)?;
        file.sync_all()
            .map_err(|e| Error::io(format!("Failed to write {}", part_path.display()), e))?;
        Ok(fetched)
    }
}

/// Reject responses that are HTML documents
///
/// A mirror that answers with an error page instead of a binary payload is
/// the common symptom of a broken or redirected URL.
pub fn reject_html(metadata: &RemoteMetadata, url: &str) -> Result<()> {
    match &metadata.content_type {
        Some(content_type) if is_html(content_type) => Err(Error::ContentType {
            content_type: content_type.clone(),
            url: url.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Check a `Content-Type` value for an HTML media type
pub fn is_html(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    media_type == "text/html" || media_type == "application/xhtml+xml"
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    name.push(".part");
    destination.with_file_name(name)
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Failed to remove partial download {}: {}", path.display(), e);
    }
}
