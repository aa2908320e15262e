// src/fetch/client.rs

//! HTTP transport for source archives
//!
//! Wraps a blocking reqwest client. Transfers are streamed in fixed-size
//! chunks and never buffered whole. `file://` URLs are served from the local
//! filesystem through the same interface, which lets mirrors be plain
//! directories.

use super::interrupt;
use super::{Fetched, RemoteMetadata, SourceFetcher};
use crate::config::BrewConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Network and local-file fetcher
pub struct HttpFetcher {
    client: Client,
    probe_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher using the configured timeouts
    ///
    /// The connect timeout applies to every request. Transfers have no
    /// overall timeout since source tarballs can be large on slow links.
    pub fn new(config: &BrewConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.http_timeout)
            .timeout(None::<Duration>)
            .user_agent(concat!("pybrew/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            probe_timeout: config.http_timeout,
        })
    }

    fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| download_error(url, e))?;
        check_status(url, response)
    }
}

impl SourceFetcher for HttpFetcher {
    fn probe(&self, url: &str) -> Result<RemoteMetadata> {
        if let Some(path) = local_path(url) {
            return probe_local(url, path);
        }

        debug!("Probing {}", url);
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .map_err(|e| download_error(url, e))?;

        // Some servers refuse HEAD; fall back to a GET and drop the body unread
        let response = match response.status() {
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                debug!("HEAD not supported by {}, retrying with GET", url);
                let response = self
                    .client
                    .get(url)
                    .timeout(self.probe_timeout)
                    .send()
                    .map_err(|e| download_error(url, e))?;
                check_status(url, response)?
            }
            _ => check_status(url, response)?,
        };

        Ok(metadata_from_headers(
            response.headers(),
            response.content_length(),
        ))
    }

    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &dyn ProgressTracker,
    ) -> Result<Fetched> {
        if let Some(path) = local_path(url) {
            let metadata = probe_local(url, path.clone())?;
            let file = File::open(&path)
                .map_err(|e| Error::io(format!("Failed to open {}", path.display()), e))?;
            progress.set_length(metadata.content_length.unwrap_or(0));
            let bytes = stream(url, file, sink, progress)?;
            return Ok(Fetched { metadata, bytes });
        }

        let response = self.get(url)?;
        let metadata = metadata_from_headers(response.headers(), response.content_length());
        progress.set_length(metadata.content_length.unwrap_or(0));
        let bytes = stream(url, response, sink, progress)?;
        Ok(Fetched { metadata, bytes })
    }
}

/// Copy `source` into `sink` in chunks, polling for interrupts between reads
fn stream(
    url: &str,
    mut source: impl Read,
    sink: &mut dyn Write,
    progress: &dyn ProgressTracker,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        if interrupt::requested() {
            return Err(Error::DownloadInterrupted {
                url: url.to_string(),
            });
        }

        let bytes_read = match source.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::Download {
                    url: url.to_string(),
                    reason: format!("failed to read response: {e}"),
                });
            }
        };

        if bytes_read == 0 {
            break;
        }

        sink.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::io("Failed to write download data", e))?;

        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    Ok(downloaded)
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    if !response.status().is_success() {
        return Err(Error::Download {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    Ok(response)
}

fn download_error(url: &str, e: reqwest::Error) -> Error {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    Error::Download {
        url: url.to_string(),
        reason,
    }
}

fn metadata_from_headers(headers: &HeaderMap, content_length: Option<u64>) -> RemoteMetadata {
    RemoteMetadata {
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        content_length,
    }
}

fn local_path(url: &str) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "file" {
        return None;
    }
    parsed.to_file_path().ok()
}

fn probe_local(url: &str, path: PathBuf) -> Result<RemoteMetadata> {
    let metadata = std::fs::metadata(&path).map_err(|e| Error::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !metadata.is_file() {
        return Err(Error::Download {
            url: url.to_string(),
            reason: format!("{} is not a file", path.display()),
        });
    }
    Ok(RemoteMetadata {
        content_type: None,
        content_length: Some(metadata.len()),
    })
}
