// src/progress.rs

//! Download progress reporting
//!
//! The `ProgressTracker` trait is the seam between the downloader and the
//! operator's terminal. Implementations:
//! - `CliProgress`: byte-count progress bar using indicatif
//! - `LogProgress`: periodic tracing lines, for non-interactive runs
//! - `SilentProgress`: no-op for quiet mode and tests
//!
//! Subprocess output never goes through a tracker; it lands in the build log.

use indicatif::ProgressBar;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Reported when content-length is unknown, in bytes between log lines
const UNKNOWN_LENGTH_LOG_STEP: u64 = 1024 * 1024;

/// How download progress is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyle {
    /// Interactive progress bar
    #[default]
    Bar,
    /// Progress lines through tracing
    Log,
    /// Nothing
    Silent,
}

impl ProgressStyle {
    /// Create a tracker of this style for one transfer
    pub fn tracker(self, name: &str) -> Box<dyn ProgressTracker> {
        match self {
            Self::Bar => Box::new(CliProgress::new(name)),
            Self::Log => Box::new(LogProgress::new(name)),
            Self::Silent => Box::new(SilentProgress::new()),
        }
    }
}

/// Core trait for progress tracking
pub trait ProgressTracker: Send + Sync {
    /// Set the total (length) of the transfer; 0 means unknown
    fn set_length(&self, length: u64);

    /// Set progress to a specific position
    fn set_position(&self, position: u64);

    /// Get current position
    fn position(&self) -> u64;

    /// Finish progress successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish progress with an error/abandonment message
    fn finish_with_error(&self, message: &str);
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for SilentProgress {
    fn set_length(&self, _length: u64) {}

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {}

    fn finish_with_error(&self, _message: &str) {}
}

/// Logging progress tracker
///
/// Logs roughly every 10% when the length is known, otherwise every MiB.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
        }
    }

    fn log_step(&self) -> u64 {
        match self.length.load(Ordering::Relaxed) {
            0 => UNKNOWN_LENGTH_LOG_STEP,
            length => std::cmp::max(1, length / 10),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn set_position(&self, position: u64) {
        let old = self.position.swap(position, Ordering::Relaxed);
        let step = self.log_step();
        if position / step > old / step {
            match self.length.load(Ordering::Relaxed) {
                0 => info!("{}: {} bytes", self.name, position),
                length => info!(
                    "{}: {}% ({}/{})",
                    self.name,
                    (position * 100) / length,
                    position,
                    length
                ),
            }
        }
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        info!("{}: ERROR - {}", self.name, message);
    }
}

/// Terminal progress bar
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(name: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = indicatif::ProgressStyle::with_template(
            "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(name.to_string());
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_length(&self, length: u64) {
        if length > 0 {
            self.bar.set_length(length);
        } else if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner} {msg} {bytes} ({bytes_per_sec})")
        {
            // Unknown size - show bytes downloaded without percentage
            self.bar.set_style(style);
        }
    }

    fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}
