// src/fetch/interrupt.rs

//! SIGINT handling for in-flight transfers
//!
//! While an [`InterruptGuard`] is alive, Ctrl-C sets a flag instead of
//! killing the process. The transfer loop polls [`requested`] between chunks
//! and unwinds through the downloader, which removes the partial file.
//! Dropping the guard restores the previous disposition, so build
//! subprocesses see default signal behaviour.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// True once SIGINT arrived while a guard was installed
pub fn requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Scoped SIGINT handler
pub struct InterruptGuard {
    previous: Option<SigAction>,
}

impl InterruptGuard {
    /// Install the handler; failure to install only loses Ctrl-C cleanup
    pub fn install() -> Self {
        INTERRUPTED.store(false, Ordering::SeqCst);
        let action = SigAction::new(
            SigHandler::Handler(on_sigint),
            SaFlags::empty(),
            SigSet::empty(),
        );

        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = match unsafe { sigaction(Signal::SIGINT, &action) } {
            Ok(previous) => Some(previous),
            Err(e) => {
                warn!("Failed to install SIGINT handler: {}", e);
                None
            }
        };

        Self { previous }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // SAFETY: restores the disposition that was active before install().
            if let Err(e) = unsafe { sigaction(Signal::SIGINT, &previous) } {
                warn!("Failed to restore SIGINT handler: {}", e);
            }
        }
        INTERRUPTED.store(false, Ordering::SeqCst);
    }
}
