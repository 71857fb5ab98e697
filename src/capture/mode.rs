//! Capture-mode controller.
//!
//! Entering capture mode hands back a guard; dropping the guard leaves
//! capture mode. Every exit path of a session (completion, cancel, error,
//! or the session future being dropped) therefore releases it exactly once.

use super::source::CaptureHost;
use std::time::Duration;

pub struct CaptureModeGuard<'a, H: CaptureHost> {
    host: &'a H,
    released: bool,
}

/// Switches the host into capture layout and returns the release guard.
pub fn enter<H: CaptureHost>(host: &H) -> CaptureModeGuard<'_, H> {
    log::info!("[CAPTURE] Entering capture mode");
    host.set_capture_mode(true);
    CaptureModeGuard {
        host,
        released: false,
    }
}

impl<H: CaptureHost> CaptureModeGuard<'_, H> {
    /// Waits for the host window to finish re-laying out.
    ///
    /// The mode toggle carries no confirmation, so the pipeline sleeps a fixed
    /// delay before capturing rather than assuming the window already moved.
    pub async fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Leaves capture mode now instead of at drop.
    pub fn exit(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.host.set_capture_mode(false);
        log::info!("[CAPTURE] Left capture mode");
    }
}

impl<H: CaptureHost> Drop for CaptureModeGuard<'_, H> {
    fn drop(&mut self) {
        self.release();
    }
}
