//! Capture session — one strictly sequential run of the pipeline.
//!
//! readiness → capture mode → settle → enumerate → acquire →
//! select (area) or whole viewport (full) → crop → handoff.
//!
//! Every suspension point is raced against the session's own token and the
//! token is checked again before a late result is used. Capture mode is held
//! by a guard, so it is released on every path, including the run future
//! being dropped mid-flight.

use super::acquire::{self, AcquiredImage, DecodeError};
use super::cancel::SessionToken;
use super::mode;
use super::readiness::{HostSlot, HostUnavailable, ReadinessPolicy};
use super::region::{self, CropError, EncodedImage};
use super::selector::{RegionSelector, SelectionRect, SelectorState, Viewport, DEFAULT_MIN_SELECTION};
use super::source::{select_primary_screen, CaptureHost, HostError, ListOptions};
use crate::overlay::{OverlayChannel, OverlayError, OverlayHost};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub list_options: ListOptions,
    /// Wait after entering capture mode before enumerating sources.
    pub settle_delay: Duration,
    pub readiness: ReadinessPolicy,
    pub min_selection: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            list_options: ListOptions::default(),
            settle_delay: Duration::from_millis(100),
            readiness: ReadinessPolicy::default(),
            min_selection: DEFAULT_MIN_SELECTION,
        }
    }
}

/// Terminal failures. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    HostUnavailable(#[from] HostUnavailable),

    #[error(transparent)]
    SourceListing(#[from] HostError),

    #[error("No capture source found")]
    NoSourceFound,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error(transparent)]
    Encode(#[from] CropError),
}

impl SessionError {
    /// Pipeline stage the error came from, for logs and notifications.
    pub fn stage(&self) -> &'static str {
        match self {
            SessionError::HostUnavailable(_) => "host",
            SessionError::SourceListing(_) | SessionError::NoSourceFound => "enumerate",
            SessionError::Decode(_) => "acquire",
            SessionError::Overlay(_) => "select",
            SessionError::Encode(_) => "crop",
        }
    }
}

/// Why a session produced no image.
#[derive(Debug, thiserror::Error)]
pub enum CancelReason {
    /// Escape, an explicit abort, or the session token.
    #[error("Capture cancelled")]
    User,

    /// The overlay went away before a selection was made.
    #[error("Capture overlay closed before a region was selected")]
    Teardown,

    #[error("Capture failed: {0}")]
    Failed(#[from] SessionError),
}

/// Receives the outcome of a session. Exactly one method is called per run.
pub trait CaptureSink {
    fn on_capture(&mut self, image: EncodedImage);
    fn on_cancel(&mut self, reason: &CancelReason);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub source_id: String,
    pub width: u32,
    pub height: u32,
    pub png_bytes: usize,
}

pub struct CaptureSession<'a, H: CaptureHost> {
    id: u64,
    slot: &'a HostSlot<H>,
    config: SessionConfig,
    token: SessionToken,
}

impl<'a, H: CaptureHost> CaptureSession<'a, H> {
    pub fn new(slot: &'a HostSlot<H>, config: SessionConfig) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            slot,
            config,
            token: SessionToken::new(),
        }
    }

    /// Handle for cancelling this session from elsewhere (Ctrl-C, UI button).
    pub fn token(&self) -> SessionToken {
        self.token.clone()
    }

    /// Area capture: the user drags a rectangle on `overlay`.
    pub async fn run_area<O, S>(
        self,
        overlay: &mut O,
        sink: &mut S,
    ) -> Result<CaptureSummary, CancelReason>
    where
        O: OverlayHost + Send,
        S: CaptureSink,
    {
        log::info!("[CAPTURE] Session {} started (area)", self.id);
        let overlay: &mut (dyn OverlayHost + Send) = overlay;
        let result = self.pipeline(Some(overlay)).await;
        self.finish(result, sink)
    }

    /// Full-screen capture: the whole viewport is the selection.
    pub async fn run_full<S: CaptureSink>(self, sink: &mut S) -> Result<CaptureSummary, CancelReason> {
        log::info!("[CAPTURE] Session {} started (full screen)", self.id);
        let result = self.pipeline(None).await;
        self.finish(result, sink)
    }

    async fn pipeline(
        &self,
        overlay: Option<&mut (dyn OverlayHost + Send)>,
    ) -> Result<(String, EncodedImage), CancelReason> {
        let start = std::time::Instant::now();

        let host = self
            .guarded(self.slot.ready(&self.config.readiness))
            .await?
            .map_err(SessionError::from)?;

        let capture_mode = mode::enter(host.as_ref());
        self.guarded(capture_mode.settle(self.config.settle_delay))
            .await?;

        let sources = self
            .guarded(host.list_sources(&self.config.list_options))
            .await?
            .map_err(SessionError::from)?;
        log::info!("[CAPTURE] Session {}: {} sources", self.id, sources.len());

        let source = select_primary_screen(&sources).ok_or(SessionError::NoSourceFound)?;
        log::info!(
            "[CAPTURE] Session {}: selected source {} ({})",
            self.id,
            source.name,
            source.id
        );

        let image = self
            .guarded(acquire::load(source))
            .await?
            .map_err(SessionError::from)?;

        let (rect, viewport) = match overlay {
            Some(overlay) => self.select(overlay, &image).await?,
            None => {
                let viewport = Viewport::new(
                    image.natural_width() as f64,
                    image.natural_height() as f64,
                );
                (SelectionRect::full(viewport), viewport)
            }
        };

        let encoded = self
            .guarded(region::crop(&image, rect, viewport))
            .await?
            .map_err(SessionError::from)?;

        capture_mode.exit();
        log::info!(
            "[CAPTURE] Session {} captured {}x{} from {} in {}ms",
            self.id,
            encoded.width,
            encoded.height,
            source.id,
            start.elapsed().as_millis()
        );

        Ok((source.id.clone(), encoded))
    }

    /// Shows the overlay and waits for one accepted selection.
    async fn select(
        &self,
        overlay: &mut (dyn OverlayHost + Send),
        image: &AcquiredImage,
    ) -> Result<(SelectionRect, Viewport), CancelReason> {
        let OverlayChannel {
            viewport,
            mut events,
        } = overlay.present(image).map_err(SessionError::from)?;
        let mut selector = RegionSelector::new(self.config.min_selection);

        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    selector.cancel();
                    return Err(CancelReason::User);
                }
                event = events.recv() => event,
            };

            let Some(event) = event else {
                selector.cancel();
                log::info!("[CAPTURE] Session {}: overlay closed", self.id);
                return Err(CancelReason::Teardown);
            };

            selector.handle(event.clamped(viewport));
            if let Some(rect) = selector.begin_crop() {
                return Ok((rect, viewport));
            }
            if matches!(selector.state(), SelectorState::Cancelled) {
                log::info!("[CAPTURE] Session {}: selection aborted", self.id);
                return Err(CancelReason::User);
            }
        }
    }

    /// Awaits `step` unless the session is cancelled first; a result that
    /// arrives after cancellation is discarded.
    async fn guarded<F: Future>(&self, step: F) -> Result<F::Output, CancelReason> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CancelReason::User),
            output = step => {
                if self.token.is_cancelled() {
                    Err(CancelReason::User)
                } else {
                    Ok(output)
                }
            }
        }
    }

    fn finish<S: CaptureSink>(
        &self,
        result: Result<(String, EncodedImage), CancelReason>,
        sink: &mut S,
    ) -> Result<CaptureSummary, CancelReason> {
        match result {
            Ok((source_id, encoded)) => {
                let summary = CaptureSummary {
                    source_id,
                    width: encoded.width,
                    height: encoded.height,
                    png_bytes: encoded.png.len(),
                };
                sink.on_capture(encoded);
                Ok(summary)
            }
            Err(reason) => {
                match &reason {
                    CancelReason::Failed(err) => log::error!(
                        "[CAPTURE] Session {} failed at {}: {}",
                        self.id,
                        err.stage(),
                        err
                    ),
                    other => log::info!("[CAPTURE] Session {} ended: {}", self.id, other),
                }
                sink.on_cancel(&reason);
                Err(reason)
            }
        }
    }
}
