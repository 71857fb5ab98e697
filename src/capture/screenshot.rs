//! Desktop capture host using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS. Everything that
//! touches `xcap` runs on the blocking pool.

use super::readiness::{poll_until_ready, HostUnavailable, ReadinessPolicy};
use super::source::{
    png_data_uri, CaptureHost, CaptureSource, HostError, ListOptions, SourceKind, ThumbnailSize,
    SCREEN_ID_PREFIX, WINDOW_ID_PREFIX,
};
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use xcap::{Monitor, Window};

/// Screen rectangle of a display, in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Host backed by the local display server.
///
/// Capture mode is the overlay layout: while it is on, the capture overlay
/// covers the whole primary display (see [`DesktopHost::capture_layout`]).
pub struct DesktopHost {
    capture_mode: AtomicBool,
    primary: DisplayArea,
}

impl DesktopHost {
    /// Bootstraps the host once the display server answers.
    ///
    /// Monitor enumeration can fail briefly right after login or when the
    /// process starts before the compositor; retried per `policy`.
    pub async fn connect(policy: &ReadinessPolicy) -> Result<Self, HostUnavailable> {
        let primary = poll_until_ready(policy, || match Monitor::all() {
            Ok(monitors) => {
                let area = primary_display(&monitors);
                if area.is_none() {
                    log::warn!("[SOURCES] Display server reports no usable monitor yet");
                }
                area
            }
            Err(e) => {
                log::warn!("[SOURCES] Monitor enumeration not ready: {}", e);
                None
            }
        })
        .await?;

        log::info!(
            "[SOURCES] Primary display {}x{} at {},{}",
            primary.width,
            primary.height,
            primary.x,
            primary.y
        );
        Ok(Self::with_primary(primary))
    }

    fn with_primary(primary: DisplayArea) -> Self {
        Self {
            capture_mode: AtomicBool::new(false),
            primary,
        }
    }

    /// Where a capture overlay must sit: the full primary display while
    /// capture mode is on, `None` otherwise.
    pub fn capture_layout(&self) -> Option<DisplayArea> {
        self.capture_mode
            .load(Ordering::SeqCst)
            .then_some(self.primary)
    }
}

/// The primary monitor, or the first one when none is flagged primary.
fn primary_display(monitors: &[Monitor]) -> Option<DisplayArea> {
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())?;

    let area = DisplayArea {
        x: monitor.x().ok()?,
        y: monitor.y().ok()?,
        width: monitor.width().ok()?,
        height: monitor.height().ok()?,
    };
    (area.width > 0 && area.height > 0).then_some(area)
}

impl CaptureHost for DesktopHost {
    async fn list_sources(&self, options: &ListOptions) -> Result<Vec<CaptureSource>, HostError> {
        let start = std::time::Instant::now();
        let options = options.clone();

        let sources = tokio::task::spawn_blocking(move || enumerate(&options))
            .await
            .map_err(|e| HostError::Enumeration(format!("enumeration task failed: {}", e)))??;

        log::info!(
            "[SOURCES] Enumerated {} sources in {}ms",
            sources.len(),
            start.elapsed().as_millis()
        );
        Ok(sources)
    }

    fn set_capture_mode(&self, enabled: bool) {
        self.capture_mode.store(enabled, Ordering::SeqCst);
        if enabled {
            log::info!(
                "[CAPTURE] Capture mode on: overlay covers {}x{} at {},{}",
                self.primary.width,
                self.primary.height,
                self.primary.x,
                self.primary.y
            );
        } else {
            log::info!("[CAPTURE] Capture mode off");
        }
    }
}

fn enumerate(options: &ListOptions) -> Result<Vec<CaptureSource>, HostError> {
    let mut sources = Vec::new();
    if options.wants(SourceKind::Screen) {
        sources.extend(enumerate_screens(options)?);
    }
    if options.wants(SourceKind::Window) {
        sources.extend(enumerate_windows(options)?);
    }
    Ok(sources)
}

fn enumerate_screens(options: &ListOptions) -> Result<Vec<CaptureSource>, HostError> {
    let mut monitors =
        Monitor::all().map_err(|e| HostError::Enumeration(format!("monitors: {}", e)))?;

    // Primary first; otherwise keep the OS order.
    monitors.sort_by_key(|m| !m.is_primary().unwrap_or(false));
    let single = monitors.len() == 1;

    monitors
        .iter()
        .enumerate()
        .map(|(index, monitor)| {
            let id = format!(
                "{}{}",
                SCREEN_ID_PREFIX,
                monitor.id().unwrap_or(index as u32)
            );
            let name = if single {
                "Entire screen".to_string()
            } else {
                let label = monitor.name().unwrap_or_default();
                format!("Screen {} ({})", index + 1, label)
            };

            let thumbnail = if options.fetch_thumbnail {
                let image = monitor.capture_image().map_err(|e| HostError::Thumbnail {
                    source_id: id.clone(),
                    reason: e.to_string(),
                })?;
                if image.width() == 0 || image.height() == 0 {
                    return Err(HostError::PermissionDenied(format!(
                        "{} captured as an empty image",
                        id
                    )));
                }
                Some(thumbnail_uri(image, options.thumbnail_size, &id)?)
            } else {
                None
            };

            Ok(CaptureSource {
                id,
                name,
                thumbnail,
            })
        })
        .collect()
}

fn enumerate_windows(options: &ListOptions) -> Result<Vec<CaptureSource>, HostError> {
    let windows = Window::all().map_err(|e| HostError::Enumeration(format!("windows: {}", e)))?;

    let mut sources = Vec::new();
    for window in windows {
        if window.is_minimized().unwrap_or(false) {
            continue;
        }
        let title = window.title().unwrap_or_default();
        if title.trim().is_empty() {
            continue;
        }
        let Ok(window_id) = window.id() else {
            continue;
        };
        let id = format!("{}{}", WINDOW_ID_PREFIX, window_id);

        // A window that vanished mid-enumeration keeps its entry, without preview.
        let thumbnail = if options.fetch_thumbnail {
            match window.capture_image() {
                Ok(image) if image.width() > 0 && image.height() > 0 => {
                    Some(thumbnail_uri(image, options.thumbnail_size, &id)?)
                }
                Ok(_) => None,
                Err(e) => {
                    log::warn!("[SOURCES] No preview for {} ({}): {}", id, title, e);
                    None
                }
            }
        } else {
            None
        };

        sources.push(CaptureSource {
            id,
            name: title,
            thumbnail,
        });
    }

    Ok(sources)
}

/// Scales a capture to fit within `size` and wraps it as a PNG data URI.
fn thumbnail_uri(image: RgbaImage, size: ThumbnailSize, id: &str) -> Result<String, HostError> {
    let full = DynamicImage::ImageRgba8(image);
    let fitted = if full.width() > size.width || full.height() > size.height {
        full.resize(size.width, size.height, FilterType::Triangle)
    } else {
        full
    };

    let mut png_bytes: Vec<u8> = Vec::new();
    fitted
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| HostError::Thumbnail {
            source_id: id.to_string(),
            reason: format!("PNG encoding failed: {}", e),
        })?;

    log::debug!(
        "[SOURCES] Thumbnail for {}: {}x{} ({} bytes)",
        id,
        fitted.width(),
        fitted.height(),
        png_bytes.len()
    );

    Ok(png_data_uri(&png_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::source::select_primary_screen;

    #[test]
    fn thumbnail_fits_requested_size() {
        let image = RgbaImage::new(400, 200);
        let uri = thumbnail_uri(image, ThumbnailSize { width: 100, height: 100 }, "screen:0").unwrap();
        let bytes = crate::capture::source::decode_data_uri(&uri).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn small_captures_are_not_upscaled() {
        let image = RgbaImage::new(40, 30);
        let uri = thumbnail_uri(image, ThumbnailSize::default(), "window:3").unwrap();
        let bytes = crate::capture::source::decode_data_uri(&uri).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn capture_layout_follows_capture_mode() {
        let display = DisplayArea {
            x: 0,
            y: 0,
            width: 2560,
            height: 1440,
        };
        let host = DesktopHost::with_primary(display);
        assert_eq!(host.capture_layout(), None);

        host.set_capture_mode(true);
        assert_eq!(host.capture_layout(), Some(display));

        host.set_capture_mode(false);
        assert_eq!(host.capture_layout(), None);
    }

    #[tokio::test]
    #[ignore = "requires graphical display and screen recording permissions"]
    async fn desktop_lists_a_primary_screen() {
        let host = DesktopHost::connect(&ReadinessPolicy::default()).await.unwrap();
        let sources = host.list_sources(&ListOptions::default()).await.unwrap();
        let primary = select_primary_screen(&sources).expect("no screen found");
        assert!(primary.id.starts_with("screen:"));
        assert!(primary.thumbnail.is_some());
    }
}
