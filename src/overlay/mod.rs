//! Selection overlays: where the user's drag gesture comes from.
//!
//! An overlay shows the acquired image full-screen and streams pointer and
//! keyboard events back over a channel. A closed channel means the overlay
//! went away, which the session treats as teardown.

#[cfg(feature = "overlay")]
mod window;

#[cfg(feature = "overlay")]
pub use window::{window_overlay, OverlayWindows, WindowOverlay};

use crate::capture::{AcquiredImage, OverlayEvent, SelectionRect, Viewport};
use tokio::sync::mpsc;

/// Live overlay: its coordinate space and its event stream.
pub struct OverlayChannel {
    pub viewport: Viewport,
    pub events: mpsc::Receiver<OverlayEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay window could not be opened: {0}")]
    Window(String),

    #[error("Overlay viewport {0}x{1} is empty")]
    EmptyViewport(f64, f64),
}

pub trait OverlayHost {
    /// Shows `image` stretched over the overlay and starts listening for input.
    fn present(&mut self, image: &AcquiredImage) -> Result<OverlayChannel, OverlayError>;
}

/// Replays a single drag over a fixed rectangle, for non-interactive use.
pub struct ScriptedOverlay {
    selection: Option<SelectionRect>,
    viewport: Option<Viewport>,
}

impl ScriptedOverlay {
    /// `viewport` defaults to the image's native size (one viewport pixel per
    /// bitmap pixel). A `None` selection replays an Escape press.
    pub fn new(selection: Option<SelectionRect>, viewport: Option<Viewport>) -> Self {
        Self {
            selection,
            viewport,
        }
    }

    fn script(&self) -> Vec<OverlayEvent> {
        match self.selection {
            Some(rect) => vec![
                OverlayEvent::PointerDown {
                    x: rect.x,
                    y: rect.y,
                },
                OverlayEvent::PointerMove {
                    x: rect.x + rect.width,
                    y: rect.y + rect.height,
                },
                OverlayEvent::PointerUp {
                    x: rect.x + rect.width,
                    y: rect.y + rect.height,
                },
            ],
            None => vec![OverlayEvent::Cancel],
        }
    }
}

impl OverlayHost for ScriptedOverlay {
    fn present(&mut self, image: &AcquiredImage) -> Result<OverlayChannel, OverlayError> {
        let viewport = self.viewport.unwrap_or_else(|| {
            Viewport::new(image.natural_width() as f64, image.natural_height() as f64)
        });
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Err(OverlayError::EmptyViewport(viewport.width, viewport.height));
        }

        let script = self.script();
        let (tx, rx) = mpsc::channel(script.len());
        for event in script {
            // Capacity matches the script length, so this never fills up.
            let _ = tx.try_send(event);
        }

        Ok(OverlayChannel {
            viewport,
            events: rx,
        })
    }
}

/// Parses `X,Y,W,H` into a selection rectangle.
pub fn parse_selection(value: &str) -> Result<SelectionRect, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid selection '{}': {}", value, e))?;

    match parts.as_slice() {
        [x, y, width, height] if *width >= 0.0 && *height >= 0.0 => Ok(SelectionRect {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => Err(format!(
            "invalid selection '{}': expected X,Y,W,H with non-negative size",
            value
        )),
    }
}

/// Parses `WxH` into a viewport.
pub fn parse_viewport(value: &str) -> Result<Viewport, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid viewport '{}': expected WxH", value))?;
    let width: f64 = w
        .trim()
        .parse()
        .map_err(|e| format!("invalid viewport width '{}': {}", w, e))?;
    let height: f64 = h
        .trim()
        .parse()
        .map_err(|e| format!("invalid viewport height '{}': {}", h, e))?;

    if width <= 0.0 || height <= 0.0 {
        return Err(format!("invalid viewport '{}': size must be positive", value));
    }
    Ok(Viewport::new(width, height))
}
