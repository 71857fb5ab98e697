//! Interactive selection window built on `minifb`.
//!
//! Shows the capture preview stretched over the primary display and dimmed;
//! the live drag rectangle is drawn at full brightness with an outline.
//! Left-drag selects, Escape cancels, closing the window tears the overlay
//! down.
//!
//! Windows have to be created and pumped on the main thread (AppKit
//! requires it), so the overlay comes in two halves: [`WindowOverlay`] is
//! what the session presents on, and [`OverlayWindows`] opens and runs each
//! requested window on the thread that calls [`OverlayWindows::run`].

use super::{OverlayChannel, OverlayError, OverlayHost};
use crate::capture::{
    AcquiredImage, DesktopHost, DisplayArea, HostSlot, OverlayEvent, RegionSelector,
    SelectionRect, Viewport,
};
use image::{imageops::FilterType, RgbaImage};
use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};
use std::sync::{mpsc as std_mpsc, Arc};
use tokio::sync::mpsc;

const TITLE: &str = "snipchat: drag to select, Esc to cancel";
const FALLBACK_MAX_SIZE: (u32, u32) = (1600, 900);
const OUTLINE: u32 = 0x00_3B_82_F6;
const DIM_PERCENT: u32 = 60;

struct WindowRequest {
    preview: RgbaImage,
    area: DisplayArea,
    events: mpsc::Sender<OverlayEvent>,
    opened: std_mpsc::Sender<Result<(), String>>,
}

/// Session side of the window overlay.
pub struct WindowOverlay {
    size: Option<(u32, u32)>,
    host: Arc<HostSlot<DesktopHost>>,
    requests: std_mpsc::Sender<WindowRequest>,
}

/// Main-thread side: owns every overlay window.
pub struct OverlayWindows {
    requests: std_mpsc::Receiver<WindowRequest>,
}

/// Creates both halves. `size` forces the window size; otherwise the
/// window covers the area the host reports for capture mode.
pub fn window_overlay(
    size: Option<(u32, u32)>,
    host: Arc<HostSlot<DesktopHost>>,
) -> (WindowOverlay, OverlayWindows) {
    let (tx, rx) = std_mpsc::channel();
    (
        WindowOverlay {
            size,
            host,
            requests: tx,
        },
        OverlayWindows { requests: rx },
    )
}

impl OverlayHost for WindowOverlay {
    fn present(&mut self, image: &AcquiredImage) -> Result<OverlayChannel, OverlayError> {
        let layout = self.host.current().and_then(|host| host.capture_layout());
        let area = placement(
            self.size,
            layout,
            (image.natural_width(), image.natural_height()),
        );
        if area.width == 0 || area.height == 0 {
            return Err(OverlayError::EmptyViewport(
                area.width as f64,
                area.height as f64,
            ));
        }

        let preview =
            image::imageops::resize(&image.pixels, area.width, area.height, FilterType::Triangle);
        let (tx, rx) = mpsc::channel(64);
        let (opened_tx, opened_rx) = std_mpsc::channel();

        self.requests
            .send(WindowRequest {
                preview,
                area,
                events: tx,
                opened: opened_tx,
            })
            .map_err(|_| OverlayError::Window("no thread is running overlay windows".to_string()))?;

        opened_rx
            .recv()
            .map_err(|e| OverlayError::Window(e.to_string()))?
            .map_err(OverlayError::Window)?;

        log::info!(
            "[CAPTURE] Overlay window opened ({}x{} at {},{})",
            area.width,
            area.height,
            area.x,
            area.y
        );

        Ok(OverlayChannel {
            viewport: Viewport::new(area.width as f64, area.height as f64),
            events: rx,
        })
    }
}

impl OverlayWindows {
    /// Opens and pumps requested windows until every [`WindowOverlay`] is
    /// gone. Call from the main thread.
    pub fn run(self) {
        while let Ok(request) = self.requests.recv() {
            open_window(request);
        }
    }
}

fn open_window(request: WindowRequest) {
    let WindowRequest {
        preview,
        area,
        events,
        opened,
    } = request;

    let window = Window::new(
        TITLE,
        area.width as usize,
        area.height as usize,
        WindowOptions {
            borderless: true,
            topmost: true,
            ..WindowOptions::default()
        },
    );

    match window {
        Ok(mut window) => {
            window.set_position(area.x as isize, area.y as isize);
            let _ = opened.send(Ok(()));
            run_window(window, &preview, events);
        }
        Err(e) => {
            log::error!("[CAPTURE] Overlay window failed: {}", e);
            let _ = opened.send(Err(e.to_string()));
        }
    }
}

/// Window geometry: a forced size, else the capture-mode layout, else the
/// preview scaled down to fit a regular window.
fn placement(
    size: Option<(u32, u32)>,
    layout: Option<DisplayArea>,
    natural: (u32, u32),
) -> DisplayArea {
    if let Some((width, height)) = size {
        return DisplayArea {
            x: 0,
            y: 0,
            width,
            height,
        };
    }
    if let Some(area) = layout {
        return area;
    }

    let (w, h) = natural;
    let scale = (FALLBACK_MAX_SIZE.0 as f64 / w.max(1) as f64)
        .min(FALLBACK_MAX_SIZE.1 as f64 / h.max(1) as f64)
        .min(1.0);
    DisplayArea {
        x: 0,
        y: 0,
        width: ((w as f64 * scale).round() as u32).max(1),
        height: ((h as f64 * scale).round() as u32).max(1),
    }
}

/// Event/render loop; returns when the window closes or the session stops
/// listening.
fn run_window(mut window: Window, preview: &RgbaImage, tx: mpsc::Sender<OverlayEvent>) {
    let (width, height) = (preview.width() as usize, preview.height() as usize);
    let bright: Vec<u32> = preview
        .pixels()
        .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32)
        .collect();
    let dimmed: Vec<u32> = bright.iter().map(|&c| dim(c)).collect();
    let mut frame = dimmed.clone();

    // Mirror of the session's selector, used only for live feedback.
    let mut feedback = RegionSelector::default();
    let mut was_down = false;
    let mut last_pos = None;

    window.set_target_fps(60);

    while window.is_open() && !tx.is_closed() {
        if window.is_key_down(Key::Escape) {
            let _ = tx.blocking_send(OverlayEvent::Cancel);
            break;
        }

        let pos = window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| (x as f64, y as f64));
        let down = window.get_mouse_down(MouseButton::Left);

        let event = match (was_down, down, pos) {
            (false, true, Some((x, y))) => Some(OverlayEvent::PointerDown { x, y }),
            (true, true, Some((x, y))) if pos != last_pos => {
                Some(OverlayEvent::PointerMove { x, y })
            }
            (true, false, Some((x, y))) => Some(OverlayEvent::PointerUp { x, y }),
            _ => None,
        };
        was_down = down;
        last_pos = pos;

        if let Some(event) = event {
            feedback.handle(event);
            if tx.blocking_send(event).is_err() {
                break;
            }
        }

        frame.copy_from_slice(&dimmed);
        if let Some(rect) = feedback.live_rect() {
            highlight(&mut frame, &bright, width, height, &rect);
        }

        if window.update_with_buffer(&frame, width, height).is_err() {
            log::warn!("[CAPTURE] Overlay window stopped accepting frames");
            break;
        }
    }
}

fn dim(color: u32) -> u32 {
    let channel = |shift: u32| (((color >> shift) & 0xFF) * DIM_PERCENT / 100) << shift;
    channel(16) | channel(8) | channel(0)
}

fn highlight(frame: &mut [u32], bright: &[u32], width: usize, height: usize, rect: &SelectionRect) {
    let x0 = (rect.x.max(0.0) as usize).min(width);
    let y0 = (rect.y.max(0.0) as usize).min(height);
    let x1 = ((rect.x + rect.width).max(0.0) as usize).min(width);
    let y1 = ((rect.y + rect.height).max(0.0) as usize).min(height);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0..y1 {
        let row = y * width;
        frame[row + x0..row + x1].copy_from_slice(&bright[row + x0..row + x1]);
        frame[row + x0] = OUTLINE;
        frame[row + x1 - 1] = OUTLINE;
    }
    for x in x0..x1 {
        frame[y0 * width + x] = OUTLINE;
        frame[(y1 - 1) * width + x] = OUTLINE;
    }
}
