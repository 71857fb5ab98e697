//! Region selector. Turns overlay pointer gestures into one selection.
//!
//! Pure state machine, no I/O:
//! `Idle → Selecting → Selected → (Cropping | Cancelled)`.

use serde::{Deserialize, Serialize};

/// Minimum accepted selection edge, in viewport pixels (exclusive).
pub const DEFAULT_MIN_SELECTION: f64 = 5.0;

/// Rectangle in viewport (overlay CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    /// Builds the rectangle spanned by two drag corners, in any order.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: (a.0 - b.0).abs(),
            height: (a.1 - b.1).abs(),
        }
    }

    /// The rectangle covering the whole viewport.
    pub fn full(viewport: Viewport) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: viewport.width,
            height: viewport.height,
        }
    }
}

/// Size of the overlay's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Input the overlay feeds to the selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    /// Escape key or an explicit abort from the overlay.
    Cancel,
}

impl OverlayEvent {
    /// Pins the pointer position inside `viewport`, where an on-screen
    /// pointer is confined anyway.
    pub fn clamped(self, viewport: Viewport) -> Self {
        let pin = |v: f64, max: f64| v.max(0.0).min(max.max(0.0));
        let (w, h) = (viewport.width, viewport.height);
        match self {
            OverlayEvent::PointerDown { x, y } => OverlayEvent::PointerDown {
                x: pin(x, w),
                y: pin(y, h),
            },
            OverlayEvent::PointerMove { x, y } => OverlayEvent::PointerMove {
                x: pin(x, w),
                y: pin(y, h),
            },
            OverlayEvent::PointerUp { x, y } => OverlayEvent::PointerUp {
                x: pin(x, w),
                y: pin(y, h),
            },
            OverlayEvent::Cancel => OverlayEvent::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectorState {
    Idle,
    Selecting { origin: (f64, f64), current: (f64, f64) },
    Selected(SelectionRect),
    Cropping(SelectionRect),
    Cancelled,
}

#[derive(Debug)]
pub struct RegionSelector {
    state: SelectorState,
    min_size: f64,
}

impl RegionSelector {
    pub fn new(min_size: f64) -> Self {
        Self {
            state: SelectorState::Idle,
            min_size,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SelectorState::Cropping(_) | SelectorState::Cancelled
        )
    }

    /// The rectangle being dragged right now, for live feedback.
    pub fn live_rect(&self) -> Option<SelectionRect> {
        match self.state {
            SelectorState::Selecting { origin, current } => {
                Some(SelectionRect::from_corners(origin, current))
            }
            SelectorState::Selected(rect) | SelectorState::Cropping(rect) => Some(rect),
            _ => None,
        }
    }

    /// Feeds one event. Returns the rectangle when a drag is accepted.
    pub fn handle(&mut self, event: OverlayEvent) -> Option<SelectionRect> {
        if self.is_terminal() {
            return None;
        }

        match (self.state, event) {
            (_, OverlayEvent::Cancel) => {
                self.cancel();
                None
            }
            // A new drag replaces whatever was pending.
            (_, OverlayEvent::PointerDown { x, y }) => {
                self.state = SelectorState::Selecting {
                    origin: (x, y),
                    current: (x, y),
                };
                None
            }
            (SelectorState::Selecting { origin, .. }, OverlayEvent::PointerMove { x, y }) => {
                self.state = SelectorState::Selecting {
                    origin,
                    current: (x, y),
                };
                None
            }
            (SelectorState::Selecting { origin, .. }, OverlayEvent::PointerUp { x, y }) => {
                let rect = SelectionRect::from_corners(origin, (x, y));
                if rect.width > self.min_size && rect.height > self.min_size {
                    self.state = SelectorState::Selected(rect);
                    Some(rect)
                } else {
                    log::debug!(
                        "[CAPTURE] Ignoring {:.0}x{:.0} selection below {}px",
                        rect.width,
                        rect.height,
                        self.min_size
                    );
                    self.state = SelectorState::Idle;
                    None
                }
            }
            _ => None,
        }
    }

    /// Moves an accepted selection into cropping. Yields it only once.
    pub fn begin_crop(&mut self) -> Option<SelectionRect> {
        match self.state {
            SelectorState::Selected(rect) => {
                self.state = SelectorState::Cropping(rect);
                Some(rect)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = SelectorState::Cancelled;
    }
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SELECTION)
    }
}
