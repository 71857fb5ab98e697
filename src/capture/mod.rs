//! Screen capture domain — public API.
//!
//! This module owns the region-capture pipeline: source enumeration,
//! capture mode, region selection, image acquisition and cropping.
//! External code should only use the items exported here.

mod acquire;
mod cancel;
mod mode;
mod readiness;
mod region;
mod screenshot;
mod selector;
mod session;
mod source;

pub use acquire::{AcquiredImage, DecodeError};
pub use cancel::SessionToken;
pub use readiness::{poll_until_ready, HostSlot, HostUnavailable, ReadinessPolicy};
pub use region::{crop, crop_to_png, to_bitmap_space, BitmapRect, CropError, EncodedImage};
pub use screenshot::{DesktopHost, DisplayArea};
pub use selector::{
    OverlayEvent, RegionSelector, SelectionRect, SelectorState, Viewport, DEFAULT_MIN_SELECTION,
};
pub use session::{
    CancelReason, CaptureSession, CaptureSink, CaptureSummary, SessionConfig, SessionError,
};
pub use source::{
    decode_data_uri, png_data_uri, select_primary_screen, CaptureHost, CaptureSource,
    DataUriError, HostError, ListOptions, SourceKind, ThumbnailSize,
};
