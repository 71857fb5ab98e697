//! Pure region cropping logic — functional core.
//!
//! Maps a viewport-space selection onto the acquired bitmap and extracts
//! it as PNG. No infrastructure here: pixels in, PNG bytes out.

use super::acquire::AcquiredImage;
use super::selector::{SelectionRect, Viewport};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// A crop result, ready for the chat/OCR handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Selection mapped into bitmap pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Scales a viewport rectangle into the bitmap's pixel space.
///
/// Each axis is scaled independently (`native / viewport`). No aspect
/// correction: a thumbnail with a different aspect ratio than the viewport
/// is stretched, matching what the overlay displayed.
pub fn to_bitmap_space(
    rect: &SelectionRect,
    viewport: Viewport,
    natural: (u32, u32),
) -> Result<BitmapRect, CropError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(viewport.width) || !valid(viewport.height) {
        return Err(CropError::InvalidViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let scale_x = natural.0 as f64 / viewport.width;
    let scale_y = natural.1 as f64 / viewport.height;

    let width = (rect.width * scale_x).round();
    let height = (rect.height * scale_y).round();
    if !(width >= 1.0 && height >= 1.0) {
        return Err(CropError::ZeroDimension);
    }

    Ok(BitmapRect {
        x: (rect.x * scale_x).round() as i64,
        y: (rect.y * scale_y).round() as i64,
        width: width as u32,
        height: height as u32,
    })
}

/// Copies `area` out of `pixels` onto a transparent canvas of the same size.
///
/// Parts of `area` outside the bitmap stay transparent, like drawing a
/// partially off-image source rectangle onto an empty canvas.
pub fn extract(pixels: &RgbaImage, area: BitmapRect) -> RgbaImage {
    let mut canvas = RgbaImage::new(area.width, area.height);
    image::imageops::replace(&mut canvas, pixels, -area.x, -area.y);
    canvas
}

/// Crops the selection out of the acquired image and returns PNG bytes.
///
/// This is a pure function with no side effects.
///
/// # Arguments
/// * `image` - The decoded capture preview
/// * `rect` - The user's selection, in viewport coordinates
/// * `viewport` - Size of the overlay the selection was drawn on
///
/// # Returns
/// PNG of `round(rect.width * scaleX) x round(rect.height * scaleY)` pixels
pub fn crop_to_png(
    image: &AcquiredImage,
    rect: &SelectionRect,
    viewport: Viewport,
) -> Result<EncodedImage, CropError> {
    let area = to_bitmap_space(
        rect,
        viewport,
        (image.natural_width(), image.natural_height()),
    )?;

    let cropped = extract(&image.pixels, area);

    let mut png: Vec<u8> = Vec::new();
    DynamicImage::ImageRgba8(cropped)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(EncodedImage {
        png,
        width: area.width,
        height: area.height,
    })
}

/// Runs [`crop_to_png`] on the blocking pool.
pub async fn crop(
    image: &AcquiredImage,
    rect: SelectionRect,
    viewport: Viewport,
) -> Result<EncodedImage, CropError> {
    let start = std::time::Instant::now();
    let owned = image.clone();

    let encoded = tokio::task::spawn_blocking(move || crop_to_png(&owned, &rect, viewport))
        .await
        .map_err(|e| CropError::EncodingFailed(format!("crop task failed: {}", e)))??;

    log::info!(
        "[CROP] Cropped {:.0}x{:.0} at {:.0},{:.0} (viewport {:.0}x{:.0}) to {}x{} in {}ms — {} bytes",
        rect.width,
        rect.height,
        rect.x,
        rect.y,
        viewport.width,
        viewport.height,
        encoded.width,
        encoded.height,
        start.elapsed().as_millis(),
        encoded.png.len()
    );

    Ok(encoded)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error("Viewport {width}x{height} is not a positive size")]
    InvalidViewport { width: f64, height: f64 },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}
