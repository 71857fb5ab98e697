//! Image acquirer: decodes a source thumbnail into a bitmap.

use super::source::{decode_data_uri, CaptureSource, DataUriError};
use image::RgbaImage;

/// A decoded capture preview at its native pixel resolution.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub source_id: String,
    pub pixels: RgbaImage,
}

impl AcquiredImage {
    pub fn new(source_id: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            source_id: source_id.into(),
            pixels,
        }
    }

    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Source {0} carries no thumbnail")]
    MissingThumbnail(String),

    #[error("Thumbnail of {source_id} is not a usable data URI: {reason}")]
    DataUri {
        source_id: String,
        reason: DataUriError,
    },

    #[error("Thumbnail of {source_id} failed to decode: {reason}")]
    Image { source_id: String, reason: String },

    #[error("Thumbnail of {0} decoded to an empty bitmap")]
    Empty(String),

    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Decodes the thumbnail synchronously. Used by [`load`] on the blocking pool.
pub fn decode_thumbnail(source: &CaptureSource) -> Result<AcquiredImage, DecodeError> {
    let uri = source
        .thumbnail
        .as_deref()
        .ok_or_else(|| DecodeError::MissingThumbnail(source.id.clone()))?;

    let bytes = decode_data_uri(uri).map_err(|reason| DecodeError::DataUri {
        source_id: source.id.clone(),
        reason,
    })?;

    let pixels = image::load_from_memory(&bytes)
        .map_err(|e| DecodeError::Image {
            source_id: source.id.clone(),
            reason: e.to_string(),
        })?
        .to_rgba8();

    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(DecodeError::Empty(source.id.clone()));
    }

    Ok(AcquiredImage::new(source.id.clone(), pixels))
}

/// Loads the source's thumbnail into an [`AcquiredImage`].
///
/// Suspends until the decode finishes on the blocking pool. Failures are
/// returned as-is; the caller decides to cancel, nothing is retried here.
pub async fn load(source: &CaptureSource) -> Result<AcquiredImage, DecodeError> {
    let start = std::time::Instant::now();
    let owned = source.clone();

    let image = tokio::task::spawn_blocking(move || decode_thumbnail(&owned))
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))??;

    log::info!(
        "[CAPTURE] Thumbnail of {} decoded ({}x{}) in {}ms",
        source.id,
        image.natural_width(),
        image.natural_height(),
        start.elapsed().as_millis()
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::source::png_data_uri;
    use image::{DynamicImage, ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_source(width: u32, height: u32) -> CaptureSource {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 8, 7, 255])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        CaptureSource {
            id: "screen:0".into(),
            name: "Screen 1".into(),
            thumbnail: Some(png_data_uri(&bytes)),
        }
    }

    #[tokio::test]
    async fn loads_native_resolution() {
        let image = load(&png_source(64, 36)).await.unwrap();
        assert_eq!(image.natural_width(), 64);
        assert_eq!(image.natural_height(), 36);
        assert_eq!(image.pixels.get_pixel(3, 3), &Rgba([9, 8, 7, 255]));
        assert_eq!(image.source_id, "screen:0");
    }

    #[tokio::test]
    async fn missing_thumbnail_is_decode_error() {
        let mut source = png_source(4, 4);
        source.thumbnail = None;
        assert!(matches!(load(&source).await, Err(DecodeError::MissingThumbnail(_))));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let mut source = png_source(4, 4);
        source.thumbnail = Some(png_data_uri(b"definitely not a png"));
        assert!(matches!(decode_thumbnail(&source), Err(DecodeError::Image { .. })));
    }

    #[test]
    fn malformed_uri_fails() {
        let mut source = png_source(4, 4);
        source.thumbnail = Some("data:image/png;base64,@@@".into());
        assert!(matches!(decode_thumbnail(&source), Err(DecodeError::DataUri { .. })));
    }
}
