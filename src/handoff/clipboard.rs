use super::HandoffError;
use std::borrow::Cow;

/// Puts the PNG on the system clipboard as an RGBA image.
pub fn copy_png(png: &[u8]) -> Result<(), HandoffError> {
    let rgba = image::load_from_memory(png)
        .map_err(|e| HandoffError::Clipboard(format!("PNG decode failed: {}", e)))?
        .to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);

    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| HandoffError::Clipboard(e.to_string()))?;
    clipboard
        .set_image(arboard::ImageData {
            width,
            height,
            bytes: Cow::Owned(rgba.into_raw()),
        })
        .map_err(|e| HandoffError::Clipboard(e.to_string()))?;

    log::info!("[HANDOFF] Copied {}x{} image to clipboard", width, height);
    Ok(())
}
