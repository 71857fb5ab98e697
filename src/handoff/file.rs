use std::path::{Path, PathBuf};

/// Writes the PNG as `<dir>/snip-<unix millis>.png` and returns the path.
pub fn save_png(dir: &Path, png: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let millis = chrono::Local::now().timestamp_millis();
    let mut path = dir.join(format!("snip-{}.png", millis));
    // Two snips in the same millisecond must not overwrite each other.
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("snip-{}-{}.png", millis, suffix));
        suffix += 1;
    }

    std::fs::write(&path, png)?;
    log::info!("[HANDOFF] Saved {} bytes to {}", png.len(), path.display());
    Ok(path)
}
