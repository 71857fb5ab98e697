//! Capture sources and the host boundary that enumerates them.
//!
//! The host (desktop integration, or a fake in tests) owns enumeration and
//! the capture-mode toggle. This module owns the pure parts: the source
//! types, the data-URI thumbnail format, and primary-screen selection.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Id prefix the host uses for whole-display sources.
pub const SCREEN_ID_PREFIX: &str = "screen:";
/// Id prefix the host uses for application window sources.
pub const WINDOW_ID_PREFIX: &str = "window:";

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";
const SCREEN_NAME_KEYWORDS: [&str; 2] = ["screen", "entire"];

/// An OS-enumerable screen or window that can be captured as an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
    /// Preview bitmap as a `data:image/png;base64,...` URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl CaptureSource {
    pub fn is_screen(&self) -> bool {
        self.id.to_lowercase().starts_with(SCREEN_ID_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        // 2K keeps capture start-up quick while staying sharp enough for OCR.
        Self {
            width: 2560,
            height: 1440,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub types: Vec<SourceKind>,
    pub fetch_thumbnail: bool,
    pub thumbnail_size: ThumbnailSize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            types: vec![SourceKind::Screen],
            fetch_thumbnail: true,
            thumbnail_size: ThumbnailSize::default(),
        }
    }
}

impl ListOptions {
    pub fn wants(&self, kind: SourceKind) -> bool {
        self.types.contains(&kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Screen capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to enumerate capture sources: {0}")]
    Enumeration(String),

    #[error("Failed to capture thumbnail for {source_id}: {reason}")]
    Thumbnail { source_id: String, reason: String },
}

/// The host integration the capture pipeline runs against.
///
/// `set_capture_mode` is a one-way command: the host may apply it later,
/// so callers must not assume the window has changed when it returns.
pub trait CaptureHost: Send + Sync {
    fn list_sources(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = Result<Vec<CaptureSource>, HostError>> + Send;

    fn set_capture_mode(&self, enabled: bool);
}

/// Picks the source that best represents the whole primary display.
///
/// Tiers, first match wins and host order is preserved:
/// screen-typed id with a screen keyword in the name, then any name with a
/// screen keyword, then the first source.
pub fn select_primary_screen(sources: &[CaptureSource]) -> Option<&CaptureSource> {
    let has_keyword = |source: &CaptureSource| {
        let name = source.name.to_lowercase();
        SCREEN_NAME_KEYWORDS.iter().any(|k| name.contains(k))
    };

    sources
        .iter()
        .find(|s| s.is_screen() && has_keyword(s))
        .or_else(|| sources.iter().find(|s| has_keyword(s)))
        .or_else(|| sources.first())
}

/// Wraps PNG bytes as an embeddable data URI.
pub fn png_data_uri(png_bytes: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URI_PREFIX, STANDARD.encode(png_bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("Not a data URI")]
    NotDataUri,

    #[error("Data URI is not base64-encoded")]
    NotBase64Encoded,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Extracts the raw bytes of a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, DataUriError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUriError::NotDataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(DataUriError::NotDataUri)?;

    if !meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(DataUriError::NotBase64Encoded);
    }

    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, name: &str) -> CaptureSource {
        CaptureSource {
            id: id.to_string(),
            name: name.to_string(),
            thumbnail: None,
        }
    }

    #[test]
    fn prefers_screen_id_with_keyword() {
        let sources = vec![source("window:1", "Chrome"), source("screen:0", "Entire screen")];
        let picked = select_primary_screen(&sources).unwrap();
        assert_eq!(picked.id, "screen:0");
    }

    #[test]
    fn screen_id_beats_earlier_keyword_window() {
        let sources = vec![
            source("window:7", "Screen Recorder"),
            source("screen:1", "Screen 2"),
        ];
        assert_eq!(select_primary_screen(&sources).unwrap().id, "screen:1");
    }

    #[test]
    fn falls_back_to_name_keyword() {
        let sources = vec![source("window:1", "My Screen Window")];
        assert_eq!(select_primary_screen(&sources).unwrap().id, "window:1");
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let sources = vec![source("window:2", "Notes"), source("window:3", "ENTIRE DESKTOP")];
        assert_eq!(select_primary_screen(&sources).unwrap().id, "window:3");
    }

    #[test]
    fn falls_back_to_first_source() {
        let sources = vec![source("window:4", "Terminal"), source("window:5", "Editor")];
        assert_eq!(select_primary_screen(&sources).unwrap().id, "window:4");
    }

    #[test]
    fn empty_list_has_no_primary() {
        assert!(select_primary_screen(&[]).is_none());
    }

    #[test]
    fn data_uri_round_trips_bytes() {
        let uri = png_data_uri(&[1, 2, 3, 250]);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), vec![1, 2, 3, 250]);
    }

    #[test]
    fn rejects_non_data_uri() {
        assert!(matches!(
            decode_data_uri("https://example.com/a.png"),
            Err(DataUriError::NotDataUri)
        ));
    }

    #[test]
    fn rejects_plain_text_data_uri() {
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(DataUriError::NotBase64Encoded)
        ));
    }

    #[test]
    fn source_serializes_without_missing_thumbnail() {
        let json = serde_json::to_string(&source("screen:0", "Screen 1")).unwrap();
        assert_eq!(json, r#"{"id":"screen:0","name":"Screen 1"}"#);
    }
}
