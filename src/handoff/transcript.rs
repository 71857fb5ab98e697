//! Chat transcript — a flat JSON list of image-to-chat turns.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
    /// Local time the entry was recorded, RFC 3339.
    #[serde(default)]
    pub at: String,
}

impl TranscriptEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            at: chrono::Local::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Failed to read transcript {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write transcript {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Default location: `<data dir>/snipchat/transcript.json`.
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snipchat")
        .join("transcript.json")
}

#[derive(Debug, Default)]
pub struct Transcript {
    path: PathBuf,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Loads the transcript at `path`; a missing file is an empty transcript.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TranscriptError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let text = std::fs::read_to_string(&path).map_err(|e| TranscriptError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let entries = if text.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&text).map_err(|e| TranscriptError::Read {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> &[TranscriptEntry] {
        let start = self.entries.len().saturating_sub(limit);
        &self.entries[start..]
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn save(&self) -> Result<(), TranscriptError> {
        let write_err = |reason: String| TranscriptError::Write {
            path: self.path.clone(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| write_err(e.to_string()))?;

        log::debug!(
            "[HANDOFF] Transcript saved ({} entries) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("snipchat-test-{}-{}", std::process::id(), name))
            .join("transcript.json")
    }

    #[test]
    fn missing_file_is_empty() {
        let transcript = Transcript::load(temp_path("missing")).unwrap();
        assert!(transcript.entries().is_empty());
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let path = temp_path("roundtrip");
        let mut transcript = Transcript::load(&path).unwrap();
        transcript.push(TranscriptEntry::new("user", "read this"));
        transcript.push(TranscriptEntry::new("assistant", "it says hello"));
        transcript.save().unwrap();

        let loaded = Transcript::load(&path).unwrap();
        assert_eq!(loaded.entries(), transcript.entries());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn recent_returns_tail() {
        let mut transcript = Transcript::default();
        for i in 0..5 {
            transcript.push(TranscriptEntry::new("user", i.to_string()));
        }
        let tail: Vec<&str> = transcript.recent(2).iter().map(|e| e.content.as_str()).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(transcript.recent(10).len(), 5);
    }

    #[test]
    fn default_path_is_under_snipchat() {
        let path = default_path();
        assert!(path.to_string_lossy().contains("snipchat"));
        assert!(path.ends_with("transcript.json"));
    }
}
