//! Application configuration.
//!
//! Stored as JSON in the platform config directory:
//!   macOS:   ~/Library/Application Support/snipchat/config.json
//!   Linux:   ~/.config/snipchat/config.json
//!   Windows: %APPDATA%/snipchat/config.json
//!
//! A missing file means defaults; missing fields fall back individually.

use crate::capture::{ListOptions, ReadinessPolicy, SessionConfig, ThumbnailSize, DEFAULT_MIN_SELECTION};
use crate::handoff::vision::DEFAULT_MODEL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub thumbnail_size: ThumbnailSize,
    pub settle_delay_ms: u64,
    pub readiness: ReadinessPolicy,
    pub min_selection_px: f64,
    /// Where `--out` defaults to. Unset means `<picture dir>/snipchat`.
    pub output_dir: Option<PathBuf>,
    pub openai_model: String,
    /// OpenAI-compatible chat completions endpoint. Unset means api.openai.com.
    pub openai_api_url: Option<String>,
    /// Earlier transcript entries sent with each image-to-chat request.
    pub chat_history_turns: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: ThumbnailSize::default(),
            settle_delay_ms: 100,
            readiness: ReadinessPolicy::default(),
            min_selection_px: DEFAULT_MIN_SELECTION,
            output_dir: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_api_url: None,
            chat_history_turns: 6,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Base directory for snipchat's configuration.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snipchat")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

impl AppConfig {
    /// Loads the config file from its default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("snipchat")
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            list_options: ListOptions {
                thumbnail_size: self.thumbnail_size,
                ..ListOptions::default()
            },
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            readiness: self.readiness,
            min_selection: self.min_selection_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_is_named_after_app() {
        let dir = config_dir();
        assert!(dir.to_string_lossy().contains("snipchat"));
        assert!(config_path().ends_with("config.json"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("snipchat-no-such-config.json");
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = std::env::temp_dir().join(format!("snipchat-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "settle_delay_ms": 250, "thumbnail_size": { "width": 1920, "height": 1080 } }"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.thumbnail_size, ThumbnailSize { width: 1920, height: 1080 });
        assert_eq!(config.readiness, ReadinessPolicy::default());
        assert_eq!(config.min_selection_px, 5.0);
        assert_eq!(config.openai_api_url, None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("snipchat-bad-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn session_config_carries_settings() {
        let config = AppConfig {
            settle_delay_ms: 40,
            min_selection_px: 8.0,
            ..AppConfig::default()
        };
        let session = config.session_config();
        assert_eq!(session.settle_delay, Duration::from_millis(40));
        assert_eq!(session.min_selection, 8.0);
        assert_eq!(session.list_options.thumbnail_size, ThumbnailSize::default());
    }
}
