use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "scrub-player";
const SETTINGS_FILE: &str = "settings.json";

/// Tuning for the scrub-preview pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    pub max_cached_frames: usize,
    pub segment_length_secs: f64,
    pub surface_width: u32,
    pub surface_height: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    pub decode_timeout_ms: u64,
    pub hover_throttle_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_cached_frames: crate::preview::DEFAULT_MAX_ENTRIES,
            segment_length_secs: crate::preview::DEFAULT_SEGMENT_LENGTH,
            surface_width: 320,
            surface_height: 180,
            jpeg_quality: 90,
            decode_timeout_ms: 2000,
            hover_throttle_ms: 50,
        }
    }
}

impl PreviewConfig {
    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(self.decode_timeout_ms)
    }

    pub fn hover_throttle(&self) -> Duration {
        Duration::from_millis(self.hover_throttle_ms)
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_width.max(1), self.surface_height.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub time_skip_secs: f64,
    pub min_playback_rate: f64,
    pub max_playback_rate: f64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub state_retention_days: i64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            time_skip_secs: 10.0,
            min_playback_rate: 0.1,
            max_playback_rate: 16.0,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            state_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub preview: PreviewConfig,
    pub player: PlayerConfig,
}

impl Settings {
    /// Location of the settings file, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Load settings from the default location. A missing file gives defaults;
    /// an unreadable one is logged and replaced by defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                tracing::warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }
}

/// Per-user data directory for persisted state.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
