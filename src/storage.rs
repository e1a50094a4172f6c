//! Playback position and speed remembered per video.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::media::SourceId;

const STORE_FILE: &str = "playback.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEntry {
    /// Position in seconds
    pub timer: f64,
    pub playback_rate: f64,
    pub last_opened: DateTime<Utc>,
}

/// JSON-backed map from source id to [`PlaybackEntry`].
pub struct PlaybackStore {
    path: PathBuf,
    entries: HashMap<String, PlaybackEntry>,
}

impl PlaybackStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Store under the user data directory; unreadable state starts fresh.
    pub fn open_default() -> Self {
        let path = crate::config::data_dir().join(STORE_FILE);
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{:#}; starting with empty playback state", e);
                Self {
                    path,
                    entries: HashMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &SourceId) -> Option<&PlaybackEntry> {
        self.entries.get(id.as_str())
    }

    pub fn save(&mut self, id: &SourceId, timer: f64, playback_rate: f64) {
        self.save_at(id, timer, playback_rate, Utc::now());
    }

    pub fn save_at(&mut self, id: &SourceId, timer: f64, playback_rate: f64, now: DateTime<Utc>) {
        self.entries.insert(
            id.as_str().to_string(),
            PlaybackEntry {
                timer,
                playback_rate,
                last_opened: now,
            },
        );
        info!("Saved playback state for {} at {:.1}s", short(id), timer);
    }

    /// Entry to resume from, if any.
    pub fn restore(&self, id: &SourceId) -> Option<PlaybackEntry> {
        let entry = self.entries.get(id.as_str()).cloned()?;
        info!(
            "Restored playback state for {} at {:.1}s ({}x)",
            short(id),
            entry.timer,
            entry.playback_rate
        );
        Some(entry)
    }

    pub fn remove(&mut self, id: &SourceId) -> bool {
        let removed = self.entries.remove(id.as_str()).is_some();
        if removed {
            info!("Removed playback state for {}", short(id));
        }
        removed
    }

    /// Drop entries not opened within `retention_days`. Returns how many went.
    pub fn cleanup_expired(&mut self, retention_days: i64) -> usize {
        self.cleanup_expired_at(Utc::now(), retention_days)
    }

    pub fn cleanup_expired_at(&mut self, now: DateTime<Utc>, retention_days: i64) -> usize {
        let cutoff = now - Duration::days(retention_days);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_opened >= cutoff);
        let expired = before - self.entries.len();
        if expired > 0 {
            info!("Purged {} expired playback entries", expired);
        }
        expired
    }

    /// Write the store to disk, creating the directory if needed.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

fn short(id: &SourceId) -> String {
    id.as_str().chars().take(12).collect()
}
