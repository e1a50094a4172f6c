use crate::ffmpeg::{probe_file, MediaInfo};
use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Content-derived identity of a media file (hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Hash the file contents. Renaming or moving the file keeps the identity.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = BufReader::with_capacity(1 << 20, file);
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)
            .with_context(|| format!("Failed to hash {}", path.display()))?;
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a hidden decoder resource should read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub id: SourceId,
    pub path: PathBuf,
}

/// The currently loaded video as seen by the preview pipeline and the player.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    pub source: MediaSource,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub info: MediaInfo,
}

impl MediaHandle {
    pub fn new(source: MediaSource, duration: f64, width: u32, height: u32) -> Self {
        Self {
            source,
            duration,
            width,
            height,
            info: MediaInfo {
                duration,
                width,
                height,
                ..Default::default()
            },
        }
    }

    /// Probe and fingerprint a local file.
    pub fn open(ffprobe_path: &str, path: &Path) -> Result<Self> {
        let info = probe_file(ffprobe_path, path)
            .with_context(|| format!("Failed to probe {}", path.display()))?;
        if !info.has_video() {
            bail!("{} has no video stream", path.display());
        }
        if info.duration <= 0.0 {
            bail!("{} reports no duration", path.display());
        }
        let id = SourceId::from_file(path)?;

        Ok(Self {
            source: MediaSource {
                id,
                path: path.to_path_buf(),
            },
            duration: info.duration,
            width: info.width,
            height: info.height,
            info,
        })
    }

    pub fn filename(&self) -> String {
        self.source
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// File name without its extension, used as the window title.
    pub fn title(&self) -> String {
        self.source
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.filename())
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.width > 0 && self.height > 0 {
            self.width as f64 / self.height as f64
        } else {
            16.0 / 9.0
        }
    }

    pub fn resolution_string(&self) -> String {
        if self.width > 0 && self.height > 0 {
            format!("{}x{}", self.width, self.height)
        } else {
            "N/A".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_id_is_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        File::create(&a).unwrap().write_all(b"same bytes").unwrap();
        File::create(&b).unwrap().write_all(b"same bytes").unwrap();

        let id_a = SourceId::from_file(&a).unwrap();
        let id_b = SourceId::from_file(&b).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.as_str().len(), 64);

        File::create(&b).unwrap().write_all(b"other bytes").unwrap();
        assert_ne!(id_a, SourceId::from_file(&b).unwrap());
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(SourceId::from_file(Path::new("/definitely/not/here.mp4")).is_err());
    }

    #[test]
    fn test_handle_naming() {
        let handle = MediaHandle::new(
            MediaSource {
                id: SourceId::new("abc"),
                path: PathBuf::from("/videos/holiday.trip.mp4"),
            },
            12.0,
            1920,
            1080,
        );
        assert_eq!(handle.filename(), "holiday.trip.mp4");
        assert_eq!(handle.title(), "holiday.trip");
        assert_eq!(handle.resolution_string(), "1920x1080");
        assert!((handle.aspect_ratio() - 16.0 / 9.0).abs() < 1e-9);
    }
}
