use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub framerate: Option<f64>,
    pub format_name: String,
    pub file_size: u64,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some() && self.width > 0 && self.height > 0
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct FFProbeOutput {
    format: Option<FFProbeFormat>,
    streams: Option<Vec<FFProbeStream>>,
}

#[derive(Debug, Deserialize)]
struct FFProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Run `ffprobe` on `path` and collect duration, dimensions and codecs.
pub fn probe_file(ffprobe_path: &str, path: &Path) -> Result<MediaInfo> {
    let mut cmd = Command::new(ffprobe_path);
    cmd.args([
        "-v", "quiet",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(path);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to run {}", ffprobe_path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe failed: {}", stderr));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(json_str: &str) -> Result<MediaInfo> {
    let probe_output: FFProbeOutput = serde_json::from_str(json_str)
        .map_err(|e| anyhow!("Failed to parse ffprobe output: {}", e))?;

    let mut info = MediaInfo::default();

    if let Some(format) = probe_output.format {
        info.duration = format.duration
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        info.format_name = format.format_name.unwrap_or_default();
        info.file_size = format.size
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
    }

    for stream in probe_output.streams.unwrap_or_default() {
        match stream.codec_type.as_deref().unwrap_or("") {
            // First video stream wins; cover art comes later
            "video" if info.video_codec.is_none() => {
                info.video_codec = stream.codec_name;
                info.width = stream.width.unwrap_or(0);
                info.height = stream.height.unwrap_or(0);
                info.framerate = stream.r_frame_rate
                    .and_then(|r| parse_framerate(&r));
            }
            "audio" if info.audio_codec.is_none() => {
                info.audio_codec = stream.codec_name;
            }
            _ => {}
        }
    }

    Ok(info)
}

fn parse_framerate(fps_str: &str) -> Option<f64> {
    let parts: Vec<&str> = fps_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    fps_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001" },
            { "codec_type": "audio", "codec_name": "aac" },
            { "codec_type": "video", "codec_name": "mjpeg", "width": 600, "height": 600 }
        ],
        "format": { "duration": "12.480000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "size": "1048576" }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(SAMPLE).unwrap();
        assert_eq!(info.duration, 12.48);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
        assert!((info.framerate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.file_size, 1048576);
        assert!(info.has_video());
        assert!(info.has_audio());
    }

    #[test]
    fn test_audio_only_has_no_video() {
        let info = parse_probe_output(
            r#"{ "streams": [{ "codec_type": "audio", "codec_name": "mp3" }], "format": { "duration": "3.0" } }"#,
        )
        .unwrap();
        assert!(!info.has_video());
        assert_eq!(info.duration, 3.0);
    }

    #[test]
    fn test_parse_framerate() {
        assert_eq!(parse_framerate("25/1"), Some(25.0));
        assert_eq!(parse_framerate("24"), Some(24.0));
        assert_eq!(parse_framerate("0/0"), None);
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_probe_output("not json").is_err());
    }
}
