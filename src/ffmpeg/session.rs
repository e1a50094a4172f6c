//! Hidden decoder resource backed by one-shot `ffmpeg` frame grabs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use image::RgbaImage;
use tokio::process::Command;

use crate::media::MediaSource;
use crate::preview::{MediaSession, PreviewError};

/// Seeks by spawning `ffmpeg -ss <t>` and reading one raw RGBA frame from
/// its stdout, already scaled to the preview surface.
pub struct FfmpegSession {
    ffmpeg_path: String,
    frame_size: (u32, u32),
    source: Option<PathBuf>,
    frame: Option<RgbaImage>,
}

impl FfmpegSession {
    pub fn new(ffmpeg_path: impl Into<String>, frame_size: (u32, u32)) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            frame_size,
            source: None,
            frame: None,
        }
    }
}

impl MediaSession for FfmpegSession {
    async fn attach(&mut self, source: &MediaSource) -> Result<(), PreviewError> {
        if !source.path.is_file() {
            return Err(PreviewError::failure(
                0.0,
                format!("{} is not readable", source.path.display()),
            ));
        }
        self.source = Some(source.path.clone());
        self.frame = None;
        Ok(())
    }

    async fn seek_to(&mut self, timestamp: f64) -> Result<(), PreviewError> {
        let path = self
            .source
            .as_deref()
            .ok_or_else(|| PreviewError::failure(timestamp, "session is detached"))?;
        let (width, height) = self.frame_size;
        self.frame = None;

        let frame = extract_rgba_frame(&self.ffmpeg_path, path, timestamp, width, height)
            .await
            .map_err(|reason| PreviewError::failure(timestamp, reason))?;
        self.frame = Some(frame);
        Ok(())
    }

    fn current_frame(&mut self) -> Result<RgbaImage, PreviewError> {
        self.frame
            .clone()
            .ok_or_else(|| PreviewError::failure(0.0, "no frame decoded"))
    }

    fn detach(&mut self) {
        self.source = None;
        self.frame = None;
    }
}

fn frame_grab_args(path: &Path, time: f64, width: u32, height: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v", "error",
        "-nostdin",
        "-ss", &format!("{:.3}", time), // Seek before input (fast)
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        [
            "-frames:v", "1",
            "-vf", &format!("scale={}:{}", width, height),
            "-f", "rawvideo",
            "-pix_fmt", "rgba",
            "-",
        ]
        .iter()
        .map(OsString::from),
    );
    args
}

fn frame_from_output(output: Output, width: u32, height: u32) -> Result<RgbaImage, String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "FFmpeg failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        ));
    }

    let expected_size = (width * height * 4) as usize;
    if output.stdout.len() != expected_size {
        return Err(format!(
            "Unexpected frame size: got {} bytes, expected {}",
            output.stdout.len(),
            expected_size
        ));
    }

    RgbaImage::from_raw(width, height, output.stdout)
        .ok_or_else(|| "Frame buffer does not match its dimensions".to_string())
}

/// Grab a single frame at `time` through a raw video pipe.
///
/// The child is killed if the returned future is dropped (decode timeout).
async fn extract_rgba_frame(
    ffmpeg_path: &str,
    path: &Path,
    time: f64,
    width: u32,
    height: u32,
) -> Result<RgbaImage, String> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(frame_grab_args(path, time, width, height))
        .stdin(Stdio::null())
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("FFmpeg error: {}", e))?;
    frame_from_output(output, width, height)
}

/// Blocking variant for the visible player's frame thread.
pub fn grab_frame(
    ffmpeg_path: &str,
    path: &Path,
    time: f64,
    width: u32,
    height: u32,
) -> Result<RgbaImage, String> {
    let mut cmd = std::process::Command::new(ffmpeg_path);
    cmd.args(frame_grab_args(path, time, width, height))
        .stdin(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = cmd.output().map_err(|e| format!("FFmpeg error: {}", e))?;
    frame_from_output(output, width, height)
}

/// Check whether the `ffmpeg` binary can be started.
pub fn ffmpeg_available(ffmpeg_path: &str) -> bool {
    std::process::Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SourceId;

    fn missing() -> MediaSource {
        MediaSource {
            id: SourceId::new("missing"),
            path: PathBuf::from("/definitely/not/here.mp4"),
        }
    }

    #[tokio::test]
    async fn test_attach_missing_file_fails() {
        let mut session = FfmpegSession::new("ffmpeg", (320, 180));
        let err = session.attach(&missing()).await.unwrap_err();
        assert!(matches!(err, PreviewError::DecodeFailure { .. }));
    }

    #[tokio::test]
    async fn test_seek_while_detached_fails() {
        let mut session = FfmpegSession::new("ffmpeg", (320, 180));
        assert!(session.seek_to(1.0).await.is_err());
        assert!(session.current_frame().is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        let source = MediaSource {
            id: SourceId::new("clip"),
            path,
        };

        let mut session = FfmpegSession::new("/no/such/ffmpeg-binary", (32, 18));
        session.attach(&source).await.unwrap();
        let err = session.seek_to(0.5).await.unwrap_err();
        assert!(matches!(err, PreviewError::DecodeFailure { timestamp, .. } if timestamp == 0.5));
        assert!(!ffmpeg_available("/no/such/ffmpeg-binary"));
    }

    #[test]
    fn test_frame_grab_args() {
        let args = frame_grab_args(Path::new("/v/clip.mp4"), 7.25, 320, 180);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[ss + 1], "7.250");
        assert!(ss < input);
        assert_eq!(args[input + 1], "/v/clip.mp4");
        assert!(args.contains(&"scale=320:180".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }
}
