use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::media::MediaHandle;

/// Audio track of the visible player, played through rodio.
/// Extraction happens in the background; playback is silent until it is ready.
pub struct AudioPlayer {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    temp_audio_path: Arc<Mutex<Option<PathBuf>>>,
    volume: Arc<Mutex<f32>>,
    speed: Arc<Mutex<f32>>,
}

impl AudioPlayer {
    /// Open the default output device and start extracting the audio track.
    pub fn new(ffmpeg_path: &str, media: &MediaHandle) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| anyhow!("Failed to initialize audio output: {}", e))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| anyhow!("Failed to create audio sink: {}", e))?;

        let temp_audio_path: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));

        let ffmpeg_path = ffmpeg_path.to_string();
        let video_path = media.source.path.clone();
        let temp_path = temp_audio_path_for(media);
        let slot = temp_audio_path.clone();
        std::thread::spawn(move || {
            match extract_audio_to_temp(&ffmpeg_path, &video_path, &temp_path) {
                Ok(()) => *slot.lock() = Some(temp_path),
                Err(e) => debug!("No audio track for {}: {:#}", video_path.display(), e),
            }
        });

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
            temp_audio_path,
            volume: Arc::new(Mutex::new(1.0)),
            speed: Arc::new(Mutex::new(1.0)),
        })
    }

    /// Queue the track starting at `time`. No-op until extraction finished.
    fn load_audio_at(&self, time: f64) -> Result<()> {
        let guard = self.temp_audio_path.lock();
        if let Some(ref temp_path) = *guard {
            let file = File::open(temp_path)
                .with_context(|| format!("Failed to open {}", temp_path.display()))?;
            let source = Decoder::new(BufReader::new(file))
                .map_err(|e| anyhow!("Failed to decode audio: {}", e))?;

            self.sink
                .append(source.skip_duration(std::time::Duration::from_secs_f64(time.max(0.0))));
            self.sink.set_volume(*self.volume.lock());
            self.sink.set_speed(*self.speed.lock());
        }
        Ok(())
    }

    /// Play from `time` if nothing is queued yet, otherwise resume.
    pub fn play(&self, time: f64) {
        if self.sink.empty() {
            if let Err(e) = self.load_audio_at(time) {
                warn!("{:#}", e);
            }
        }
        self.sink.play();
    }

    pub fn pause(&self) {
        self.sink.pause();
    }

    pub fn stop(&self) {
        self.sink.stop();
        self.sink.clear();
    }

    /// Set volume (0.0 to 2.0)
    pub fn set_volume(&self, vol: f32) {
        let clamped = vol.clamp(0.0, 2.0);
        *self.volume.lock() = clamped;
        self.sink.set_volume(clamped);
    }

    /// Follow the playback rate.
    pub fn set_speed(&self, rate: f64) {
        let speed = rate as f32;
        *self.speed.lock() = speed;
        self.sink.set_speed(speed);
    }

    /// Seek to position (requires reloading audio)
    pub fn seek(&self, time: f64, playing: bool) {
        self.sink.stop();
        self.sink.clear();
        if let Err(e) = self.load_audio_at(time) {
            warn!("{:#}", e);
        }
        if playing {
            self.sink.play();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if let Some(ref temp_path) = *self.temp_audio_path.lock() {
            let _ = std::fs::remove_file(temp_path);
        }
    }
}

/// One temp file per source, so two copies of the same clip share nothing else.
fn temp_audio_path_for(media: &MediaHandle) -> PathBuf {
    let short: String = media.source.id.as_str().chars().take(16).collect();
    std::env::temp_dir().join(format!("scrub_player_audio_{}.wav", short))
}

/// Extract the audio track to a WAV file using FFmpeg
fn extract_audio_to_temp(ffmpeg_path: &str, video_path: &Path, temp_path: &Path) -> Result<()> {
    let _ = std::fs::remove_file(temp_path);

    let mut cmd = std::process::Command::new(ffmpeg_path);
    cmd.args(["-y", "-i"])
        .arg(video_path)
        .args([
            "-vn",
            "-acodec", "pcm_s16le",
            "-ar", "44100",
            "-ac", "2",
        ])
        .arg(temp_path)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let status = cmd
        .status()
        .with_context(|| format!("Failed to run {}", ffmpeg_path))?;
    if !status.success() {
        bail!("FFmpeg audio extraction failed");
    }

    let written = std::fs::metadata(temp_path).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        bail!("FFmpeg produced an empty audio file");
    }
    Ok(())
}
