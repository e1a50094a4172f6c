mod audio_player;
mod display;
mod sync;

pub use audio_player::*;
pub use display::*;
pub use sync::*;

use crate::config::PlayerConfig;
use crate::ffmpeg::grab_frame;
use crate::media::MediaHandle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Rates offered as one-key toggles. Selecting the active one returns to 1x.
pub const SPEED_PRESETS: [f64; 4] = [1.7, 2.0, 2.7, 4.0];

const FRAME_CACHE_LEN: usize = 60;
const MAX_FRAME_WIDTH: u32 = 854;
const MAX_FRAME_HEIGHT: u32 = 480;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// A decoded video frame
#[derive(Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts: f64,
}

/// Clamp `rate` to `[min, max]` and round to two decimals.
pub fn clamp_rate(rate: f64, min: f64, max: f64) -> f64 {
    let clamped = rate.clamp(min, max);
    (clamped * 100.0).round() / 100.0
}

pub fn toggle_rate(current: f64, preset: f64) -> f64 {
    if (current - preset).abs() < 1e-6 {
        1.0
    } else {
        preset
    }
}

/// Fit the video into the visible-frame budget, keeping the aspect ratio.
fn frame_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT);
    }
    let scale = (MAX_FRAME_WIDTH as f64 / width as f64)
        .min(MAX_FRAME_HEIGHT as f64 / height as f64)
        .min(1.0);
    // Even sizes keep scalers happy
    let even = |v: f64| ((v.round() as u32) & !1).max(2);
    (even(width as f64 * scale), even(height as f64 * scale))
}

/// The visible player: clock, frames from FFmpeg and rodio audio.
pub struct MediaPlayer {
    pub media: MediaHandle,
    ffmpeg_path: String,
    frame_size: (u32, u32),
    time_skip: f64,
    min_rate: f64,
    max_rate: f64,
    state: Arc<Mutex<PlaybackState>>,
    current_time: Arc<Mutex<f64>>,
    current_frame: Arc<Mutex<Option<VideoFrame>>>,
    clock: Arc<Mutex<PlaybackClock>>,
    frame_cache: Arc<Mutex<Vec<(f64, VideoFrame)>>>,
    ended: Arc<AtomicBool>,
    loop_running: Arc<AtomicBool>,
    audio_player: Option<AudioPlayer>,
}

impl MediaPlayer {
    /// Create a player for already-probed media. Audio is optional: a missing
    /// device or track leaves the player silent.
    pub fn new(media: MediaHandle, config: &PlayerConfig) -> Self {
        let audio_player = if media.info.has_audio() {
            match AudioPlayer::new(&config.ffmpeg_path, &media) {
                Ok(audio) => Some(audio),
                Err(e) => {
                    debug!("Audio disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };
        let player = Self::with_audio(media, config, audio_player);
        player.extract_frame_at(0.0);
        player
    }

    fn with_audio(media: MediaHandle, config: &PlayerConfig, audio_player: Option<AudioPlayer>) -> Self {
        Self {
            frame_size: frame_dimensions(media.width, media.height),
            media,
            ffmpeg_path: config.ffmpeg_path.clone(),
            time_skip: config.time_skip_secs,
            min_rate: config.min_playback_rate,
            max_rate: config.max_playback_rate,
            state: Arc::new(Mutex::new(PlaybackState::Stopped)),
            current_time: Arc::new(Mutex::new(0.0)),
            current_frame: Arc::new(Mutex::new(None)),
            clock: Arc::new(Mutex::new(PlaybackClock::new())),
            frame_cache: Arc::new(Mutex::new(Vec::new())),
            ended: Arc::new(AtomicBool::new(false)),
            loop_running: Arc::new(AtomicBool::new(false)),
            audio_player,
        }
    }

    pub fn duration(&self) -> f64 {
        self.media.duration
    }

    pub fn play(&self) {
        if self.has_ended() {
            self.seek(0.0);
        }
        *self.state.lock() = PlaybackState::Playing;
        self.clock.lock().resume();
        if let Some(ref audio) = self.audio_player {
            audio.play(self.get_current_time());
        }
        self.start_playback_loop();
    }

    pub fn pause(&self) {
        if *self.state.lock() == PlaybackState::Playing {
            *self.current_time.lock() = self.clock.lock().get_time().min(self.media.duration);
        }
        *self.state.lock() = PlaybackState::Paused;
        self.clock.lock().pause();
        if let Some(ref audio) = self.audio_player {
            audio.pause();
        }
    }

    pub fn toggle_play_pause(&self) {
        match self.get_state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused | PlaybackState::Stopped => self.play(),
        }
    }

    /// Jump to `time`, clamped to the media.
    pub fn seek(&self, time: f64) {
        let clamped = time.clamp(0.0, self.media.duration);
        self.ended.store(false, Ordering::Release);
        self.clock.lock().set_time(clamped);
        *self.current_time.lock() = clamped;
        if let Some(ref audio) = self.audio_player {
            audio.seek(clamped, self.get_state() == PlaybackState::Playing);
        }
        self.extract_frame_at(clamped);
    }

    pub fn rewind(&self) {
        self.seek(self.get_current_time() - self.time_skip);
    }

    pub fn forward(&self) {
        self.seek(self.get_current_time() + self.time_skip);
    }

    /// Apply a new rate and return the value actually used.
    pub fn set_playback_rate(&self, rate: f64) -> f64 {
        let rate = clamp_rate(rate, self.min_rate, self.max_rate);
        self.clock.lock().set_rate(rate);
        if let Some(ref audio) = self.audio_player {
            audio.set_speed(rate);
        }
        rate
    }

    pub fn playback_rate(&self) -> f64 {
        self.clock.lock().rate()
    }

    pub fn reset_playback_rate(&self) -> f64 {
        self.set_playback_rate(1.0)
    }

    pub fn toggle_speed_preset(&self, preset: f64) -> f64 {
        self.set_playback_rate(toggle_rate(self.playback_rate(), preset))
    }

    pub fn set_volume(&self, vol: f32) {
        if let Some(ref audio) = self.audio_player {
            audio.set_volume(vol);
        }
    }

    pub fn get_state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// True once playback ran into the end of the media.
    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub fn get_current_time(&self) -> f64 {
        if *self.state.lock() == PlaybackState::Playing {
            let time = self.clock.lock().get_time().min(self.media.duration);
            *self.current_time.lock() = time;
            time
        } else {
            *self.current_time.lock()
        }
    }

    pub fn get_current_frame(&self) -> Option<VideoFrame> {
        self.current_frame.lock().clone()
    }

    /// Show the frame at `time`, from the cache when close enough.
    fn extract_frame_at(&self, time: f64) {
        {
            let cache = self.frame_cache.lock();
            if let Some((_, frame)) = cache.iter().find(|(t, _)| (t - time).abs() < 0.05) {
                *self.current_frame.lock() = Some(frame.clone());
                return;
            }
        }

        let ffmpeg_path = self.ffmpeg_path.clone();
        let path = self.media.source.path.clone();
        let current_frame = self.current_frame.clone();
        let frame_cache = self.frame_cache.clone();
        let (width, height) = self.frame_size;

        std::thread::spawn(move || {
            match grab_frame(&ffmpeg_path, &path, time, width, height) {
                Ok(image) => {
                    let frame = VideoFrame {
                        data: image.into_raw(),
                        width,
                        height,
                        pts: time,
                    };
                    push_cached(&frame_cache, time, frame.clone());
                    *current_frame.lock() = Some(frame);
                }
                Err(e) => debug!("Frame at {:.2}s unavailable: {}", time, e),
            }
        });
    }

    fn start_playback_loop(&self) {
        if self
            .loop_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let state = self.state.clone();
        let clock = self.clock.clone();
        let current_time = self.current_time.clone();
        let current_frame = self.current_frame.clone();
        let frame_cache = self.frame_cache.clone();
        let ended = self.ended.clone();
        let running = self.loop_running.clone();
        let ffmpeg_path = self.ffmpeg_path.clone();
        let path = self.media.source.path.clone();
        let duration = self.media.duration;
        let (width, height) = self.frame_size;
        let frame_interval = 1.0 / 10.0; // ~10 fps

        std::thread::spawn(move || {
            let mut last_frame_time = -1.0;

            loop {
                if *state.lock() != PlaybackState::Playing {
                    running.store(false, Ordering::Release);
                    // Resumed while we were leaving
                    if *state.lock() == PlaybackState::Playing
                        && running
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                    {
                        continue;
                    }
                    break;
                }

                let time = clock.lock().get_time();
                if time >= duration {
                    *state.lock() = PlaybackState::Stopped;
                    clock.lock().pause();
                    clock.lock().set_time(duration);
                    *current_time.lock() = duration;
                    ended.store(true, Ordering::Release);
                    continue;
                }
                *current_time.lock() = time;

                if (time - last_frame_time).abs() >= frame_interval {
                    last_frame_time = time;

                    let cached = {
                        let cache = frame_cache.lock();
                        cache.iter().find(|(t, _)| (t - time).abs() < 0.1).map(|(_, f)| f.clone())
                    };

                    if let Some(frame) = cached {
                        *current_frame.lock() = Some(frame);
                    } else if let Ok(image) = grab_frame(&ffmpeg_path, &path, time, width, height) {
                        let frame = VideoFrame {
                            data: image.into_raw(),
                            width,
                            height,
                            pts: time,
                        };
                        push_cached(&frame_cache, time, frame.clone());
                        *current_frame.lock() = Some(frame);
                    }
                }

                std::thread::sleep(std::time::Duration::from_millis(50));
            }
        });
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        // Lets the playback thread exit
        *self.state.lock() = PlaybackState::Stopped;
        if let Some(ref audio) = self.audio_player {
            audio.stop();
        }
    }
}

fn push_cached(cache: &Mutex<Vec<(f64, VideoFrame)>>, time: f64, frame: VideoFrame) {
    let mut cache = cache.lock();
    cache.push((time, frame));
    if cache.len() > FRAME_CACHE_LEN {
        cache.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::testing::handle;

    fn player(duration: f64) -> MediaPlayer {
        let config = PlayerConfig {
            ffmpeg_path: "/no/such/ffmpeg-binary".to_string(),
            ..Default::default()
        };
        MediaPlayer::with_audio(handle("clip", duration), &config, None)
    }

    #[test]
    fn test_clamp_rate() {
        assert_eq!(clamp_rate(0.05, 0.1, 16.0), 0.1);
        assert_eq!(clamp_rate(1.234, 0.1, 16.0), 1.23);
        assert_eq!(clamp_rate(1.235_1, 0.1, 16.0), 1.24);
        assert_eq!(clamp_rate(40.0, 0.1, 16.0), 16.0);
    }

    #[test]
    fn test_toggle_rate() {
        assert_eq!(toggle_rate(1.0, 2.7), 2.7);
        assert_eq!(toggle_rate(2.7, 2.7), 1.0);
        assert_eq!(toggle_rate(2.0, 4.0), 4.0);
    }

    #[test]
    fn test_frame_dimensions() {
        assert_eq!(frame_dimensions(1920, 1080), (852, 480));
        assert_eq!(frame_dimensions(640, 360), (640, 360));
        assert_eq!(frame_dimensions(1080, 1920), (270, 480));
        assert_eq!(frame_dimensions(0, 0), (854, 480));
    }

    #[test]
    fn test_seek_is_clamped() {
        let player = player(60.0);
        player.seek(-5.0);
        assert_eq!(player.get_current_time(), 0.0);
        player.seek(75.0);
        assert_eq!(player.get_current_time(), 60.0);
        player.seek(12.5);
        assert_eq!(player.get_current_time(), 12.5);
    }

    #[test]
    fn test_skip_by_time_skip() {
        let player = player(60.0);
        player.seek(30.0);
        player.forward();
        assert_eq!(player.get_current_time(), 40.0);
        player.rewind();
        player.rewind();
        assert_eq!(player.get_current_time(), 20.0);
        player.seek(4.0);
        player.rewind();
        assert_eq!(player.get_current_time(), 0.0);
    }

    #[test]
    fn test_playback_rate() {
        let player = player(60.0);
        assert_eq!(player.playback_rate(), 1.0);
        assert_eq!(player.set_playback_rate(2.556), 2.56);
        assert_eq!(player.playback_rate(), 2.56);
        assert_eq!(player.set_playback_rate(0.0), 0.1);
        assert_eq!(player.reset_playback_rate(), 1.0);

        assert_eq!(player.toggle_speed_preset(1.7), 1.7);
        assert_eq!(player.toggle_speed_preset(4.0), 4.0);
        assert_eq!(player.toggle_speed_preset(4.0), 1.0);
    }

    #[test]
    fn test_play_pause_toggle() {
        let player = player(60.0);
        assert_eq!(player.get_state(), PlaybackState::Stopped);
        player.toggle_play_pause();
        assert_eq!(player.get_state(), PlaybackState::Playing);
        player.toggle_play_pause();
        assert_eq!(player.get_state(), PlaybackState::Paused);
        assert!(player.get_current_time() < 1.0);
        assert!(!player.has_ended());
    }
}
