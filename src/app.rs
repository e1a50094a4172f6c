use crossbeam_channel::{unbounded, Receiver, Sender};
use eframe::egui;
use scrub_player::config::Settings;
use scrub_player::ffmpeg::{ffmpeg_available, FfmpegSession};
use scrub_player::media::MediaHandle;
use scrub_player::player::{DisplayState, MediaPlayer, PlaybackState};
use scrub_player::preview::{HoverOutcome, ScrubController, SeekBarGeometry};
use scrub_player::storage::PlaybackStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// Thumbnail currently shown above the seek bar.
pub struct HoverPreview {
    pub label: String,
    pub left: f32,
    pub width: f32,
    /// None when the frame could not be decoded
    pub texture: Option<egui::TextureHandle>,
}

pub struct PlayerApp {
    pub settings: Settings,
    pub runtime: Runtime,
    pub scrub: Arc<ScrubController<FfmpegSession>>,
    pub store: PlaybackStore,
    pub display: DisplayState,
    pub status_message: String,

    // Player state
    pub player: Option<MediaPlayer>,
    pub current_time: f64,
    pub volume: f32,
    pub video_texture: Option<egui::TextureHandle>,
    last_frame_pts: f64,
    fullscreen_confirmed: bool,

    // Scrub preview
    pub hover_preview: Option<HoverPreview>,
    pub seek_bar_hovered: bool,
    last_hover_x: Option<f32>,
    hover_tx: Sender<HoverOutcome>,
    hover_rx: Receiver<HoverOutcome>,

    // Media opening (probe + hash) happens off the UI thread
    pub opening: Option<PathBuf>,
    opened_tx: Sender<(PathBuf, anyhow::Result<MediaHandle>)>,
    opened_rx: Receiver<(PathBuf, anyhow::Result<MediaHandle>)>,
}

impl PlayerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        let session = FfmpegSession::new(
            settings.player.ffmpeg_path.clone(),
            settings.preview.surface_size(),
        );
        let scrub = Arc::new(ScrubController::new(session, &settings.preview));

        let mut store = PlaybackStore::open_default();
        if store.cleanup_expired(settings.player.state_retention_days) > 0 {
            if let Err(e) = store.persist() {
                warn!("{:#}", e);
            }
        }

        let status_message = if ffmpeg_available(&settings.player.ffmpeg_path) {
            String::from("Ready")
        } else {
            warn!("{} not found; previews and playback are disabled", settings.player.ffmpeg_path);
            format!("{} not found in PATH", settings.player.ffmpeg_path)
        };

        let (hover_tx, hover_rx) = unbounded();
        let (opened_tx, opened_rx) = unbounded();

        Self {
            settings,
            runtime: Runtime::new().expect("Failed to create Tokio runtime"),
            scrub,
            store,
            display: DisplayState::default(),
            status_message,

            player: None,
            current_time: 0.0,
            volume: 1.0,
            video_texture: None,
            last_frame_pts: -1.0,
            fullscreen_confirmed: false,

            hover_preview: None,
            seek_bar_hovered: false,
            last_hover_x: None,
            hover_tx,
            hover_rx,

            opening: None,
            opened_tx,
            opened_rx,
        }
    }

    /// Probe and fingerprint `path` in the background; see [`Self::poll_opened`].
    pub fn open_file(&mut self, path: PathBuf) {
        let ffprobe_path = self.settings.player.ffprobe_path.clone();
        let tx = self.opened_tx.clone();
        self.status_message = format!("Opening {}...", path.display());
        self.opening = Some(path.clone());

        std::thread::spawn(move || {
            let result = MediaHandle::open(&ffprobe_path, &path);
            let _ = tx.send((path, result));
        });
    }

    fn poll_opened(&mut self, ctx: &egui::Context) {
        while let Ok((path, result)) = self.opened_rx.try_recv() {
            if self.opening.as_ref() == Some(&path) {
                self.opening = None;
            }
            match result {
                Ok(media) => self.load_media(ctx, media),
                Err(e) => {
                    warn!("{:#}", e);
                    self.status_message = format!("Failed to open {}: {:#}", path.display(), e);
                }
            }
        }
    }

    fn load_media(&mut self, ctx: &egui::Context, media: MediaHandle) {
        self.save_playback_state();

        let player = MediaPlayer::new(media.clone(), &self.settings.player);
        if let Some(entry) = self.store.restore(&media.source.id) {
            player.seek(entry.timer);
            player.set_playback_rate(entry.playback_rate);
        }
        player.set_volume(self.volume);
        self.current_time = player.get_current_time();
        self.player = Some(player);

        self.video_texture = None;
        self.last_frame_pts = -1.0;
        self.hover_preview = None;
        self.display.set_video_ready(true);

        info!("Loaded {} ({})", media.filename(), media.resolution_string());
        self.status_message = format!("Loaded: {}", media.filename());
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "{} - Scrub Player",
            media.title()
        )));

        let _guard = self.runtime.enter();
        drop(self.scrub.load_media(media));
    }

    /// Remember where the current video was left, or forget it if it ended.
    pub fn save_playback_state(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let id = &player.media.source.id;
        if player.has_ended() {
            self.store.remove(id);
        } else {
            self.store
                .save(id, player.get_current_time(), player.playback_rate());
        }
        if let Err(e) = self.store.persist() {
            warn!("{:#}", e);
        }
    }

    pub fn close_media(&mut self, ctx: &egui::Context) {
        self.save_playback_state();
        self.player = None;
        self.video_texture = None;
        self.hover_preview = None;
        self.current_time = 0.0;
        self.display.set_video_ready(false);
        self.status_message = String::from("Ready");
        ctx.send_viewport_cmd(egui::ViewportCommand::Title("Scrub Player".to_string()));

        let scrub = self.scrub.clone();
        self.runtime.spawn(async move { scrub.unload().await });
    }

    // Scrub preview
    pub fn set_seek_bar_geometry(&self, rect: egui::Rect) {
        self.scrub
            .set_geometry(SeekBarGeometry::new(rect.left(), rect.width()));
    }

    /// Ask for the preview under the pointer unless it was already requested.
    pub fn hover_seek_bar(&mut self, ctx: &egui::Context, pointer_x: f32, movement_x: f32) {
        self.seek_bar_hovered = true;
        if self.last_hover_x == Some(pointer_x) {
            return;
        }
        self.last_hover_x = Some(pointer_x);

        let scrub = self.scrub.clone();
        let tx = self.hover_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = scrub.on_hover(pointer_x, movement_x).await;
            let _ = tx.send(outcome);
            ctx.request_repaint();
        });
    }

    pub fn leave_seek_bar(&mut self) {
        self.scrub.on_leave();
        self.seek_bar_hovered = false;
        self.last_hover_x = None;
        self.hover_preview = None;
    }

    fn poll_hover(&mut self, ctx: &egui::Context) {
        while let Ok(outcome) = self.hover_rx.try_recv() {
            // A late answer for a pointer that already left
            if !self.scrub.is_visible() {
                continue;
            }
            self.hover_preview = match outcome {
                HoverOutcome::Shown(payload) => Some(HoverPreview {
                    texture: crate::ui::load_preview_texture(ctx, &payload.image, "scrub_preview"),
                    label: payload.label,
                    left: payload.left,
                    width: payload.width,
                }),
                HoverOutcome::Unavailable { timestamp } => {
                    let width = self.hover_preview.as_ref().map(|p| p.width).unwrap_or(260.0);
                    let left = self.hover_preview.as_ref().map(|p| p.left).unwrap_or_default();
                    Some(HoverPreview {
                        label: scrub_player::utils::time::format_clock(timestamp),
                        left,
                        width,
                        texture: None,
                    })
                }
                HoverOutcome::NoMedia => None,
                HoverOutcome::Throttled => {
                    // Retry the latest position once the throttle opens
                    self.last_hover_x = None;
                    ctx.request_repaint_after(self.settings.preview.hover_throttle());
                    continue;
                }
            };
        }
    }

    // Player controls
    pub fn toggle_play_pause(&mut self) {
        if let Some(ref player) = self.player {
            player.toggle_play_pause();
        }
    }

    pub fn seek(&mut self, time: f64) {
        if let Some(ref player) = self.player {
            player.seek(time);
            self.current_time = player.get_current_time();
            // Reset so the next frame is always uploaded to the texture
            self.last_frame_pts = -1.0;
        }
    }

    pub fn rewind(&mut self) {
        if let Some(ref player) = self.player {
            player.rewind();
            self.current_time = player.get_current_time();
        }
    }

    pub fn forward(&mut self) {
        if let Some(ref player) = self.player {
            player.forward();
            self.current_time = player.get_current_time();
        }
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if let Some(ref player) = self.player {
            let applied = player.set_playback_rate(rate);
            self.status_message = format!("Speed: {}x", applied);
        }
    }

    pub fn toggle_speed_preset(&mut self, preset: f64) {
        if let Some(ref player) = self.player {
            let applied = player.toggle_speed_preset(preset);
            self.status_message = format!("Speed: {}x", applied);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.player.as_ref().map(|p| p.playback_rate()).unwrap_or(1.0)
    }

    pub fn set_volume(&mut self, vol: f32) {
        self.volume = vol.clamp(0.0, 2.0);
        if let Some(ref player) = self.player {
            player.set_volume(self.volume);
        }
    }

    pub fn get_playback_state(&self) -> PlaybackState {
        self.player
            .as_ref()
            .map(|p| p.get_state())
            .unwrap_or(PlaybackState::Stopped)
    }

    pub fn get_duration(&self) -> f64 {
        self.player.as_ref().map(|p| p.duration()).unwrap_or(0.0)
    }

    // Display
    pub fn toggle_fullscreen(&mut self, ctx: &egui::Context) {
        let fullscreen = self.display.toggle_fullscreen();
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
    }

    pub fn toggle_stretched_fullscreen(&mut self, ctx: &egui::Context) {
        let fullscreen = self.display.toggle_stretched_fullscreen();
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
    }

    /// Notice fullscreen being left through the window manager.
    fn track_fullscreen(&mut self, ctx: &egui::Context) {
        let actual = ctx.input(|i| i.viewport().fullscreen);
        match actual {
            Some(true) if self.display.fullscreen => self.fullscreen_confirmed = true,
            Some(false) if self.fullscreen_confirmed => {
                self.fullscreen_confirmed = false;
                if self.display.fullscreen {
                    self.display.on_fullscreen_exited();
                }
            }
            _ => {}
        }
    }

    pub fn update_player(&mut self, ctx: &egui::Context) {
        let Some(ref player) = self.player else {
            return;
        };
        self.current_time = player.get_current_time();

        if player.has_ended() && player.get_state() == PlaybackState::Stopped {
            if self.store.remove(&player.media.source.id) {
                if let Err(e) = self.store.persist() {
                    warn!("{:#}", e);
                }
            }
        }

        if let Some(frame) = player.get_current_frame() {
            // Only upload to GPU if the frame is new
            if (frame.pts - self.last_frame_pts).abs() > 0.001 {
                self.last_frame_pts = frame.pts;
                let color_image = egui::ColorImage::from_rgba_unmultiplied(
                    [frame.width as usize, frame.height as usize],
                    &frame.data,
                );
                self.video_texture = Some(ctx.load_texture(
                    "video_frame",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        if player.get_state() == PlaybackState::Playing {
            ctx.request_repaint_after(std::time::Duration::from_millis(30));
        }
    }

    /// Handle keyboard shortcuts
    pub fn handle_input(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (pressed, ctrl) = ctx.input(|i| {
            let keys: Vec<egui::Key> = i
                .events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::Key {
                        key, pressed: true, ..
                    } => Some(*key),
                    _ => None,
                })
                .collect();
            (keys, i.modifiers.ctrl)
        });

        for key in pressed {
            match key {
                egui::Key::Space | egui::Key::K => self.toggle_play_pause(),

                // Ctrl + arrows resize the picture; plain arrows skip
                egui::Key::ArrowLeft if ctrl => self.display.nudge_scale(-1, 0),
                egui::Key::ArrowRight if ctrl => self.display.nudge_scale(1, 0),
                egui::Key::ArrowUp if ctrl => self.display.nudge_scale(0, 1),
                egui::Key::ArrowDown if ctrl => self.display.nudge_scale(0, -1),
                egui::Key::Num0 if ctrl => self.display.reset_scale(),
                egui::Key::O if ctrl => {
                    if let Some(path) = pick_video() {
                        self.open_file(path);
                    }
                }

                egui::Key::ArrowLeft | egui::Key::J => self.rewind(),
                egui::Key::ArrowRight | egui::Key::L => self.forward(),
                egui::Key::Home => self.seek(0.0),
                egui::Key::End => self.seek(self.get_duration()),

                egui::Key::Minus => self.set_playback_rate(self.playback_rate() - 0.1),
                egui::Key::Plus | egui::Key::Equals => {
                    self.set_playback_rate(self.playback_rate() + 0.1)
                }
                egui::Key::R => self.set_playback_rate(1.0),
                egui::Key::Num1 => self.toggle_speed_preset(1.7),
                egui::Key::Num2 => self.toggle_speed_preset(2.0),
                egui::Key::Num3 => self.toggle_speed_preset(2.7),
                egui::Key::Num4 => self.toggle_speed_preset(4.0),

                egui::Key::F => self.toggle_fullscreen(ctx),
                egui::Key::G => self.toggle_stretched_fullscreen(ctx),
                egui::Key::S => {
                    self.display.toggle_stretch();
                }
                egui::Key::Z => {
                    self.display.toggle_zoom_crop();
                }
                egui::Key::H => {
                    self.display.toggle_controls();
                }
                egui::Key::T => {
                    self.display.toggle_remaining();
                }
                egui::Key::Escape if self.display.fullscreen => {
                    self.display.on_fullscreen_exited();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(false));
                }
                _ => {}
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .find_map(|f| f.path.clone())
        });
        if let Some(path) = dropped {
            self.open_file(path);
        }
    }
}

/// Native file dialog filtered to common video containers.
pub fn pick_video() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Video", &["mp4", "mkv", "avi", "mov", "webm", "ts", "flv", "m4v"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.poll_opened(ctx);
        self.poll_hover(ctx);
        self.track_fullscreen(ctx);
        self.handle_input(ctx);
        self.update_player(ctx);

        crate::ui::render_main_window(self, ctx);

        // Keep the progress indicator moving while preprocessing
        let progress = self.scrub.progress();
        if self.opening.is_some() || (progress.total() > 0 && progress.fraction() < 1.0) {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}

impl Drop for PlayerApp {
    fn drop(&mut self) {
        self.save_playback_state();
    }
}
