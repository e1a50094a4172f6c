//! How the visible video is fitted into its area.

use eframe::egui::{pos2, vec2, Rect, Vec2};

pub const SCALE_STEP: f32 = 0.01;
const MIN_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Whole frame visible, letterboxed.
    #[default]
    Contain,
    /// Fill the area, cropping the overflow.
    Cover,
    /// Fill the area, ignoring the aspect ratio.
    Stretch,
}

/// Screen rect to paint into and the texture UV region to sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub rect: Rect,
    pub uv: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub fullscreen: bool,
    stretch: bool,
    zoom_crop: bool,
    pub controls_hidden: bool,
    pub show_remaining: bool,
    scale: Vec2,
    video_ready: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            fullscreen: false,
            stretch: false,
            zoom_crop: false,
            controls_hidden: false,
            show_remaining: false,
            scale: Vec2::splat(1.0),
            video_ready: false,
        }
    }
}

impl DisplayState {
    /// Stretching needs the video dimensions, so it waits for metadata.
    pub fn set_video_ready(&mut self, ready: bool) {
        self.video_ready = ready;
        if !ready {
            self.stretch = false;
        }
    }

    pub fn is_stretched(&self) -> bool {
        self.stretch
    }

    pub fn is_zoom_cropped(&self) -> bool {
        self.zoom_crop
    }

    pub fn toggle_stretch(&mut self) -> bool {
        if self.video_ready {
            self.stretch = !self.stretch;
        }
        self.stretch
    }

    pub fn toggle_zoom_crop(&mut self) -> bool {
        self.zoom_crop = !self.zoom_crop;
        self.zoom_crop
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        if self.fullscreen {
            self.on_fullscreen_exited();
        } else {
            self.fullscreen = true;
        }
        self.fullscreen
    }

    /// Enter fullscreen stretched, or leave both.
    pub fn toggle_stretched_fullscreen(&mut self) -> bool {
        if self.fullscreen {
            self.on_fullscreen_exited();
        } else if self.video_ready {
            self.fullscreen = true;
            self.stretch = true;
        }
        self.fullscreen
    }

    /// Fullscreen ended, possibly outside our control (Esc, window manager).
    pub fn on_fullscreen_exited(&mut self) {
        self.fullscreen = false;
        self.stretch = false;
        self.controls_hidden = false;
    }

    pub fn toggle_controls(&mut self) -> bool {
        self.controls_hidden = !self.controls_hidden;
        self.controls_hidden
    }

    pub fn toggle_remaining(&mut self) -> bool {
        self.show_remaining = !self.show_remaining;
        self.show_remaining
    }

    /// Nudge the scale by whole steps on each axis.
    pub fn nudge_scale(&mut self, steps_x: i32, steps_y: i32) {
        self.scale.x = (self.scale.x + steps_x as f32 * SCALE_STEP).clamp(MIN_SCALE, MAX_SCALE);
        self.scale.y = (self.scale.y + steps_y as f32 * SCALE_STEP).clamp(MIN_SCALE, MAX_SCALE);
    }

    pub fn reset_scale(&mut self) {
        self.scale = Vec2::splat(1.0);
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn fit_mode(&self) -> FitMode {
        if self.stretch {
            FitMode::Stretch
        } else if self.zoom_crop {
            FitMode::Cover
        } else {
            FitMode::Contain
        }
    }

    pub fn layout(&self, area: Rect, video_size: Vec2) -> FrameLayout {
        fit_frame(self.fit_mode(), area, video_size, self.scale)
    }
}

/// Place a `video_size` frame inside `area`, then scale about the centre.
pub fn fit_frame(mode: FitMode, area: Rect, video_size: Vec2, scale: Vec2) -> FrameLayout {
    let full_uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
    if video_size.x <= 0.0 || video_size.y <= 0.0 || area.width() <= 0.0 || area.height() <= 0.0 {
        return FrameLayout {
            rect: Rect::from_center_size(area.center(), area.size() * scale),
            uv: full_uv,
        };
    }

    let fit_x = area.width() / video_size.x;
    let fit_y = area.height() / video_size.y;

    let (size, uv) = match mode {
        FitMode::Contain => (video_size * fit_x.min(fit_y), full_uv),
        FitMode::Stretch => (area.size(), full_uv),
        FitMode::Cover => {
            let factor = fit_x.max(fit_y);
            // Fraction of the frame that fits on each axis
            let visible = vec2(fit_x / factor, fit_y / factor);
            let uv = Rect::from_center_size(pos2(0.5, 0.5), visible);
            (area.size(), uv)
        }
    };

    FrameLayout {
        rect: Rect::from_center_size(area.center(), size * scale),
        uv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(1000.0, 500.0))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_contain_letterboxes() {
        let layout = fit_frame(FitMode::Contain, area(), vec2(1920.0, 1080.0), Vec2::splat(1.0));
        assert!(approx(layout.rect.height(), 500.0));
        assert!(approx(layout.rect.width(), 888.889));
        assert_eq!(layout.rect.center(), area().center());
        assert_eq!(layout.uv, Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)));
    }

    #[test]
    fn test_cover_crops_overflow() {
        let layout = fit_frame(FitMode::Cover, area(), vec2(1000.0, 1000.0), Vec2::splat(1.0));
        assert_eq!(layout.rect, area());
        assert!(approx(layout.uv.min.x, 0.0) && approx(layout.uv.max.x, 1.0));
        assert!(approx(layout.uv.min.y, 0.25) && approx(layout.uv.max.y, 0.75));
    }

    #[test]
    fn test_stretch_fills() {
        let layout = fit_frame(FitMode::Stretch, area(), vec2(640.0, 480.0), Vec2::splat(1.0));
        assert_eq!(layout.rect, area());
    }

    #[test]
    fn test_scale_about_centre() {
        let layout = fit_frame(FitMode::Stretch, area(), vec2(640.0, 480.0), vec2(0.5, 1.0));
        assert!(approx(layout.rect.width(), 500.0));
        assert!(approx(layout.rect.min.x, 250.0));
        assert!(approx(layout.rect.height(), 500.0));
    }

    #[test]
    fn test_stretch_waits_for_video() {
        let mut display = DisplayState::default();
        assert!(!display.toggle_stretch());
        assert!(!display.toggle_stretched_fullscreen());

        display.set_video_ready(true);
        assert!(display.toggle_stretch());
        assert_eq!(display.fit_mode(), FitMode::Stretch);
        display.toggle_stretch();
        display.toggle_zoom_crop();
        assert_eq!(display.fit_mode(), FitMode::Cover);
    }

    #[test]
    fn test_stretched_fullscreen_round_trip() {
        let mut display = DisplayState::default();
        display.set_video_ready(true);

        assert!(display.toggle_stretched_fullscreen());
        assert!(display.fullscreen && display.is_stretched());

        display.toggle_controls();
        assert!(display.controls_hidden);

        assert!(!display.toggle_stretched_fullscreen());
        assert!(!display.is_stretched());
        assert!(!display.controls_hidden);
    }

    #[test]
    fn test_external_fullscreen_exit_resets() {
        let mut display = DisplayState::default();
        display.set_video_ready(true);
        display.toggle_fullscreen();
        display.toggle_stretch();
        display.toggle_controls();

        display.on_fullscreen_exited();
        assert!(!display.fullscreen);
        assert!(!display.is_stretched());
        assert!(!display.controls_hidden);
    }

    #[test]
    fn test_scale_nudges() {
        let mut display = DisplayState::default();
        display.nudge_scale(1, 0);
        display.nudge_scale(1, -3);
        assert!(approx(display.scale().x, 1.02));
        assert!(approx(display.scale().y, 0.97));

        display.nudge_scale(-1000, 1000);
        assert_eq!(display.scale(), vec2(0.1, 4.0));

        display.reset_scale();
        assert_eq!(display.scale(), Vec2::splat(1.0));
    }
}
