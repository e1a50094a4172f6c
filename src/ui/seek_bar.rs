use eframe::egui;

const BAR_HEIGHT: f32 = 18.0;
const TRACK_HEIGHT: f32 = 6.0;

/// Seek bar with played and preprocessed fills.
pub struct SeekBar {
    pub duration: f64,
    pub current_time: f64,
    /// Spans of the timeline with previews ready, as fractions
    pub preprocessed: Vec<(f32, f32)>,
}

pub struct SeekBarResponse {
    pub rect: egui::Rect,
    pub seek_to: Option<f64>,
    /// Pointer x and horizontal movement, when hovering
    pub hover: Option<(f32, f32)>,
    pub is_scrubbing: bool,
}

impl SeekBar {
    pub fn new(duration: f64, current_time: f64) -> Self {
        Self {
            duration,
            current_time,
            preprocessed: Vec::new(),
        }
    }

    pub fn preprocessed(mut self, spans: Vec<(f32, f32)>) -> Self {
        self.preprocessed = spans;
        self
    }

    pub fn show(self, ui: &mut egui::Ui) -> SeekBarResponse {
        let (rect, ui_response) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), BAR_HEIGHT),
            egui::Sense::click_and_drag(),
        );

        let mut response = SeekBarResponse {
            rect,
            seek_to: None,
            hover: None,
            is_scrubbing: false,
        };

        if ui.is_rect_visible(rect) {
            let painter = ui.painter_at(rect);
            let track = egui::Rect::from_center_size(
                rect.center(),
                egui::vec2(rect.width(), TRACK_HEIGHT),
            );
            painter.rect_filled(track, 3.0, egui::Color32::from_gray(50));

            let x_at = |fraction: f32| track.left() + fraction.clamp(0.0, 1.0) * track.width();

            for &(start, end) in &self.preprocessed {
                let done = egui::Rect::from_min_max(
                    egui::pos2(x_at(start), track.min.y),
                    egui::pos2(x_at(end), track.max.y),
                );
                painter.rect_filled(done, 3.0, egui::Color32::from_gray(90));
            }

            let played_fraction = if self.duration > 0.0 {
                (self.current_time / self.duration) as f32
            } else {
                0.0
            };
            let played = egui::Rect::from_min_max(track.min, egui::pos2(x_at(played_fraction), track.max.y));
            painter.rect_filled(played, 3.0, egui::Color32::from_rgb(220, 60, 60));

            let head_radius = if ui_response.hovered() || ui_response.dragged() { 7.0 } else { 5.0 };
            painter.circle_filled(
                egui::pos2(x_at(played_fraction), track.center().y),
                head_radius,
                egui::Color32::from_rgb(240, 80, 80),
            );

            if let Some(pos) = ui_response.hover_pos() {
                painter.line_segment(
                    [egui::pos2(pos.x, track.top() - 3.0), egui::pos2(pos.x, track.bottom() + 3.0)],
                    egui::Stroke::new(1.0, egui::Color32::WHITE),
                );
            }
        }

        if self.duration <= 0.0 {
            return response;
        }

        let time_at = |x: f32| {
            let fraction = ((x - rect.left()) / rect.width().max(1.0)).clamp(0.0, 1.0);
            fraction as f64 * self.duration
        };

        if ui_response.clicked() || ui_response.dragged() {
            if let Some(pos) = ui_response.interact_pointer_pos() {
                response.seek_to = Some(time_at(pos.x));
                response.is_scrubbing = ui_response.dragged();
            }
        }

        if let Some(pos) = ui_response.hover_pos() {
            let movement = ui.input(|i| i.pointer.delta().x);
            response.hover = Some((pos.x, movement));
        }

        response
    }
}
