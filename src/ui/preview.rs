// Scrub preview rendering: the thumbnail box that follows the pointer
// above the seek bar.

use crate::app::HoverPreview;
use eframe::egui;

const LABEL_HEIGHT: f32 = 18.0;
const GAP: f32 = 8.0;

/// Decode an encoded image (JPEG from the preview cache) into an egui texture.
pub fn load_preview_texture(
    ctx: &egui::Context,
    encoded: &[u8],
    name: &str,
) -> Option<egui::TextureHandle> {
    let image = image::load_from_memory(encoded).ok()?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.into_raw();

    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);

    Some(ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR))
}

/// Paint the hover preview above `bar`, kept inside the screen horizontally.
pub fn show_hover_preview(ctx: &egui::Context, preview: &HoverPreview, bar: egui::Rect) {
    let image_height = match &preview.texture {
        Some(texture) => {
            let size = texture.size_vec2();
            preview.width * size.y / size.x.max(1.0)
        }
        None => 0.0,
    };
    let height = image_height + LABEL_HEIGHT;

    let screen = ctx.screen_rect();
    let left = preview
        .left
        .clamp(screen.left(), (screen.right() - preview.width).max(screen.left()));
    let rect = egui::Rect::from_min_size(
        egui::pos2(left, bar.top() - GAP - height),
        egui::vec2(preview.width, height),
    );

    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Tooltip,
        egui::Id::new("scrub_preview_layer"),
    ));
    painter.rect_filled(rect.expand(2.0), 4.0, egui::Color32::from_black_alpha(220));

    if let Some(texture) = &preview.texture {
        let image_rect = egui::Rect::from_min_size(rect.min, egui::vec2(preview.width, image_height));
        painter.image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    painter.text(
        egui::pos2(rect.center().x, rect.bottom() - LABEL_HEIGHT / 2.0),
        egui::Align2::CENTER_CENTER,
        &preview.label,
        egui::FontId::proportional(13.0),
        egui::Color32::WHITE,
    );
}
