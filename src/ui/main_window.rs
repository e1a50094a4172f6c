use crate::app::{pick_video, PlayerApp};
use crate::ui::{show_hover_preview, SeekBar};
use eframe::egui;
use scrub_player::player::{PlaybackState, SPEED_PRESETS};
use scrub_player::utils::time::{format_size, remaining_time, seconds_to_time};

pub fn render_main_window(app: &mut PlayerApp, ctx: &egui::Context) {
    let show_controls = !app.display.controls_hidden;

    if show_controls && !app.display.fullscreen {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            render_menu_bar(app, ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            render_status_bar(app, ui);
        });
    }

    let mut seek_rect = None;
    if show_controls {
        egui::TopBottomPanel::bottom("controls_panel").show(ctx, |ui| {
            seek_rect = Some(render_seek_bar(app, ui));
            render_playback_controls(app, ui);
        });
    } else if app.seek_bar_hovered {
        app.leave_seek_bar();
    }

    egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(egui::Color32::BLACK))
        .show(ctx, |ui| {
            render_video_area(app, ui);
        });

    if let (Some(preview), Some(bar)) = (&app.hover_preview, seek_rect) {
        show_hover_preview(ctx, preview, bar);
    }
}

fn render_menu_bar(app: &mut PlayerApp, ui: &mut egui::Ui) {
    egui::menu::bar(ui, |ui| {
        ui.menu_button("File", |ui| {
            if ui.button("Open Video... (Ctrl+O)").clicked() {
                if let Some(path) = pick_video() {
                    app.open_file(path);
                }
                ui.close_menu();
            }
            if ui
                .add_enabled(app.player.is_some(), egui::Button::new("Close"))
                .clicked()
            {
                app.close_media(ui.ctx());
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Exit").clicked() {
                ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        ui.menu_button("Playback", |ui| {
            if ui.button("Play/Pause (Space)").clicked() {
                app.toggle_play_pause();
                ui.close_menu();
            }
            if ui.button("Rewind (J)").clicked() {
                app.rewind();
                ui.close_menu();
            }
            if ui.button("Forward (L)").clicked() {
                app.forward();
                ui.close_menu();
            }
            ui.separator();
            for (i, preset) in SPEED_PRESETS.iter().enumerate() {
                let active = (app.playback_rate() - preset).abs() < 1e-6;
                if ui
                    .selectable_label(active, format!("{}x ({})", preset, i + 1))
                    .clicked()
                {
                    app.toggle_speed_preset(*preset);
                    ui.close_menu();
                }
            }
            if ui.button("Normal Speed (R)").clicked() {
                app.set_playback_rate(1.0);
                ui.close_menu();
            }
        });

        ui.menu_button("View", |ui| {
            if ui.button("Fullscreen (F)").clicked() {
                app.toggle_fullscreen(ui.ctx());
                ui.close_menu();
            }
            if ui.button("Stretched Fullscreen (G)").clicked() {
                app.toggle_stretched_fullscreen(ui.ctx());
                ui.close_menu();
            }
            ui.separator();
            let mut stretch = app.display.is_stretched();
            if ui.checkbox(&mut stretch, "Stretch (S)").clicked() {
                app.display.toggle_stretch();
            }
            let mut zoom = app.display.is_zoom_cropped();
            if ui.checkbox(&mut zoom, "Zoom to Fill (Z)").clicked() {
                app.display.toggle_zoom_crop();
            }
            let mut remaining = app.display.show_remaining;
            if ui.checkbox(&mut remaining, "Show Remaining Time (T)").clicked() {
                app.display.toggle_remaining();
            }
            ui.separator();
            if ui.button("Hide Controls (H)").clicked() {
                app.display.toggle_controls();
                ui.close_menu();
            }
            if ui.button("Reset Scale (Ctrl+0)").clicked() {
                app.display.reset_scale();
                ui.close_menu();
            }
        });
    });
}

fn render_status_bar(app: &PlayerApp, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        if app.opening.is_some() {
            ui.spinner();
        }
        ui.label(&app.status_message);

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if let Some(ref player) = app.player {
                let info = &player.media.info;
                ui.label(player.media.resolution_string());
                if info.file_size > 0 {
                    ui.separator();
                    ui.label(format_size(info.file_size));
                }
                ui.separator();
            }

            let progress = app.scrub.progress();
            if progress.total() > 0 {
                let fraction = progress.fraction();
                if fraction < 1.0 {
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .desired_width(120.0)
                            .text(format!("{}/{}", progress.processed(), progress.total())),
                    );
                    ui.label("Previews:");
                } else {
                    ui.label("Previews ready");
                }
            }
        });
    });
}

/// Returns the seek bar's screen rect.
fn render_seek_bar(app: &mut PlayerApp, ui: &mut egui::Ui) -> egui::Rect {
    let response = SeekBar::new(app.get_duration(), app.current_time)
        .preprocessed(app.scrub.preprocessed_spans())
        .show(ui);

    app.set_seek_bar_geometry(response.rect);

    if let Some(time) = response.seek_to {
        app.seek(time);
    }
    if response.is_scrubbing {
        ui.ctx().request_repaint();
    }

    match response.hover {
        Some((pointer_x, movement_x)) => app.hover_seek_bar(ui.ctx(), pointer_x, movement_x),
        None if app.seek_bar_hovered => app.leave_seek_bar(),
        None => {}
    }

    response.rect
}

fn render_playback_controls(app: &mut PlayerApp, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        let state = app.get_playback_state();
        let duration = app.get_duration();
        let skip = app.settings.player.time_skip_secs;

        if ui
            .button("<<")
            .on_hover_text(format!("Rewind {}s (J)", skip))
            .clicked()
        {
            app.rewind();
        }

        let play_pause_text = match state {
            PlaybackState::Playing => "||",
            _ => ">",
        };
        if ui.button(play_pause_text).on_hover_text("Play/Pause (Space)").clicked() {
            app.toggle_play_pause();
        }

        if ui
            .button(">>")
            .on_hover_text(format!("Forward {}s (L)", skip))
            .clicked()
        {
            app.forward();
        }

        ui.separator();

        let time_label = if app.display.show_remaining {
            remaining_time(app.current_time, duration)
        } else {
            seconds_to_time(app.current_time)
        };
        if ui
            .add(egui::Label::new(format!("{} / {}", time_label, seconds_to_time(duration))).sense(egui::Sense::click()))
            .on_hover_text("Click to toggle remaining time (T)")
            .clicked()
        {
            app.display.toggle_remaining();
        }

        ui.separator();

        ui.label("Vol:");
        let mut volume = app.volume;
        if ui
            .add(egui::Slider::new(&mut volume, 0.0..=2.0).show_value(false))
            .changed()
        {
            app.set_volume(volume);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let config = &app.settings.player;
            let (min, max) = (config.min_playback_rate, config.max_playback_rate);
            let mut rate = app.playback_rate();
            if ui
                .add(
                    egui::DragValue::new(&mut rate)
                        .range(min..=max)
                        .speed(0.01)
                        .fixed_decimals(2)
                        .suffix("x"),
                )
                .on_hover_text("Playback speed (-/+, R to reset)")
                .changed()
            {
                app.set_playback_rate(rate);
            }
            ui.label("Speed:");
        });
    });
}

fn render_video_area(app: &mut PlayerApp, ui: &mut egui::Ui) {
    let area = ui.available_rect_before_wrap();
    let response = ui.allocate_rect(area, egui::Sense::click());

    if response.double_clicked() {
        app.toggle_fullscreen(ui.ctx());
    } else if response.clicked() {
        app.toggle_play_pause();
    }

    if let Some(ref texture) = app.video_texture {
        let layout = app.display.layout(area, texture.size_vec2());
        ui.painter_at(area)
            .image(texture.id(), layout.rect, layout.uv, egui::Color32::WHITE);
    } else {
        let text = match (&app.opening, &app.player) {
            (Some(path), _) => format!("Opening {}...", path.display()),
            (None, Some(player)) => format!(
                "{}\n{} | {}",
                player.media.filename(),
                player.media.resolution_string(),
                seconds_to_time(player.duration())
            ),
            (None, None) => "No video loaded\nDrag & drop or File > Open Video...".to_string(),
        };
        ui.painter().text(
            area.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(16.0),
            egui::Color32::GRAY,
        );
    }
}
