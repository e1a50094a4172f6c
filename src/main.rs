#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod ui;

use app::PlayerApp;
use eframe::egui;
use scrub_player::config::Settings;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scrub_player=info")),
        )
        .init();

    let settings = Settings::load_or_default();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("Scrub Player")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let initial = std::env::args_os().nth(1).map(std::path::PathBuf::from);

    eframe::run_native(
        "Scrub Player",
        options,
        Box::new(move |cc| {
            let mut app = PlayerApp::new(cc, settings);
            if let Some(path) = initial {
                app.open_file(path);
            }
            Ok(Box::new(app))
        }),
    )
}
