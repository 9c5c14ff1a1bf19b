// src/main.rs
mod app;
mod ui;

use anyhow::{anyhow, Context};
use eframe::egui;
use tracing_subscriber::EnvFilter;

use morph_tree::config::MorphConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MorphConfig::load().context("loading configuration")?;
    config.log_summary();
    let app = app::MorphTreeApp::new(config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([900.0, 600.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Morph Tree",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(create_visuals());
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow!("error running viewer: {}", e))
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(22, 26, 34);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(40, 46, 58);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(52, 60, 74);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(46, 160, 90);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);
    visuals.window_rounding = egui::Rounding::same(12.0);

    visuals
}
