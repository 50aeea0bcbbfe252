//! Data Sweeper - Tabular File Cleaner & Format Converter
//!
//! Upload CSV or Excel files, remove duplicates, fill missing numbers,
//! pick columns, chart them and download the result as CSV or Excel.

mod charts;
mod config;
mod data;
mod export;
mod gui;
mod session;

use config::SweeperConfig;
use eframe::egui;
use gui::SweeperApp;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SweeperConfig::load()?;
    info!(?config, "starting Data Sweeper");

    // Configure native options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([900.0, 600.0])
            .with_title("Data Sweeper"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Data Sweeper",
        options,
        Box::new(move |cc| Ok(Box::new(SweeperApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start window: {e}"))
}
