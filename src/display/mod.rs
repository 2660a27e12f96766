//! Now-playing display - Native window showing a spinning record
//!
//! Shows the current track of the selected media player with its artwork on a
//! rotating disc, a progress bar with touch seek, transport buttons and a
//! volume overlay that fades in when the target stream's volume changes.

mod app;
pub mod artwork;
mod drawing;
pub mod engine;
pub mod overlay;
pub mod reconcile;
mod rendering;

pub use app::NowPlayingApp;
pub use engine::DisplayEngine;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::config::AppConfig;
use crate::surface::CommandRunner;

/// Entry point for the display
///
/// Blocks until the window is closed. Background queries run on `runtime`.
pub fn run_display(
    config: &AppConfig,
    runner: Arc<dyn CommandRunner>,
    runtime: Handle,
    volume_enabled: bool,
) -> Result<()> {
    let display = config.display.clone();
    let size = display.size as f32;
    let engine = DisplayEngine::new(config, runner, runtime.clone(), volume_enabled)?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Vinyl GW")
            .with_inner_size([size, size])
            .with_fullscreen(display.fullscreen),
        ..Default::default()
    };

    // Button taps spawn player commands from the UI thread
    let _guard = runtime.enter();

    eframe::run_native(
        "Vinyl GW",
        native_options,
        Box::new(move |_cc| Ok(Box::new(NowPlayingApp::new(engine, &display)))),
    )
    .map_err(|e| anyhow!("Display window failed: {}", e))
}
