//! Main application struct for the now-playing display.
//!
//! [`NowPlayingApp`] implements eframe::App. Each frame it advances the
//! [`DisplayEngine`], uploads changed artwork, draws the scene with the
//! functions from [`super::rendering`] and turns clicks into player commands.

use std::time::{Duration, Instant};

use super::engine::DisplayEngine;
use super::rendering::{
    render_disc, render_progress, render_track_text, render_transport, render_volume_overlay,
    Layout, BACKGROUND,
};
use crate::config::DisplayConfig;

pub struct NowPlayingApp {
    engine: DisplayEngine,
    artwork: Option<egui::TextureHandle>,
    last_frame: Instant,
    frame_interval: Duration,
    hide_cursor: bool,
}

impl NowPlayingApp {
    pub fn new(engine: DisplayEngine, config: &DisplayConfig) -> Self {
        Self {
            engine,
            artwork: None,
            last_frame: Instant::now(),
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1))),
            hide_cursor: config.fullscreen,
        }
    }

    fn upload_artwork(&mut self, ctx: &egui::Context) {
        if let Some(update) = self.engine.take_artwork_update() {
            self.artwork = update
                .map(|image| ctx.load_texture("artwork", image, egui::TextureOptions::LINEAR));
        }
    }
}

impl eframe::App for NowPlayingApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.engine.frame(now, dt);
        self.upload_artwork(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND))
            .show(ctx, |ui| {
                let layout = Layout::new(ui.max_rect());
                let painter = ui.painter();

                {
                    let view = self.engine.view(now);
                    render_disc(painter, &layout, view.angle, self.artwork.as_ref());
                    render_track_text(painter, &layout, &view);
                    render_progress(painter, &layout, &view);
                    render_transport(painter, &layout, view.playing);
                    render_volume_overlay(painter, &layout, &view);
                }

                let click = |rect: egui::Rect, name: &str| {
                    ui.interact(rect, ui.id().with(name), egui::Sense::click())
                };

                if click(layout.previous, "previous").clicked() {
                    self.engine.previous();
                }
                if click(layout.play_pause, "play_pause").clicked() {
                    self.engine.play_pause();
                }
                if click(layout.next, "next").clicked() {
                    self.engine.next();
                }

                let bar = click(layout.progress.expand(12.0 * layout.scale), "progress");
                if bar.clicked() {
                    if let Some(pos) = bar.interact_pointer_pos() {
                        self.engine.seek_fraction(layout.progress_fraction(pos.x), now);
                    }
                }
            });

        if self.hide_cursor {
            ctx.set_cursor_icon(egui::CursorIcon::None);
        }

        ctx.request_repaint_after(self.frame_interval);
    }
}
