//! Rendering functions for the now-playing display
//!
//! Everything is laid out relative to the window so the same code drives a
//! 1080px round screen and a small desktop window.

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, TextureHandle};

use super::drawing::{
    draw_bar, draw_grooves, draw_pause, draw_rotated_label, draw_sheen, draw_skip, draw_triangle,
    with_alpha,
};
use super::engine::FrameView;

pub const BACKGROUND: Color32 = Color32::from_rgb(12, 12, 14);
const VINYL: Color32 = Color32::from_rgb(18, 18, 20);
const LABEL: Color32 = Color32::from_rgb(150, 40, 40);
const TEXT: Color32 = Color32::from_gray(235);
const TEXT_DIM: Color32 = Color32::from_gray(150);
const ACCENT: Color32 = Color32::from_rgb(230, 180, 90);
const TRACK: Color32 = Color32::from_gray(55);

/// Reference edge the proportions below were tuned for
const REFERENCE_SIZE: f32 = 1080.0;

/// Screen regions, computed once per frame from the window rect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub scale: f32,
    pub disc_center: Pos2,
    pub disc_radius: f32,
    pub label_radius: f32,
    pub title_pos: Pos2,
    pub artist_pos: Pos2,
    pub progress: Rect,
    pub previous: Rect,
    pub play_pause: Rect,
    pub next: Rect,
    pub overlay: Rect,
}

impl Layout {
    pub fn new(screen: Rect) -> Self {
        let scale = screen.width().min(screen.height()) / REFERENCE_SIZE;
        let center = screen.center();
        let disc_center = egui::pos2(center.x, center.y - 150.0 * scale);
        let disc_radius = 330.0 * scale;

        let button = egui::vec2(110.0 * scale, 110.0 * scale);
        let buttons_y = center.y + 400.0 * scale;

        Self {
            scale,
            disc_center,
            disc_radius,
            label_radius: 150.0 * scale,
            title_pos: egui::pos2(center.x, center.y + 235.0 * scale),
            artist_pos: egui::pos2(center.x, center.y + 285.0 * scale),
            progress: Rect::from_center_size(
                egui::pos2(center.x, center.y + 330.0 * scale),
                egui::vec2(560.0 * scale, 10.0 * scale),
            ),
            previous: Rect::from_center_size(egui::pos2(center.x - 160.0 * scale, buttons_y), button),
            play_pause: Rect::from_center_size(egui::pos2(center.x, buttons_y), button),
            next: Rect::from_center_size(egui::pos2(center.x + 160.0 * scale, buttons_y), button),
            overlay: Rect::from_center_size(
                disc_center,
                egui::vec2(360.0 * scale, 150.0 * scale),
            ),
        }
    }

    /// Fraction of the progress bar under `x`
    pub fn progress_fraction(&self, x: f32) -> f32 {
        ((x - self.progress.left()) / self.progress.width().max(1.0)).clamp(0.0, 1.0)
    }
}

/// Render the spinning record with the artwork (or a plain label) at its center
pub fn render_disc(painter: &Painter, layout: &Layout, angle: f32, artwork: Option<&TextureHandle>) {
    let center = layout.disc_center;
    let radius = layout.disc_radius;

    painter.circle_filled(center, radius, VINYL);
    draw_grooves(painter, center, layout.label_radius * 1.08, radius * 0.97, 36);
    draw_sheen(painter, center, layout.label_radius * 1.1, radius * 0.95, angle);
    painter.circle_stroke(center, radius, egui::Stroke::new(2.0, Color32::from_gray(40)));

    match artwork {
        Some(texture) => {
            draw_rotated_label(painter, texture.id(), center, layout.label_radius, angle);
        }
        None => {
            painter.circle_filled(center, layout.label_radius, LABEL);
        }
    }

    // Spindle hole
    painter.circle_filled(center, 9.0 * layout.scale, BACKGROUND);
}

/// Render title and artist, or an idle hint when nothing is playing
pub fn render_track_text(painter: &Painter, layout: &Layout, view: &FrameView<'_>) {
    let Some(snapshot) = view.snapshot else {
        painter.text(
            layout.title_pos,
            Align2::CENTER_CENTER,
            "No player",
            FontId::proportional(40.0 * layout.scale),
            TEXT_DIM,
        );
        return;
    };

    let title = if snapshot.title.is_empty() {
        "Unknown title"
    } else {
        snapshot.title.as_str()
    };

    painter.text(
        layout.title_pos,
        Align2::CENTER_CENTER,
        ellipsize(title, 34),
        FontId::proportional(44.0 * layout.scale),
        TEXT,
    );
    painter.text(
        layout.artist_pos,
        Align2::CENTER_CENTER,
        ellipsize(&snapshot.artist, 40),
        FontId::proportional(32.0 * layout.scale),
        TEXT_DIM,
    );
}

/// Render the progress bar with elapsed and total time on either side
pub fn render_progress(painter: &Painter, layout: &Layout, view: &FrameView<'_>) {
    let Some(snapshot) = view.snapshot else {
        return;
    };

    let rect = layout.progress;
    draw_bar(painter, rect, view.progress.unwrap_or(0.0), TRACK, ACCENT);

    let font = FontId::monospace(22.0 * layout.scale);
    let gap = 16.0 * layout.scale;
    painter.text(
        egui::pos2(rect.left() - gap, rect.center().y),
        Align2::RIGHT_CENTER,
        format_time(view.position),
        font.clone(),
        TEXT_DIM,
    );
    if let Some(duration) = snapshot.duration {
        painter.text(
            egui::pos2(rect.right() + gap, rect.center().y),
            Align2::LEFT_CENTER,
            format_time(duration),
            font,
            TEXT_DIM,
        );
    }
}

/// Render previous / play-pause / next buttons
pub fn render_transport(painter: &Painter, layout: &Layout, playing: bool) {
    let glyph = 44.0 * layout.scale;
    let ring = egui::Stroke::new(2.0, Color32::from_gray(70));

    for rect in [layout.previous, layout.play_pause, layout.next] {
        painter.circle_stroke(rect.center(), rect.width() / 2.0, ring);
    }

    draw_skip(painter, layout.previous.center(), glyph, -1.0, TEXT);
    if playing {
        draw_pause(painter, layout.play_pause.center(), glyph, TEXT);
    } else {
        draw_triangle(
            painter,
            egui::pos2(layout.play_pause.center().x + glyph * 0.08, layout.play_pause.center().y),
            glyph,
            1.0,
            TEXT,
        );
    }
    draw_skip(painter, layout.next.center(), glyph, 1.0, TEXT);
}

/// Render the volume overlay at its current opacity
pub fn render_volume_overlay(painter: &Painter, layout: &Layout, view: &FrameView<'_>) {
    let alpha = view.overlay_alpha;
    if alpha == 0 {
        return;
    }

    let rect = layout.overlay;
    let panel_alpha = (u16::from(alpha) * 220 / 255) as u8;
    painter.rect_filled(
        rect,
        24.0 * layout.scale,
        Color32::from_rgba_unmultiplied(0, 0, 0, panel_alpha),
    );

    let label = if view.muted {
        "Muted".to_string()
    } else {
        format!("{}%", view.overlay_value.round() as i64)
    };
    painter.text(
        egui::pos2(rect.center().x, rect.top() + rect.height() * 0.38),
        Align2::CENTER_CENTER,
        label,
        FontId::proportional(64.0 * layout.scale),
        with_alpha(TEXT, alpha),
    );

    let bar = Rect::from_center_size(
        egui::pos2(rect.center().x, rect.top() + rect.height() * 0.78),
        egui::vec2(rect.width() * 0.8, 12.0 * layout.scale),
    );
    let fill = (view.overlay_value / view.overlay_max.max(1.0)) as f32;
    let color = if view.muted { TEXT_DIM } else { ACCENT };
    draw_bar(painter, bar, fill, with_alpha(TRACK, alpha), with_alpha(color, alpha));
}

/// `m:ss`, or `h:mm:ss` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
