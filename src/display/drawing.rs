//! Low-level drawing primitives for the now-playing display
//!
//! Contains helpers for the spinning disc, transport glyphs and rounded bars.

use egui::epaint::{Mesh, Vertex};
use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, TextureId};
use std::f32::consts::TAU;

/// Segments used to approximate circles built from triangles
const CIRCLE_SEGMENTS: u32 = 96;

/// Draw a texture cropped to a circle and rotated by `angle` degrees
///
/// The texture is mapped as a triangle fan so the crop and the rotation cost
/// nothing beyond the mesh itself.
pub fn draw_rotated_label(
    painter: &Painter,
    texture: TextureId,
    center: Pos2,
    radius: f32,
    angle: f32,
) {
    let mut mesh = Mesh::with_texture(texture);
    let rotation = angle.to_radians();

    mesh.vertices.push(Vertex {
        pos: center,
        uv: egui::pos2(0.5, 0.5),
        color: Color32::WHITE,
    });

    for i in 0..=CIRCLE_SEGMENTS {
        let theta = TAU * i as f32 / CIRCLE_SEGMENTS as f32;
        let (sin, cos) = theta.sin_cos();
        let (uv_sin, uv_cos) = (theta - rotation).sin_cos();
        mesh.vertices.push(Vertex {
            pos: egui::pos2(center.x + cos * radius, center.y + sin * radius),
            uv: egui::pos2(0.5 + 0.5 * uv_cos, 0.5 + 0.5 * uv_sin),
            color: Color32::WHITE,
        });
    }

    for i in 1..=CIRCLE_SEGMENTS {
        mesh.add_triangle(0, i, i + 1);
    }

    painter.add(Shape::mesh(mesh));
}

/// Draw grooves as faint concentric rings between two radii
pub fn draw_grooves(painter: &Painter, center: Pos2, inner: f32, outer: f32, count: usize) {
    if count == 0 || outer <= inner {
        return;
    }
    let step = (outer - inner) / count as f32;
    for i in 0..count {
        let r = inner + step * (i as f32 + 0.5);
        let shade = if i % 2 == 0 { 34 } else { 26 };
        painter.circle_stroke(center, r, Stroke::new(1.0, Color32::from_gray(shade)));
    }
}

/// Draw a sheen across the disc so the rotation is visible
pub fn draw_sheen(painter: &Painter, center: Pos2, inner: f32, outer: f32, angle: f32) {
    let color = Color32::from_rgba_unmultiplied(255, 255, 255, 18);
    for offset in [0.0_f32, 180.0] {
        let (sin, cos) = (angle + offset).to_radians().sin_cos();
        painter.line_segment(
            [
                egui::pos2(center.x + cos * inner, center.y + sin * inner),
                egui::pos2(center.x + cos * outer, center.y + sin * outer),
            ],
            Stroke::new(outer * 0.04, color),
        );
    }
}

/// Solid triangle pointing right (`dir` = 1.0) or left (`dir` = -1.0)
pub fn draw_triangle(painter: &Painter, center: Pos2, size: f32, dir: f32, color: Color32) {
    let half = size / 2.0;
    let points = vec![
        egui::pos2(center.x - half * dir, center.y - half),
        egui::pos2(center.x - half * dir, center.y + half),
        egui::pos2(center.x + half * dir, center.y),
    ];
    painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
}

/// Two vertical bars
pub fn draw_pause(painter: &Painter, center: Pos2, size: f32, color: Color32) {
    let bar = egui::vec2(size * 0.28, size);
    for dx in [-size * 0.25, size * 0.25] {
        let rect = Rect::from_center_size(egui::pos2(center.x + dx, center.y), bar);
        painter.rect_filled(rect, size * 0.05, color);
    }
}

/// Triangle plus a bar, pointing in `dir`
pub fn draw_skip(painter: &Painter, center: Pos2, size: f32, dir: f32, color: Color32) {
    draw_triangle(
        painter,
        egui::pos2(center.x - size * 0.1 * dir, center.y),
        size * 0.8,
        dir,
        color,
    );
    let bar = Rect::from_center_size(
        egui::pos2(center.x + size * 0.4 * dir, center.y),
        egui::vec2(size * 0.14, size * 0.8),
    );
    painter.rect_filled(bar, 0.0, color);
}

/// Horizontal bar with a filled portion (`fill` in `[0, 1]`)
pub fn draw_bar(painter: &Painter, rect: Rect, fill: f32, track: Color32, color: Color32) {
    let rounding = rect.height() / 2.0;
    painter.rect_filled(rect, rounding, track);

    let fill = fill.clamp(0.0, 1.0);
    if fill > 0.0 {
        let mut filled = rect;
        filled.set_width((rect.width() * fill).max(rect.height()));
        painter.rect_filled(filled, rounding, color);
    }
}

/// Apply an opacity (0-255) to an opaque color
pub fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}
