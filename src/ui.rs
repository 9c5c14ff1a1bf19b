// src/ui.rs - Scene projection and status widgets for the viewer
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use nalgebra::{UnitQuaternion, Vector3};

use morph_tree::layout::{Color, GroupKind};
use morph_tree::mode::Mode;
use morph_tree::morph::{SceneSink, Transform};

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub secondary: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(46, 160, 90),
            secondary: Color32::from_rgb(230, 190, 80),
            background: Color32::from_rgb(8, 12, 22),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sprite {
    color: Color32,
    transform: Transform,
}

/// Renderer side of the engine: keeps the last written colour and transform
/// per element and paints them with an orthographic camera.
pub struct ProjectionSink {
    groups: Vec<(GroupKind, Vec<Sprite>)>,
    frames: u64,
}

impl ProjectionSink {
    pub fn new() -> Self {
        Self {
            groups: GroupKind::ALL.iter().map(|&k| (k, Vec::new())).collect(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn slot(&mut self, group: GroupKind, index: usize) -> &mut Sprite {
        let slot = match self.groups.iter().position(|(k, _)| *k == group) {
            Some(slot) => slot,
            None => {
                self.groups.push((group, Vec::new()));
                self.groups.len() - 1
            }
        };
        let sprites = &mut self.groups[slot].1;
        if sprites.len() <= index {
            sprites.resize(
                index + 1,
                Sprite {
                    color: Color32::WHITE,
                    transform: Transform::at(Vector3::zeros()),
                },
            );
        }
        &mut sprites[index]
    }

    /// Paint every element into `rect`, rotated about `focus` by `view`.
    pub fn paint(&self, painter: &egui::Painter, rect: Rect, focus: Vector3<f32>, extent: f32, view: UnitQuaternion<f32>) {
        painter.rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(8, 12, 22));

        let scale = rect.width().min(rect.height()) * 0.5 / extent.max(1e-3);
        let center = rect.center();

        let mut projected: Vec<(f32, Pos2, f32, Color32)> = Vec::new();
        for (kind, sprites) in &self.groups {
            let base = match kind {
                GroupKind::Foliage => 1.6,
                GroupKind::Ornaments => 4.0,
                GroupKind::Lights => 2.4,
            };
            for sprite in sprites {
                let p = view * (sprite.transform.position - focus);
                let pos = Pos2::new(center.x + p.x * scale, center.y - p.y * scale);
                if rect.contains(pos) {
                    projected.push((p.z, pos, base * sprite.transform.scale, sprite.color));
                }
            }
        }
        // Far to near.
        projected.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, pos, radius, color) in projected {
            painter.circle_filled(pos, radius, color);
        }
    }
}

impl SceneSink for ProjectionSink {
    fn write_color(&mut self, group: GroupKind, index: usize, color: Color) {
        let [r, g, b] = color.to_rgb8();
        self.slot(group, index).color = Color32::from_rgb(r, g, b);
    }

    fn write_transform(&mut self, group: GroupKind, index: usize, transform: &Transform) {
        self.slot(group, index).transform = *transform;
    }

    fn commit_frame(&mut self) {
        self.frames += 1;
    }
}

pub struct UIComponents {
    pub theme: Theme,
}

impl UIComponents {
    pub fn new() -> Self {
        Self { theme: Theme::default() }
    }

    pub fn draw_mode_indicator(&self, ui: &mut egui::Ui, mode: Mode, progress: f32) {
        let size = Vec2::splat(120.0);
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let center = rect.center();
        let radius = rect.width() * 0.45;

        let painter = ui.painter();
        painter.circle_filled(center, radius, self.theme.surface);

        let color = match mode {
            Mode::Formed => self.theme.primary,
            Mode::Scattered => self.theme.secondary,
        };
        let arc_angle = progress.clamp(0.0, 1.0) * std::f32::consts::TAU;
        draw_arc(
            painter,
            center,
            radius * 0.9,
            -std::f32::consts::FRAC_PI_2,
            -std::f32::consts::FRAC_PI_2 + arc_angle,
            color,
            5.0,
        );

        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            mode.as_str().to_uppercase(),
            egui::FontId::proportional(16.0),
            self.theme.text_primary,
        );
        painter.text(
            Pos2::new(center.x, center.y + radius * 0.45),
            egui::Align2::CENTER_CENTER,
            format!("{:.0}%", progress * 100.0),
            egui::FontId::proportional(12.0),
            self.theme.text_secondary,
        );
    }

    /// Run length against the commit threshold.
    pub fn draw_confidence_bar(&self, ui: &mut egui::Ui, label: &str, run: u32, threshold: u32) {
        ui.horizontal(|ui| {
            ui.label(label);

            let bar_width = 160.0;
            let bar_height = 18.0;
            let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;
            let painter = ui.painter();

            painter.rect_filled(rect, egui::Rounding::same(4.0), self.theme.surface);

            let value = (run as f32 / (threshold + 1) as f32).min(1.0);
            let fill_rect = Rect::from_min_size(rect.min, Vec2::new(bar_width * value, bar_height));
            let color = if run > threshold {
                self.theme.success
            } else if run > 0 {
                self.theme.warning
            } else {
                self.theme.error
            };
            painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                format!("{} / {}", run, threshold + 1),
                egui::FontId::proportional(12.0),
                self.theme.text_primary,
            );
        });
    }

    /// Miniature camera frame with the palm centre marked.
    pub fn draw_hand_marker(&self, ui: &mut egui::Ui, hand: Option<(f64, f64)>, two_hands: bool) {
        let (rect, _) = ui.allocate_exact_size(Vec2::new(160.0, 90.0), egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_filled(rect, egui::Rounding::same(4.0), self.theme.surface);
        painter.rect_stroke(rect, egui::Rounding::same(4.0), Stroke::new(1.0, self.theme.text_secondary));

        match hand {
            Some((x, y)) => {
                let pos = Pos2::new(
                    rect.left() + x.clamp(0.0, 1.0) as f32 * rect.width(),
                    rect.top() + y.clamp(0.0, 1.0) as f32 * rect.height(),
                );
                let color = if two_hands { self.theme.warning } else { self.theme.success };
                painter.circle_filled(pos, 5.0, color);
                painter.circle_stroke(pos, 7.0, Stroke::new(2.0, self.theme.text_primary));
            }
            None => {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "No hand",
                    egui::FontId::proportional(14.0),
                    self.theme.text_secondary,
                );
            }
        }
    }
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = ((end_angle - start_angle).abs() * 50.0) as usize;
    if points_count == 0 {
        return;
    }
    let points: Vec<Pos2> = (0..=points_count)
        .map(|i| {
            let t = i as f32 / points_count as f32;
            let angle = start_angle + (end_angle - start_angle) * t;
            Pos2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();

    for pair in points.windows(2) {
        painter.line_segment([pair[0], pair[1]], Stroke::new(thickness, color));
    }
}
