// src/morph.rs - Per-frame morph between the scattered and formed layouts
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::Deserialize;
use std::f32::consts::{PI, TAU};
use tracing::debug;

use crate::layout::{Color, ElementCategory, ElementInstance, GroupKind, Layout};
use crate::mode::{Mode, ModeSnapshot};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    /// Rate constant `k` of the exponential approach, per second.
    pub morph_rate: f32,
    /// Fraction of the progress range used to stagger elements by phase.
    pub stagger: f32,
    /// Eased progress above which settled elements start to drift.
    pub settle_threshold: f32,
    pub jitter_amplitude: f32,
    pub jitter_frequency: f32,
    /// Gift spin, radians per second at speed 1.0.
    pub spin_rate: f32,
    /// Light pulse, radians per second at speed 1.0.
    pub pulse_rate: f32,
    pub pulse_depth: f32,
    pub parallax_yaw: f32,
    pub parallax_pitch: f32,
    pub parallax_rate: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            morph_rate: 2.0,
            stagger: 0.35,
            settle_threshold: 0.97,
            jitter_amplitude: 0.05,
            jitter_frequency: 1.5,
            spin_rate: 0.8,
            pulse_rate: 3.0,
            pulse_depth: 0.25,
            parallax_yaw: 0.6,
            parallax_pitch: 0.25,
            parallax_rate: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: f32,
}

impl Transform {
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
            scale: 1.0,
        }
    }
}

/// Rendering collaborator. Writes persist until overwritten.
pub trait SceneSink {
    fn write_color(&mut self, group: GroupKind, index: usize, color: Color);
    fn write_transform(&mut self, group: GroupKind, index: usize, transform: &Transform);
    /// Called once after every element of a frame has been written.
    fn commit_frame(&mut self) {}
}

/// Symmetric cubic ease: `ease(t) + ease(1 - t) == 1`.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Group progress shifted by the element's phase. Higher phases lag behind.
pub fn element_progress(group: f32, phase: f32, stagger: f32) -> f32 {
    ((group - phase * stagger) / (1.0 - stagger)).clamp(0.0, 1.0)
}

/// Pure positional blend; 0 is scattered, 1 is formed.
pub fn blend(scattered: &Vector3<f32>, formed: &Vector3<f32>, eased: f32) -> Vector3<f32> {
    scattered.lerp(formed, eased)
}

/// Frame-rate independent exponential approach toward a binary target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphProgress {
    value: f32,
    rate: f32,
}

impl MorphProgress {
    pub fn new(value: f32, rate: f32) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            rate,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn advance(&mut self, target: f32, dt: f32) -> f32 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let alpha = 1.0 - (-self.rate * dt).exp();
        self.value += (target - self.value) * alpha;
        self.value
    }
}

/// Angle of a cycle running at `rate` radians per second, wrapped to
/// `[0, 2π)` in double precision so long sessions keep full resolution.
fn cycle(time: f64, rate: f32) -> f32 {
    (time * rate as f64).rem_euclid(std::f64::consts::TAU) as f32
}

/// Additive drift for elements that have (nearly) arrived. Zero below the
/// settle threshold and fades in above it.
fn settle_jitter(eased: f32, time: f64, element: &ElementInstance, config: &AnimationConfig) -> Vector3<f32> {
    if eased <= config.settle_threshold || config.settle_threshold >= 1.0 {
        return Vector3::zeros();
    }
    let weight = (eased - config.settle_threshold) / (1.0 - config.settle_threshold);
    let rate = config.jitter_frequency * element.speed();
    let offset = element.phase() * TAU;
    Vector3::new(
        (cycle(time, rate) + offset).sin(),
        (cycle(time, rate * 1.3) + offset * 2.0).sin() * 0.5,
        (cycle(time, rate * 0.7) + offset * 3.0).cos(),
    ) * (config.jitter_amplitude * weight)
}

/// Orientation and scale for one element. Depends on time and the element's
/// own speed, never on morph progress.
pub fn secondary_motion(
    category: ElementCategory,
    position: &Vector3<f32>,
    time: f64,
    speed: f32,
    phase: f32,
    config: &AnimationConfig,
) -> (UnitQuaternion<f32>, f32) {
    match category {
        ElementCategory::Foliage => (UnitQuaternion::identity(), 1.0),
        ElementCategory::Gift => {
            let rate = config.spin_rate * speed;
            let spin = cycle(time, rate) + phase * TAU;
            let tumble = cycle(time, rate * 0.5) + phase * PI;
            (UnitQuaternion::from_euler_angles(0.0, spin, tumble), 1.0)
        }
        ElementCategory::Ball => {
            // Face the trunk; the direction stays horizontal so it is never
            // parallel to the up vector.
            let to_axis = Vector3::new(-position.x, 0.0, -position.z);
            let rotation = if to_axis.norm_squared() > 1e-8 {
                UnitQuaternion::face_towards(&to_axis, &Vector3::y())
            } else {
                UnitQuaternion::identity()
            };
            (rotation, 1.0)
        }
        ElementCategory::Light => {
            let pulse = (cycle(time, config.pulse_rate * speed) + phase * TAU).sin();
            (UnitQuaternion::identity(), 1.0 + config.pulse_depth * pulse)
        }
    }
}

/// One population sharing a progress scalar.
#[derive(Debug, Clone)]
pub struct MorphGroup {
    kind: GroupKind,
    elements: Vec<ElementInstance>,
    progress: MorphProgress,
}

impl MorphGroup {
    fn rate_scale(kind: GroupKind) -> f32 {
        match kind {
            GroupKind::Foliage => 1.0,
            // Ornaments trail the foliage slightly, lights lead it.
            GroupKind::Ornaments => 0.85,
            GroupKind::Lights => 1.15,
        }
    }

    pub fn new(kind: GroupKind, elements: Vec<ElementInstance>, initial: Mode, config: &AnimationConfig) -> Self {
        let mut group = Self {
            kind,
            elements,
            progress: MorphProgress::new(initial.target(), config.morph_rate * Self::rate_scale(kind)),
        };
        group.pose(0.0, config);
        group
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn progress(&self) -> f32 {
        self.progress.value()
    }

    pub fn elements(&self) -> &[ElementInstance] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Jitter-free blended positions at the current group progress.
    pub fn blended_positions(&self, stagger: f32) -> Vec<Vector3<f32>> {
        let p = self.progress.value();
        self.elements
            .iter()
            .map(|e| {
                let eased = ease_in_out_cubic(element_progress(p, e.phase(), stagger));
                blend(&e.scattered(), &e.formed(), eased)
            })
            .collect()
    }

    fn advance(&mut self, target: f32, dt: f32, time: f64, config: &AnimationConfig) {
        self.progress.advance(target, dt);
        self.pose(time, config);
    }

    fn pose(&mut self, time: f64, config: &AnimationConfig) {
        let p = self.progress.value();
        for e in &mut self.elements {
            let eased = ease_in_out_cubic(element_progress(p, e.phase(), config.stagger));
            let base = blend(&e.scattered(), &e.formed(), eased);
            let position = base + settle_jitter(eased, time, e, config);
            let (rotation, scale) =
                secondary_motion(e.category(), &position, time, e.speed(), e.phase(), config);
            e.transform = Transform {
                position,
                rotation,
                scale,
            };
        }
    }
}

/// Scene tilt that follows the hand, relaxing to level when the hand is gone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandParallax {
    pub yaw: f32,
    pub pitch: f32,
}

impl HandParallax {
    fn advance(&mut self, hand: Option<Vector2<f64>>, dt: f32, config: &AnimationConfig) {
        let (target_yaw, target_pitch) = match hand {
            Some(p) => (
                // The camera image is mirrored: moving right turns the scene right.
                -((p.x as f32 - 0.5) * 2.0).clamp(-1.0, 1.0) * config.parallax_yaw,
                ((p.y as f32 - 0.5) * 2.0).clamp(-1.0, 1.0) * config.parallax_pitch,
            ),
            None => (0.0, 0.0),
        };
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let alpha = 1.0 - (-config.parallax_rate * dt).exp();
        self.yaw += (target_yaw - self.yaw) * alpha;
        self.pitch += (target_pitch - self.pitch) * alpha;
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(self.pitch, self.yaw, 0.0)
    }
}

/// Drives every group from the latest [`ModeSnapshot`].
pub struct MorphEngine {
    groups: Vec<MorphGroup>,
    config: AnimationConfig,
    /// Seconds since start. Kept in `f64` so small steps still register
    /// after hours of running.
    time: f64,
    parallax: HandParallax,
    colors_written: bool,
    target_mode: Mode,
}

impl MorphEngine {
    pub fn new(layout: Layout, config: AnimationConfig, initial: Mode) -> Self {
        let groups = layout
            .groups
            .into_iter()
            .map(|(kind, elements)| MorphGroup::new(kind, elements, initial, &config))
            .collect();
        Self {
            groups,
            config,
            time: 0.0,
            parallax: HandParallax::default(),
            colors_written: false,
            target_mode: initial,
        }
    }

    pub fn groups(&self) -> &[MorphGroup] {
        &self.groups
    }

    pub fn group(&self, kind: GroupKind) -> Option<&MorphGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn parallax(&self) -> HandParallax {
        self.parallax
    }

    /// Mean progress over all elements, 0 scattered, 1 formed.
    pub fn overall_progress(&self) -> f32 {
        let (sum, count) = self.groups.iter().fold((0.0f32, 0usize), |(s, c), g| {
            (s + g.progress() * g.len() as f32, c + g.len())
        });
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Advance by `dt` seconds toward the snapshot's mode.
    pub fn update(&mut self, dt: f32, snapshot: &ModeSnapshot) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if snapshot.mode != self.target_mode {
            debug!(from = %self.target_mode, to = %snapshot.mode, "morph target changed");
            self.target_mode = snapshot.mode;
        }
        self.time += dt as f64;
        let target = snapshot.mode.target();
        for group in &mut self.groups {
            group.advance(target, dt, self.time, &self.config);
        }
        self.parallax.advance(snapshot.hand_position, dt, &self.config);
    }

    /// Hand the current state to the renderer. Colours go out on the first
    /// call only.
    pub fn render(&mut self, sink: &mut dyn SceneSink) {
        if !self.colors_written {
            for group in &self.groups {
                for (i, e) in group.elements.iter().enumerate() {
                    sink.write_color(group.kind, i, e.color());
                }
            }
            self.colors_written = true;
        }
        for group in &self.groups {
            for (i, e) in group.elements.iter().enumerate() {
                sink.write_transform(group.kind, i, &e.transform);
            }
        }
        sink.commit_frame();
    }

    pub fn frame(&mut self, dt: f32, snapshot: &ModeSnapshot, sink: &mut dyn SceneSink) {
        self.update(dt, snapshot);
        self.render(sink);
    }
}
