// src/layout.rs - Scattered and formed position tables, built once per population
use nalgebra::Vector3;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use thiserror::Error;
use tracing::debug;

use crate::morph::Transform;

/// Golden ratio.
pub const PHI: f64 = 1.618_033_988_749_895;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid category weights: {0}")]
    Weights(#[from] rand::distributions::WeightedError),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub seed: u64,
    pub scatter_radius: f32,
    /// Height of the scatter sphere's centre; the scene's focal point.
    pub focal_height: f32,
    pub cone_height: f32,
    pub cone_radius: f32,
    pub foliage_count: usize,
    pub ornament_count: usize,
    pub light_count: usize,
    pub ball_weight: f64,
    pub gift_weight: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            scatter_radius: 15.0,
            focal_height: 6.0,
            cone_height: 12.0,
            cone_radius: 5.0,
            foliage_count: 1500,
            ornament_count: 220,
            light_count: 160,
            ball_weight: 0.6,
            gift_weight: 0.4,
        }
    }
}

/// What an element looks like and which secondary motion it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCategory {
    Foliage,
    Ball,
    Gift,
    Light,
}

impl ElementCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementCategory::Foliage => "foliage",
            ElementCategory::Ball => "ball",
            ElementCategory::Gift => "gift",
            ElementCategory::Light => "light",
        }
    }

    fn palette(self) -> &'static [Color] {
        match self {
            ElementCategory::Foliage => &FOLIAGE_PALETTE,
            ElementCategory::Ball => &BALL_PALETTE,
            ElementCategory::Gift => &GIFT_PALETTE,
            ElementCategory::Light => &LIGHT_PALETTE,
        }
    }
}

static FOLIAGE_PALETTE: [Color; 3] = [
    Color::rgb(0.05, 0.35, 0.12),
    Color::rgb(0.08, 0.45, 0.18),
    Color::rgb(0.12, 0.55, 0.22),
];

static BALL_PALETTE: [Color; 3] = [
    Color::rgb(0.80, 0.08, 0.10),
    Color::rgb(0.95, 0.75, 0.20),
    Color::rgb(0.80, 0.82, 0.88),
];

static GIFT_PALETTE: [Color; 4] = [
    Color::rgb(0.75, 0.10, 0.15),
    Color::rgb(0.10, 0.45, 0.25),
    Color::rgb(0.15, 0.30, 0.75),
    Color::rgb(0.90, 0.70, 0.15),
];

static LIGHT_PALETTE: [Color; 2] = [Color::rgb(1.00, 0.92, 0.70), Color::rgb(1.00, 0.80, 0.35)];

/// Linear RGB in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

/// One animated element. Both layout positions, phase, speed and colour are
/// fixed at build time; only the transform changes afterwards.
#[derive(Debug, Clone)]
pub struct ElementInstance {
    scattered: Vector3<f32>,
    formed: Vector3<f32>,
    phase: f32,
    speed: f32,
    category: ElementCategory,
    color: Color,
    pub(crate) transform: Transform,
}

impl ElementInstance {
    pub fn scattered(&self) -> Vector3<f32> {
        self.scattered
    }

    pub fn formed(&self) -> Vector3<f32> {
        self.formed
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn category(&self) -> ElementCategory {
        self.category
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

/// Animated groups; each has its own progress scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Foliage,
    Ornaments,
    Lights,
}

impl GroupKind {
    pub const ALL: [GroupKind; 3] = [GroupKind::Foliage, GroupKind::Ornaments, GroupKind::Lights];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupKind::Foliage => "foliage",
            GroupKind::Ornaments => "ornaments",
            GroupKind::Lights => "lights",
        }
    }
}

/// Uniform point in a solid sphere. The cube root on the radius keeps volume
/// density even instead of piling points near the centre.
pub fn sample_in_sphere<R: Rng + ?Sized>(rng: &mut R, center: Vector3<f32>, radius: f32) -> Vector3<f32> {
    let cos_theta: f32 = rng.gen_range(-1.0..=1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let azimuth: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = radius * rng.gen::<f32>().cbrt();
    center + Vector3::new(sin_theta * azimuth.cos(), cos_theta, sin_theta * azimuth.sin()) * r
}

/// Angular position of element `i` on the golden-angle spiral, in `[0, 2π)`.
pub fn phyllotaxis_angle(i: usize) -> f64 {
    (i as f64 * TAU * PHI).rem_euclid(TAU)
}

/// Element `i` of `n` on a cone rising from y = 0: height grows and radius
/// shrinks linearly with `i / n`.
pub fn cone_position(i: usize, n: usize, height: f32, radius: f32) -> Vector3<f32> {
    let t = i as f32 / n.max(1) as f32;
    let r = radius * (1.0 - t);
    let angle = phyllotaxis_angle(i) as f32;
    Vector3::new(r * angle.cos(), t * height, r * angle.sin())
}

/// Bounded per-category perturbation of the cone placement.
struct ConeVariant {
    radius_range: (f32, f32),
    angle_jitter: f32,
}

impl ConeVariant {
    fn for_group(kind: GroupKind) -> Self {
        match kind {
            // Fill the cone's volume rather than its skin.
            GroupKind::Foliage => Self {
                radius_range: (0.55, 1.0),
                angle_jitter: 0.2,
            },
            // Hang just outside the foliage.
            GroupKind::Ornaments => Self {
                radius_range: (1.02, 1.10),
                angle_jitter: 0.1,
            },
            GroupKind::Lights => Self {
                radius_range: (1.0, 1.04),
                angle_jitter: 0.0,
            },
        }
    }

    fn place<R: Rng + ?Sized>(&self, rng: &mut R, i: usize, n: usize, config: &LayoutConfig) -> Vector3<f32> {
        let base = cone_position(i, n, config.cone_height, config.cone_radius);
        let factor = rng.gen_range(self.radius_range.0..=self.radius_range.1);
        let jitter = if self.angle_jitter > 0.0 {
            rng.gen_range(-self.angle_jitter..=self.angle_jitter)
        } else {
            0.0
        };
        let (sin, cos) = jitter.sin_cos();
        // Rotate about the trunk then push out along the radius.
        let x = base.x * cos - base.z * sin;
        let z = base.x * sin + base.z * cos;
        Vector3::new(x * factor, base.y, z * factor)
    }
}

/// All element groups for one scene.
#[derive(Debug, Clone)]
pub struct Layout {
    pub groups: Vec<(GroupKind, Vec<ElementInstance>)>,
}

impl Layout {
    pub fn build(config: &LayoutConfig) -> Result<Self, LayoutError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let ornament_kinds = [ElementCategory::Ball, ElementCategory::Gift];
        let ornament_weights = WeightedIndex::new([config.ball_weight, config.gift_weight])?;

        let mut groups = Vec::with_capacity(GroupKind::ALL.len());
        for kind in GroupKind::ALL {
            let count = match kind {
                GroupKind::Foliage => config.foliage_count,
                GroupKind::Ornaments => config.ornament_count,
                GroupKind::Lights => config.light_count,
            };
            let variant = ConeVariant::for_group(kind);
            let center = Vector3::new(0.0, config.focal_height, 0.0);

            let elements = (0..count)
                .map(|i| {
                    let category = match kind {
                        GroupKind::Foliage => ElementCategory::Foliage,
                        GroupKind::Ornaments => ornament_kinds[ornament_weights.sample(&mut rng)],
                        GroupKind::Lights => ElementCategory::Light,
                    };
                    let palette = category.palette();
                    let color = palette[rng.gen_range(0..palette.len())];
                    let scattered = sample_in_sphere(&mut rng, center, config.scatter_radius);
                    let formed = variant.place(&mut rng, i, count, config);
                    ElementInstance {
                        scattered,
                        formed,
                        phase: rng.gen::<f32>(),
                        speed: rng.gen_range(0.5..1.5),
                        category,
                        color,
                        transform: Transform::at(scattered),
                    }
                })
                .collect::<Vec<_>>();

            debug!(group = kind.as_str(), count, "built population");
            groups.push((kind, elements));
        }

        Ok(Self { groups })
    }

    pub fn element_count(&self) -> usize {
        self.groups.iter().map(|(_, e)| e.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LayoutConfig {
        LayoutConfig {
            foliage_count: 400,
            ornament_count: 2000,
            light_count: 50,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn scattered_points_stay_inside_sphere() {
        let mut rng = StdRng::seed_from_u64(7);
        let center = Vector3::new(0.0, 6.0, 0.0);
        for _ in 0..5000 {
            let p = sample_in_sphere(&mut rng, center, 15.0);
            assert!((p - center).norm() <= 15.0 + 1e-4);
        }
    }

    #[test]
    fn scattered_density_is_volumetric() {
        // Uniform volume puts 1/8 of the points inside half the radius.
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let inner = (0..n)
            .filter(|_| sample_in_sphere(&mut rng, Vector3::zeros(), 1.0).norm() < 0.5)
            .count();
        let ratio = inner as f64 / n as f64;
        assert!((ratio - 0.125).abs() < 0.02, "inner ratio {}", ratio);
    }

    #[test]
    fn cone_rises_and_narrows() {
        let n = 100;
        let bottom = cone_position(0, n, 12.0, 5.0);
        let middle = cone_position(50, n, 12.0, 5.0);
        assert!((bottom.y - 0.0).abs() < 1e-6);
        assert!((Vector3::new(bottom.x, 0.0, bottom.z).norm() - 5.0).abs() < 1e-4);
        assert!((middle.y - 6.0).abs() < 1e-5);
        assert!((Vector3::new(middle.x, 0.0, middle.z).norm() - 2.5).abs() < 1e-4);
    }

    #[test]
    fn golden_angles_are_evenly_spread() {
        for n in [50usize, 200, 1000, 3000] {
            let mut angles: Vec<f64> = (0..n).map(phyllotaxis_angle).collect();
            angles.sort_by(|a, b| a.total_cmp(b));
            let mut min_gap = TAU - angles[n - 1] + angles[0];
            for pair in angles.windows(2) {
                min_gap = min_gap.min(pair[1] - pair[0]);
            }
            let floor = TAU / (3.0 * n as f64);
            assert!(min_gap > floor, "n={} min gap {} below {}", n, min_gap, floor);
        }
    }

    #[test]
    fn build_is_deterministic_for_a_seed() {
        let config = small_config();
        let a = Layout::build(&config).expect("layout");
        let b = Layout::build(&config).expect("layout");
        for ((_, ea), (_, eb)) in a.groups.iter().zip(&b.groups) {
            for (x, y) in ea.iter().zip(eb) {
                assert_eq!(x.scattered(), y.scattered());
                assert_eq!(x.formed(), y.formed());
                assert_eq!(x.phase(), y.phase());
                assert_eq!(x.category(), y.category());
            }
        }
        assert_eq!(a.element_count(), 2450);
    }

    #[test]
    fn phase_and_speed_are_in_range() {
        let layout = Layout::build(&small_config()).expect("layout");
        for (_, elements) in &layout.groups {
            for e in elements {
                assert!((0.0..1.0).contains(&e.phase()));
                assert!(e.speed() > 0.0);
            }
        }
    }

    #[test]
    fn ornament_categories_follow_weights() {
        let layout = Layout::build(&small_config()).expect("layout");
        let (_, ornaments) = layout
            .groups
            .iter()
            .find(|(k, _)| *k == GroupKind::Ornaments)
            .expect("ornament group");
        let balls = ornaments.iter().filter(|e| e.category() == ElementCategory::Ball).count();
        let gifts = ornaments.iter().filter(|e| e.category() == ElementCategory::Gift).count();
        assert_eq!(balls + gifts, ornaments.len());
        let ratio = balls as f64 / ornaments.len() as f64;
        assert!((ratio - 0.6).abs() < 0.05, "ball ratio {}", ratio);
    }

    #[test]
    fn formed_layout_stays_near_cone() {
        let config = small_config();
        let layout = Layout::build(&config).expect("layout");
        for (kind, elements) in &layout.groups {
            for e in elements {
                let f = e.formed();
                assert!(f.y >= 0.0 && f.y <= config.cone_height);
                let radial = (f.x * f.x + f.z * f.z).sqrt();
                let shell = config.cone_radius * (1.0 - f.y / config.cone_height);
                assert!(radial <= shell * 1.1 + 1e-4, "{:?} radial {} shell {}", kind, radial, shell);
            }
        }
    }

    #[test]
    fn zero_weights_are_rejected() {
        let config = LayoutConfig {
            ball_weight: 0.0,
            gift_weight: 0.0,
            ..small_config()
        };
        assert!(Layout::build(&config).is_err());
    }
}
