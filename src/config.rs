// src/config.rs - JSON settings, environment overrides and validation
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::classifier::GestureConfig;
use crate::landmarks::FINGER_CHAINS;
use crate::layout::LayoutConfig;
use crate::morph::AnimationConfig;
use crate::tracking::TrackingConfig;

pub const CONFIG_ENV: &str = "MORPH_CONFIG";
pub const CONFIDENCE_FRAMES_ENV: &str = "MORPH_CONFIDENCE_FRAMES";
pub const SEED_ENV: &str = "MORPH_SEED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MorphConfig {
    pub gesture: GestureConfig,
    pub layout: LayoutConfig,
    pub animation: AnimationConfig,
    pub tracking: TrackingConfig,
}

impl MorphConfig {
    /// Defaults, overlaid by the file named in `MORPH_CONFIG` when set, then
    /// by individual environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty()) {
            Some(path) => read_config_file(Path::new(&path))?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = read_config_file(path)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(frames) = std::env::var(CONFIDENCE_FRAMES_ENV) {
            self.gesture.confidence_frames = frames.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a whole number of frames", CONFIDENCE_FRAMES_ENV))
            })?;
        }
        if let Ok(seed) = std::env::var(SEED_ENV) {
            self.layout.seed = seed
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be an unsigned integer", SEED_ENV)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gesture;
        if g.confidence_frames == 0 {
            return invalid("gesture.confidence_frames must be at least 1");
        }
        if g.closed_max_fingers >= g.open_min_fingers {
            return invalid("gesture.closed_max_fingers must be below gesture.open_min_fingers");
        }
        if g.open_min_fingers as usize > FINGER_CHAINS.len() {
            return invalid("gesture.open_min_fingers cannot exceed 4");
        }
        if !(g.extension_ratio > 1.0) {
            return invalid("gesture.extension_ratio must be greater than 1");
        }

        let l = &self.layout;
        for (name, value) in [
            ("layout.scatter_radius", l.scatter_radius),
            ("layout.cone_height", l.cone_height),
            ("layout.cone_radius", l.cone_radius),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if !(l.ball_weight >= 0.0 && l.gift_weight >= 0.0) || !(l.ball_weight + l.gift_weight > 0.0) {
            return invalid("layout ornament weights must be non-negative with a positive sum");
        }

        let a = &self.animation;
        if !(a.stagger >= 0.0 && a.stagger < 1.0) {
            return invalid("animation.stagger must be in [0, 1)");
        }
        if !(a.morph_rate > 0.0) {
            return invalid("animation.morph_rate must be positive");
        }
        if !(a.settle_threshold >= 0.0 && a.settle_threshold <= 1.0) {
            return invalid("animation.settle_threshold must be in [0, 1]");
        }
        if !(a.pulse_depth >= 0.0 && a.pulse_depth < 1.0) {
            return invalid("animation.pulse_depth must be in [0, 1)");
        }
        for (name, value) in [
            ("animation.jitter_amplitude", a.jitter_amplitude),
            ("animation.jitter_frequency", a.jitter_frequency),
            ("animation.spin_rate", a.spin_rate),
            ("animation.pulse_rate", a.pulse_rate),
            ("animation.parallax_rate", a.parallax_rate),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::Invalid(format!("{} must be finite and non-negative", name)));
            }
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            confidence_frames = self.gesture.confidence_frames,
            seed = self.layout.seed,
            elements = self.layout.foliage_count + self.layout.ornament_count + self.layout.light_count,
            initial_mode = %self.tracking.initial_mode,
            "configuration loaded"
        );
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}

fn read_config_file(path: &Path) -> Result<MorphConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;

    #[test]
    fn defaults_are_valid() {
        let cfg = MorphConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gesture.confidence_frames, 5);
        assert_eq!(cfg.tracking.initial_mode, Mode::Formed);
        assert_eq!(cfg.tracking.min_interval_ms, 33);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: MorphConfig =
            serde_json::from_str(r#"{ "gesture": { "confidence_frames": 8 }, "tracking": { "initial_mode": "scattered" } }"#)
                .expect("parse");
        assert_eq!(cfg.gesture.confidence_frames, 8);
        assert_eq!(cfg.gesture.open_min_fingers, 4);
        assert_eq!(cfg.tracking.initial_mode, Mode::Scattered);
        assert_eq!(cfg.layout, LayoutConfig::default());
    }

    #[test]
    fn rejects_overlapping_bands() {
        let mut cfg = MorphConfig::default();
        cfg.gesture.closed_max_fingers = 4;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_animation_values() {
        let mut cfg = MorphConfig::default();
        cfg.animation.stagger = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.morph_rate = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.layout.cone_radius = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_motion_values() {
        let mut cfg = MorphConfig::default();
        cfg.animation.pulse_depth = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.settle_threshold = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.settle_threshold = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.jitter_amplitude = -0.01;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.parallax_rate = f32::INFINITY;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.animation.pulse_depth = 0.0;
        cfg.animation.jitter_amplitude = 0.0;
        cfg.animation.settle_threshold = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_threshold_and_weak_ratio() {
        let mut cfg = MorphConfig::default();
        cfg.gesture.confidence_frames = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MorphConfig::default();
        cfg.gesture.extension_ratio = 1.0;
        assert!(cfg.validate().is_err());
    }
}
