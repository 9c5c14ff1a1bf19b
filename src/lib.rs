// src/lib.rs - Gesture-driven morph between a scattered cloud and a formed tree
pub mod classifier;
pub mod config;
pub mod data;
pub mod detector;
pub mod features;
pub mod landmarks;
pub mod layout;
pub mod mode;
pub mod morph;
pub mod smoothing;
pub mod tracking;

pub use classifier::{FrameReport, GestureClassifier, GestureConfig, Observation};
pub use config::{ConfigError, MorphConfig};
pub use detector::{DetectorError, HandDetector, HandPose, SimulatedDetector};
pub use layout::{Layout, LayoutConfig};
pub use mode::{Mode, ModeChannel, ModeSnapshot};
pub use morph::{AnimationConfig, MorphEngine, SceneSink, Transform};
pub use tracking::{HandTracker, Liveness, TrackerStatus, TrackingConfig};
