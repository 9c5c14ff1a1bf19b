// src/classifier.rs - Debounced open/closed gesture classification
use nalgebra::Vector2;
use serde::Deserialize;
use tracing::{info, trace};

use crate::features::{FeatureExtractor, HandFeature, DEFAULT_EXTENSION_RATIO};
use crate::landmarks::DetectionFrame;
use crate::mode::{Mode, ModeSnapshot};
use crate::smoothing::PalmSmoother;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    /// A run must exceed this many frames before the mode commits.
    pub confidence_frames: u32,
    /// At least this many extended fingers reads as an open hand.
    pub open_min_fingers: u8,
    /// At most this many extended fingers reads as a closed hand.
    pub closed_max_fingers: u8,
    pub extension_ratio: f64,
    /// Smooth the reported palm position with a Kalman filter.
    pub position_smoothing: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_frames: 5,
            open_min_fingers: 4,
            closed_max_fingers: 1,
            extension_ratio: DEFAULT_EXTENSION_RATIO,
            position_smoothing: false,
        }
    }
}

/// Per-frame reading of the primary hand, before debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    NoHand,
    Closed,
    /// Between the closed and open bands; holds both runs.
    Ambiguous,
    Open,
}

impl Observation {
    pub fn from_finger_count(count: u8, config: &GestureConfig) -> Self {
        if count >= config.open_min_fingers {
            Observation::Open
        } else if count <= config.closed_max_fingers {
            Observation::Closed
        } else {
            Observation::Ambiguous
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Observation::NoHand => "no_hand",
            Observation::Closed => "closed",
            Observation::Ambiguous => "ambiguous",
            Observation::Open => "open",
        }
    }
}

/// Consecutive-frame run lengths. At most one of the two is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfidenceCounters {
    pub open_run: u32,
    pub closed_run: u32,
}

impl ConfidenceCounters {
    pub fn advance(self, observation: Observation) -> Self {
        match observation {
            Observation::NoHand => Self::default(),
            Observation::Open => Self {
                open_run: self.open_run.saturating_add(1),
                closed_run: 0,
            },
            Observation::Closed => Self {
                open_run: 0,
                closed_run: self.closed_run.saturating_add(1),
            },
            Observation::Ambiguous => self,
        }
    }

    /// Mode the runs vote for once one of them exceeds `threshold`.
    pub fn confirmed(self, threshold: u32) -> Option<Mode> {
        if self.open_run > threshold {
            Some(Mode::Scattered)
        } else if self.closed_run > threshold {
            Some(Mode::Formed)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
}

/// Outcome of one classifier step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub observation: Observation,
    pub feature: Option<HandFeature>,
    pub counters: ConfidenceCounters,
    pub hand_position: Option<Vector2<f64>>,
    pub hand_count: usize,
    pub two_hands: bool,
    /// Committed mode after this frame.
    pub mode: Mode,
    pub transition: Option<ModeTransition>,
}

impl FrameReport {
    pub fn snapshot(&self) -> ModeSnapshot {
        ModeSnapshot {
            mode: self.mode,
            hand_position: self.hand_position,
            two_hands: self.two_hands,
        }
    }
}

/// Turns the detector's per-frame output into a debounced [`Mode`].
pub struct GestureClassifier {
    config: GestureConfig,
    extractor: FeatureExtractor,
    counters: ConfidenceCounters,
    committed: Mode,
    smoother: Option<PalmSmoother>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig, initial: Mode) -> Self {
        let smoother = config.position_smoothing.then(PalmSmoother::new);
        Self {
            extractor: FeatureExtractor::new(config.extension_ratio),
            config,
            counters: ConfidenceCounters::default(),
            committed: initial,
            smoother,
        }
    }

    pub fn mode(&self) -> Mode {
        self.committed
    }

    pub fn counters(&self) -> ConfidenceCounters {
        self.counters
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn step(&mut self, frame: &DetectionFrame) -> FrameReport {
        let hand_count = frame.hand_count();
        let two_hands = hand_count >= 2;

        let Some(hand) = frame.primary() else {
            self.counters = self.counters.advance(Observation::NoHand);
            if let Some(smoother) = self.smoother.as_mut() {
                smoother.reset();
            }
            trace!("no hand; counters reset");
            return FrameReport {
                observation: Observation::NoHand,
                feature: None,
                counters: self.counters,
                hand_position: None,
                hand_count,
                two_hands,
                mode: self.committed,
                transition: None,
            };
        };

        let feature = self.extractor.extract(hand);
        let observation = Observation::from_finger_count(feature.extended_finger_count, &self.config);
        self.counters = self.counters.advance(observation);

        let hand_position = match self.smoother.as_mut() {
            Some(smoother) => smoother.update(feature.palm_center),
            None => feature.palm_center,
        };

        let transition = self.commit();
        trace!(
            fingers = feature.extended_finger_count,
            observation = observation.as_str(),
            open_run = self.counters.open_run,
            closed_run = self.counters.closed_run,
            "classified frame"
        );

        FrameReport {
            observation,
            feature: Some(feature),
            counters: self.counters,
            hand_position: Some(hand_position),
            hand_count,
            two_hands,
            mode: self.committed,
            transition,
        }
    }

    /// Set the mode from outside the gesture path, e.g. a UI button.
    ///
    /// Runs are cleared so a pose still held in front of the camera must be
    /// re-confirmed before it can undo the override.
    pub fn override_mode(&mut self, mode: Mode) -> Option<ModeTransition> {
        self.counters = ConfidenceCounters::default();
        if self.committed == mode {
            return None;
        }
        let transition = ModeTransition {
            from: self.committed,
            to: mode,
        };
        self.committed = mode;
        info!(from = %transition.from, to = %transition.to, "mode overridden");
        Some(transition)
    }

    fn commit(&mut self) -> Option<ModeTransition> {
        let confirmed = self.counters.confirmed(self.config.confidence_frames)?;
        if confirmed == self.committed {
            return None;
        }
        let transition = ModeTransition {
            from: self.committed,
            to: confirmed,
        };
        self.committed = confirmed;
        info!(
            from = %transition.from,
            to = %transition.to,
            open_run = self.counters.open_run,
            closed_run = self.counters.closed_run,
            "gesture committed mode"
        );
        Some(transition)
    }
}
