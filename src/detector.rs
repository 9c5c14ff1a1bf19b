// src/detector.rs - Hand detector seam plus a synthetic detector for demos and tests
use image::DynamicImage;
use nalgebra::Vector3;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::landmarks::{index, DetectionFrame, LandmarkSet, FINGER_CHAINS, LANDMARK_COUNT};

#[derive(Debug, Error)]
pub enum DetectorError {
    /// The model or camera permission could not be obtained.
    #[error("hand detector unavailable: {0}")]
    Unavailable(String),
    #[error("hand detection failed: {0}")]
    Inference(String),
}

/// Landmark model collaborator. Called once per ingestion cycle with the
/// latest captured frame.
pub trait HandDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Result<DetectionFrame, DetectorError>;
}

/// Description of a synthetic hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    pub center_x: f64,
    pub center_y: f64,
    /// Index, middle, ring, pinky.
    pub extended: [bool; 4],
    pub scale: f64,
}

impl HandPose {
    pub fn with_fingers(center_x: f64, center_y: f64, count: u8) -> Self {
        let mut extended = [false; 4];
        for finger in extended.iter_mut().take(count.min(4) as usize) {
            *finger = true;
        }
        Self {
            center_x,
            center_y,
            extended,
            scale: 1.0,
        }
    }

    pub fn open(center_x: f64, center_y: f64) -> Self {
        Self::with_fingers(center_x, center_y, 4)
    }

    pub fn closed(center_x: f64, center_y: f64) -> Self {
        Self::with_fingers(center_x, center_y, 0)
    }
}

const KNUCKLE_X: [f64; 4] = [-0.045, -0.015, 0.015, 0.045];

/// Build a plausible 21-point hand for `pose` in normalized frame space
/// (y grows downward, fingers point up).
pub fn synthesize_hand(pose: &HandPose) -> LandmarkSet {
    let s = pose.scale;
    let (cx, cy) = (pose.center_x, pose.center_y);
    let at = |dx: f64, dy: f64| Vector3::new(cx + dx * s, cy + dy * s, 0.0);

    let mut points = [Vector3::zeros(); LANDMARK_COUNT];
    points[index::WRIST] = at(0.0, 0.10);
    points[index::THUMB_CMC] = at(-0.05, 0.07);
    points[index::THUMB_MCP] = at(-0.08, 0.04);
    points[index::THUMB_IP] = at(-0.10, 0.01);
    points[index::THUMB_TIP] = at(-0.11, -0.02);

    for (finger, &(mcp, tip)) in FINGER_CHAINS.iter().enumerate() {
        let x = KNUCKLE_X[finger];
        let (pip_dy, dip_dy, tip_dy) = if pose.extended[finger] {
            (-0.07, -0.11, -0.15)
        } else {
            // Folded back over the palm.
            (-0.05, -0.03, 0.0)
        };
        points[mcp] = at(x, -0.02);
        points[mcp + 1] = at(x, pip_dy);
        points[mcp + 2] = at(x, dip_dy);
        points[tip] = at(x, tip_dy);
    }

    LandmarkSet::new(points)
}

#[derive(Debug, Default)]
struct SimState {
    hands: Vec<HandPose>,
    failing: bool,
}

/// Handle for steering a [`SimulatedDetector`] from outside the tracker.
#[derive(Debug, Clone, Default)]
pub struct SimControl {
    state: Arc<Mutex<SimState>>,
}

impl SimControl {
    pub fn set_hands(&self, hands: Vec<HandPose>) {
        if let Ok(mut state) = self.state.lock() {
            state.hands = hands;
        }
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failing = failing;
        }
    }

    pub fn hands(&self) -> Vec<HandPose> {
        self.state.lock().map(|s| s.hands.clone()).unwrap_or_default()
    }

    pub fn is_failing(&self) -> bool {
        self.state.lock().map(|s| s.failing).unwrap_or(false)
    }
}

/// Detector that ignores pixels and reports synthetic hands.
///
/// Queued script frames are consumed first, one per call; once the script is
/// exhausted the live poses set through [`SimControl`] are reported.
pub struct SimulatedDetector {
    control: SimControl,
    script: VecDeque<Vec<HandPose>>,
}

impl SimulatedDetector {
    pub fn new() -> (Self, SimControl) {
        let control = SimControl::default();
        (
            Self {
                control: control.clone(),
                script: VecDeque::new(),
            },
            control,
        )
    }

    pub fn scripted(script: impl IntoIterator<Item = Vec<HandPose>>) -> Self {
        Self {
            control: SimControl::default(),
            script: script.into_iter().collect(),
        }
    }

    pub fn remaining_script(&self) -> usize {
        self.script.len()
    }
}

impl HandDetector for SimulatedDetector {
    fn detect(&mut self, _frame: &DynamicImage) -> Result<DetectionFrame, DetectorError> {
        if self.control.is_failing() {
            return Err(DetectorError::Inference("simulated detector fault".to_string()));
        }
        let poses = match self.script.pop_front() {
            Some(poses) => poses,
            None => self.control.hands(),
        };
        Ok(DetectionFrame::with_hands(
            poses.iter().map(synthesize_hand).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn script_is_consumed_before_live_poses() {
        let mut detector = SimulatedDetector::scripted(vec![
            vec![HandPose::open(0.5, 0.5)],
            vec![],
        ]);
        assert_eq!(detector.detect(&blank()).map(|f| f.hand_count()).ok(), Some(1));
        assert_eq!(detector.detect(&blank()).map(|f| f.hand_count()).ok(), Some(0));
        assert_eq!(detector.remaining_script(), 0);
        assert_eq!(detector.detect(&blank()).map(|f| f.hand_count()).ok(), Some(0));
    }

    #[test]
    fn control_steers_live_detection() {
        let (mut detector, control) = SimulatedDetector::new();
        control.set_hands(vec![HandPose::open(0.2, 0.5), HandPose::closed(0.8, 0.5)]);
        let frame = detector.detect(&blank()).expect("detect");
        assert_eq!(frame.hand_count(), 2);

        control.set_failing(true);
        assert!(matches!(detector.detect(&blank()), Err(DetectorError::Inference(_))));
    }

    #[test]
    fn synthetic_hand_is_centred_on_pose() {
        let hand = synthesize_hand(&HandPose::open(0.4, 0.6));
        assert!((hand.wrist().x - 0.4).abs() < 1e-12);
        assert!(hand.point(index::MIDDLE_TIP).y < hand.wrist().y);
    }
}
