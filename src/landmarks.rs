// src/landmarks.rs - Hand landmark sets as delivered by the detector
use nalgebra::Vector3;

/// Number of landmarks in one detected hand.
pub const LANDMARK_COUNT: usize = 21;

/// MediaPipe hand landmark indices.
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// (base knuckle, tip) pairs for the four non-thumb fingers.
pub const FINGER_CHAINS: [(usize, usize); 4] = [
    (index::INDEX_MCP, index::INDEX_TIP),
    (index::MIDDLE_MCP, index::MIDDLE_TIP),
    (index::RING_MCP, index::RING_TIP),
    (index::PINKY_MCP, index::PINKY_TIP),
];

/// The 21 landmarks of one detected hand.
///
/// x and y are normalized to the frame (0.0 to 1.0), z is depth relative to
/// the wrist.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Vector3<f64>; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Vector3<f64>; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build from raw `[x, y, z]` triples. Returns `None` unless exactly 21
    /// points are supplied.
    pub fn from_points(raw: &[[f64; 3]]) -> Option<Self> {
        if raw.len() != LANDMARK_COUNT {
            return None;
        }

        let mut points = [Vector3::zeros(); LANDMARK_COUNT];
        for (slot, lm) in points.iter_mut().zip(raw) {
            *slot = Vector3::new(lm[0], lm[1], lm[2]);
        }
        Some(Self { points })
    }

    pub fn point(&self, idx: usize) -> Vector3<f64> {
        self.points[idx]
    }

    pub fn wrist(&self) -> Vector3<f64> {
        self.points[index::WRIST]
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }
}

/// Everything the detector found in a single video frame, ranked by the
/// detector (first hand is the one the classifier reads).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionFrame {
    pub hands: Vec<LandmarkSet>,
}

impl DetectionFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hands(hands: Vec<LandmarkSet>) -> Self {
        Self { hands }
    }

    pub fn primary(&self) -> Option<&LandmarkSet> {
        self.hands.first()
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_requires_exactly_21() {
        let short = vec![[0.5, 0.5, 0.0]; 20];
        assert!(LandmarkSet::from_points(&short).is_none());

        let mut raw = vec![[0.5, 0.5, 0.0]; 21];
        raw[index::INDEX_TIP] = [0.1, 0.2, 0.3];
        let set = LandmarkSet::from_points(&raw).expect("21 points");
        assert_eq!(set.point(index::INDEX_TIP), Vector3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn primary_is_first_ranked_hand() {
        let a = LandmarkSet::new([Vector3::new(0.1, 0.1, 0.0); LANDMARK_COUNT]);
        let b = LandmarkSet::new([Vector3::new(0.9, 0.9, 0.0); LANDMARK_COUNT]);
        let frame = DetectionFrame::with_hands(vec![a.clone(), b]);
        assert_eq!(frame.primary(), Some(&a));
        assert_eq!(frame.hand_count(), 2);
        assert!(DetectionFrame::empty().primary().is_none());
    }
}
