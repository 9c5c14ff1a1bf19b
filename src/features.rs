// src/features.rs - Per-frame hand features used by the gesture classifier
use nalgebra::{Vector2, Vector3};

use crate::landmarks::{index, LandmarkSet, FINGER_CHAINS};

/// Tip-to-wrist distance must exceed knuckle-to-wrist distance by this factor
/// for a finger to count as extended.
pub const DEFAULT_EXTENSION_RATIO: f64 = 1.5;

/// Features derived from one [`LandmarkSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandFeature {
    /// Centroid of the wrist and the four inner knuckles, normalized frame space.
    pub palm_center: Vector2<f64>,
    /// Number of extended non-thumb fingers (0..=4).
    pub extended_finger_count: u8,
}

/// Computes [`HandFeature`]s with a fixed extension ratio.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    extension_ratio: f64,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION_RATIO)
    }
}

impl FeatureExtractor {
    pub fn new(extension_ratio: f64) -> Self {
        Self { extension_ratio }
    }

    pub fn extract(&self, hand: &LandmarkSet) -> HandFeature {
        HandFeature {
            palm_center: palm_center(hand),
            extended_finger_count: self.extended_fingers(hand),
        }
    }

    fn extended_fingers(&self, hand: &LandmarkSet) -> u8 {
        let wrist = hand.wrist();
        FINGER_CHAINS
            .iter()
            .filter(|(base, tip)| {
                let base_dist = (hand.point(*base) - wrist).norm();
                let tip_dist = (hand.point(*tip) - wrist).norm();
                tip_dist > base_dist * self.extension_ratio
            })
            .count() as u8
    }
}

/// Five-point centroid: wrist plus index, middle, ring and pinky knuckles.
/// Steadier than the wrist alone when the hand tilts.
pub fn palm_center(hand: &LandmarkSet) -> Vector2<f64> {
    let sum: Vector3<f64> = [
        index::WRIST,
        index::INDEX_MCP,
        index::MIDDLE_MCP,
        index::RING_MCP,
        index::PINKY_MCP,
    ]
    .iter()
    .map(|&i| hand.point(i))
    .sum();
    let centroid = sum / 5.0;
    Vector2::new(centroid.x, centroid.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{synthesize_hand, HandPose};

    #[test]
    fn open_hand_counts_four_fingers() {
        let hand = synthesize_hand(&HandPose::open(0.5, 0.5));
        let feature = FeatureExtractor::default().extract(&hand);
        assert_eq!(feature.extended_finger_count, 4);
    }

    #[test]
    fn fist_counts_no_fingers() {
        let hand = synthesize_hand(&HandPose::closed(0.5, 0.5));
        let feature = FeatureExtractor::default().extract(&hand);
        assert_eq!(feature.extended_finger_count, 0);
    }

    #[test]
    fn partial_extension_counts_each_finger() {
        for n in 0..=4u8 {
            let hand = synthesize_hand(&HandPose::with_fingers(0.4, 0.6, n));
            let feature = FeatureExtractor::default().extract(&hand);
            assert_eq!(feature.extended_finger_count, n, "pose with {} fingers", n);
        }
    }

    #[test]
    fn thumb_is_ignored() {
        let mut raw = [[0.5, 0.5, 0.0]; 21];
        raw[index::WRIST] = [0.5, 0.8, 0.0];
        for (base, tip) in FINGER_CHAINS {
            raw[base] = [0.5, 0.6, 0.0];
            raw[tip] = [0.5, 0.65, 0.0];
        }
        // Thumb tip far away would count as extended if it were tested.
        raw[index::THUMB_TIP] = [0.0, 0.0, 0.0];
        let hand = LandmarkSet::from_points(&raw).expect("21 points");
        assert_eq!(FeatureExtractor::default().extract(&hand).extended_finger_count, 0);
    }

    #[test]
    fn palm_center_is_five_point_mean() {
        let mut raw = [[0.0, 0.0, 0.0]; 21];
        raw[index::WRIST] = [0.5, 1.0, 0.0];
        raw[index::INDEX_MCP] = [0.0, 0.0, 0.0];
        raw[index::MIDDLE_MCP] = [1.0, 0.0, 0.0];
        raw[index::RING_MCP] = [0.0, 0.5, 0.0];
        raw[index::PINKY_MCP] = [1.0, 0.5, 0.0];
        let hand = LandmarkSet::from_points(&raw).expect("21 points");
        let c = palm_center(&hand);
        assert!((c.x - 0.5).abs() < 1e-12);
        assert!((c.y - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ratio_is_strict() {
        // Tip exactly 1.5x the knuckle distance is not extended.
        let mut raw = [[0.0, 0.0, 0.0]; 21];
        raw[index::WRIST] = [0.0, 1.0, 0.0];
        for (base, tip) in FINGER_CHAINS {
            raw[base] = [0.0, 0.5, 0.0];
            raw[tip] = [0.0, 0.25, 0.0];
        }
        let hand = LandmarkSet::from_points(&raw).expect("21 points");
        assert_eq!(FeatureExtractor::new(1.5).extract(&hand).extended_finger_count, 0);
        assert_eq!(FeatureExtractor::new(1.4).extract(&hand).extended_finger_count, 4);
    }
}
