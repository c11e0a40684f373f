//! Hand-landmark samples as delivered by the perception model, and the
//! fingertip → cursor derivation.
//!
//! Keypoints follow the common 21-point hand layout: wrist at 0, then four
//! joints per finger from thumb to pinky, so the index fingertip is 8.
//! Coordinates are normalized to the camera image (0–1, `y` down).

use glam::Vec2;

pub const KEYPOINT_COUNT:   usize = 21;
pub const INDEX_FINGER_TIP: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Relative depth; unused by matching.
    pub z: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness { Left, Right, Unknown }

/// All keypoints of one detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub handedness: Handedness,
    pub keypoints:  Vec<Keypoint>,
}

/// One frame of perception output.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSample {
    /// Seconds on the session clock when the frame was captured.
    pub timestamp: f64,
    /// Empty when no hand was detected.
    pub hands:     Vec<HandLandmarks>,
}

impl LandmarkSample {
    /// A frame in which no hand was found.
    pub fn no_hands(timestamp: f64) -> Self {
        LandmarkSample { timestamp, hands: Vec::new() }
    }

    /// A frame with one hand whose only meaningful keypoint is the index
    /// fingertip at raw (un-mirrored) camera coordinates.
    pub fn fingertip(timestamp: f64, raw_x: f32, raw_y: f32) -> Self {
        let mut keypoints = vec![Keypoint::default(); KEYPOINT_COUNT];
        keypoints[INDEX_FINGER_TIP] = Keypoint { x: raw_x, y: raw_y, z: 0.0 };
        LandmarkSample {
            timestamp,
            hands: vec![HandLandmarks { handedness: Handedness::Unknown, keypoints }],
        }
    }
}

/// Display-space cursor for the first detected hand's index fingertip.
///
/// The camera faces the player, so `x` is mirrored (`1 - raw_x`) to make
/// the cursor follow the hand like a mirror would.  Returns `None` when no
/// hand carries a usable fingertip.
pub fn fingertip_cursor(sample: &LandmarkSample) -> Option<Vec2> {
    let tip = sample.hands.iter()
        .find_map(|h| h.keypoints.get(INDEX_FINGER_TIP))?;
    let cursor = Vec2::new(1.0 - tip.x, tip.y);
    cursor.is_finite().then_some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_x_keeps_y() {
        let s = LandmarkSample::fingertip(0.0, 0.25, 0.4);
        assert_eq!(fingertip_cursor(&s), Some(Vec2::new(0.75, 0.4)));
    }

    #[test]
    fn no_hand_no_cursor() {
        assert_eq!(fingertip_cursor(&LandmarkSample::no_hands(1.0)), None);
    }

    #[test]
    fn truncated_hand_is_skipped() {
        let mut s = LandmarkSample::fingertip(0.0, 0.25, 0.1);
        s.hands.insert(0, HandLandmarks {
            handedness: Handedness::Left,
            keypoints:  vec![Keypoint::default(); 4],
        });
        assert_eq!(fingertip_cursor(&s), Some(Vec2::new(0.75, 0.1)));
    }

    #[test]
    fn nan_fingertip_rejected() {
        let s = LandmarkSample::fingertip(0.0, f32::NAN, 0.5);
        assert_eq!(fingertip_cursor(&s), None);
    }
}
