//! Landmark normalization: raw detector output to a filtered, normalized keypoint map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::round_to;
use crate::pose_estimation::RawKeypoint;

pub const KEYPOINT_COUNT: usize = 17;

/// Landmarks at or below this confidence are treated as absent.
pub const MIN_KEYPOINT_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointName {
    /// Detector output order.
    pub const ALL: [KeypointName; KEYPOINT_COUNT] = [
        KeypointName::Nose,
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::LeftEar,
        KeypointName::RightEar,
        KeypointName::LeftShoulder,
        KeypointName::RightShoulder,
        KeypointName::LeftElbow,
        KeypointName::RightElbow,
        KeypointName::LeftWrist,
        KeypointName::RightWrist,
        KeypointName::LeftHip,
        KeypointName::RightHip,
        KeypointName::LeftKnee,
        KeypointName::RightKnee,
        KeypointName::LeftAnkle,
        KeypointName::RightAnkle,
    ];

    pub const FACE: [KeypointName; 5] = [
        KeypointName::LeftEar,
        KeypointName::RightEar,
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::Nose,
    ];
}

/// A surviving landmark in image-fraction coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub conf: f64,
}

/// Surviving landmarks of one image, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keypoints(BTreeMap<KeypointName, Keypoint>);

impl Keypoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: KeypointName, keypoint: Keypoint) {
        self.0.insert(name, keypoint);
    }

    pub fn get(&self, name: KeypointName) -> Option<&Keypoint> {
        self.0.get(&name)
    }

    pub fn contains(&self, name: KeypointName) -> bool {
        self.0.contains_key(&name)
    }

    pub fn any_of(&self, names: &[KeypointName]) -> bool {
        names.iter().any(|&n| self.contains(n))
    }

    pub fn all_of(&self, names: &[KeypointName]) -> bool {
        names.iter().all(|&n| self.contains(n))
    }

    /// The present landmarks among `names`, in the order given.
    pub fn select(&self, names: &[KeypointName]) -> Vec<Keypoint> {
        names.iter().filter_map(|&n| self.get(n).copied()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeypointName, &Keypoint)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(KeypointName, Keypoint)> for Keypoints {
    fn from_iter<T: IntoIterator<Item = (KeypointName, Keypoint)>>(iter: T) -> Self {
        Keypoints(iter.into_iter().collect())
    }
}

/// Filters and normalizes raw landmarks.
///
/// A landmark survives when its confidence is above [`MIN_KEYPOINT_CONFIDENCE`]
/// and it lies below the top edge (`y > 0`); detectors report off-canvas points
/// at the origin. Missing landmarks are not an error.
pub fn normalize_keypoints(raw: &[RawKeypoint], width: u32, height: u32) -> Keypoints {
    let (w, h) = (width as f64, height as f64);

    KeypointName::ALL
        .iter()
        .zip(raw.iter())
        .filter(|(_, kp)| kp.confidence > MIN_KEYPOINT_CONFIDENCE && kp.position.y > 0.0)
        .map(|(&name, kp)| {
            (
                name,
                Keypoint {
                    x: round_to(kp.position.x as f64 / w, 4),
                    y: round_to(kp.position.y as f64 / h, 4),
                    conf: round_to(kp.confidence as f64, 3),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_raw(confidence: f32) -> Vec<RawKeypoint> {
        (0..KEYPOINT_COUNT)
            .map(|i| RawKeypoint::new(10.0 * i as f32 + 5.0, 20.0 * i as f32 + 5.0, confidence))
            .collect()
    }

    #[test]
    fn keeps_confident_points_and_normalizes() {
        let kps = normalize_keypoints(&full_raw(0.9), 200, 400);
        assert_eq!(kps.len(), KEYPOINT_COUNT);

        let nose = kps.get(KeypointName::Nose).unwrap();
        assert_eq!(nose.x, 0.025);
        assert_eq!(nose.y, 0.0125);
        assert_eq!(nose.conf, 0.9);

        let ankle = kps.get(KeypointName::RightAnkle).unwrap();
        assert_eq!(ankle.x, 0.825);
        assert_eq!(ankle.y, 0.8125);
    }

    #[test]
    fn confidence_threshold_is_exclusive() {
        assert!(normalize_keypoints(&full_raw(0.3), 100, 100).is_empty());
        assert_eq!(normalize_keypoints(&full_raw(0.31), 100, 100).len(), KEYPOINT_COUNT);
    }

    #[test]
    fn drops_points_on_top_edge() {
        let mut raw = full_raw(0.9);
        raw[1] = RawKeypoint::new(40.0, 0.0, 0.95);
        raw[2] = RawKeypoint::new(40.0, -3.0, 0.95);

        let kps = normalize_keypoints(&raw, 100, 100);
        assert!(!kps.contains(KeypointName::LeftEye));
        assert!(!kps.contains(KeypointName::RightEye));
        assert!(kps.contains(KeypointName::Nose));
    }

    #[test]
    fn short_raw_array_yields_fewer_points() {
        let raw = full_raw(0.9)[..3].to_vec();
        let kps = normalize_keypoints(&raw, 100, 100);
        assert_eq!(kps.len(), 3);
        assert!(!kps.contains(KeypointName::LeftEar));
    }

    #[test]
    fn serializes_in_detector_order() {
        let kps = normalize_keypoints(&full_raw(0.9), 100, 100);
        let yaml = serde_yaml::to_string(&kps).unwrap();
        let nose = yaml.find("nose:").unwrap();
        let left_eye = yaml.find("left_eye:").unwrap();
        let right_ankle = yaml.find("right_ankle:").unwrap();
        assert!(nose < left_eye && left_eye < right_ankle);
    }
}
