//! Pose metrics derived from normalized keypoints.
//!
//! Each metric is resolved through an ordered fallback chain: paired
//! anatomical landmarks first, then a single facial landmark, then a constant.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geometry::round_to;
use crate::keypoints::{KeypointName as K, Keypoints};

pub const DEFAULT_EYELINE_Y: f64 = 0.15;
pub const DEFAULT_ANKLE_Y: f64 = 0.90;
pub const DEFAULT_CENTER_X: f64 = 0.50;
pub const MIN_BODY_HEIGHT: f64 = 0.3;

const EYES: [K; 2] = [K::LeftEye, K::RightEye];
const ANKLES: [K; 2] = [K::LeftAnkle, K::RightAnkle];
const SHOULDERS: [K; 2] = [K::LeftShoulder, K::RightShoulder];
const HIPS: [K; 2] = [K::LeftHip, K::RightHip];
const FACE_CENTER: [K; 3] = [K::Nose, K::LeftEye, K::RightEye];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMetrics {
    pub eyeline_y: f64,
    pub ankle_y: f64,
    pub center_x: f64,
    pub body_height: f64,
}

impl Default for PoseMetrics {
    fn default() -> Self {
        Self {
            eyeline_y: DEFAULT_EYELINE_Y,
            ankle_y: DEFAULT_ANKLE_Y,
            center_x: DEFAULT_CENTER_X,
            body_height: round_to(DEFAULT_ANKLE_Y - DEFAULT_EYELINE_Y, 4),
        }
    }
}

/// Which signal a metric was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    Eyes,
    Nose,
    Ankles,
    TorsoPairs,
    FaceLandmarks,
    Default,
}

/// One step of a fallback chain.
pub struct FallbackRule {
    pub source: MetricSource,
    pub applies: fn(&Keypoints) -> bool,
    pub compute: fn(&Keypoints) -> f64,
}

/// Evaluates `rules` in order and returns the first applicable result.
///
/// Chains end with an always-applicable constant; an exhausted chain
/// resolves to `default` all the same.
pub fn resolve(rules: &[FallbackRule], keypoints: &Keypoints, default: f64) -> (f64, MetricSource) {
    rules
        .iter()
        .find(|rule| (rule.applies)(keypoints))
        .map(|rule| ((rule.compute)(keypoints), rule.source))
        .unwrap_or((default, MetricSource::Default))
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

fn always(_: &Keypoints) -> bool {
    true
}

fn has_eye(kps: &Keypoints) -> bool {
    kps.any_of(&EYES)
}

fn eye_mean_y(kps: &Keypoints) -> f64 {
    mean(kps.select(&EYES).iter().map(|k| k.y))
}

fn has_nose(kps: &Keypoints) -> bool {
    kps.contains(K::Nose)
}

fn nose_y(kps: &Keypoints) -> f64 {
    kps.get(K::Nose).map_or(DEFAULT_EYELINE_Y, |k| k.y)
}

fn default_eyeline(_: &Keypoints) -> f64 {
    DEFAULT_EYELINE_Y
}

fn has_ankle(kps: &Keypoints) -> bool {
    kps.any_of(&ANKLES)
}

// the lower foot marks the ground line
fn lowest_ankle_y(kps: &Keypoints) -> f64 {
    kps.select(&ANKLES)
        .iter()
        .map(|k| k.y)
        .fold(f64::MIN, f64::max)
}

fn default_ankle(_: &Keypoints) -> f64 {
    DEFAULT_ANKLE_Y
}

fn has_torso_pair(kps: &Keypoints) -> bool {
    kps.all_of(&SHOULDERS) || kps.all_of(&HIPS)
}

// mean of the shoulder and hip midpoints, only pairs with both sides present
fn torso_center_x(kps: &Keypoints) -> f64 {
    mean(
        [SHOULDERS, HIPS]
            .iter()
            .filter(|pair| kps.all_of(&pair[..]))
            .map(|pair| mean(kps.select(&pair[..]).iter().map(|k| k.x))),
    )
}

fn has_face_center(kps: &Keypoints) -> bool {
    kps.any_of(&FACE_CENTER)
}

fn face_center_x(kps: &Keypoints) -> f64 {
    mean(kps.select(&FACE_CENTER).iter().map(|k| k.x))
}

fn default_center(_: &Keypoints) -> f64 {
    DEFAULT_CENTER_X
}

pub static EYELINE_RULES: [FallbackRule; 3] = [
    FallbackRule {
        source: MetricSource::Eyes,
        applies: has_eye,
        compute: eye_mean_y,
    },
    FallbackRule {
        source: MetricSource::Nose,
        applies: has_nose,
        compute: nose_y,
    },
    FallbackRule {
        source: MetricSource::Default,
        applies: always,
        compute: default_eyeline,
    },
];

pub static ANKLE_RULES: [FallbackRule; 2] = [
    FallbackRule {
        source: MetricSource::Ankles,
        applies: has_ankle,
        compute: lowest_ankle_y,
    },
    FallbackRule {
        source: MetricSource::Default,
        applies: always,
        compute: default_ankle,
    },
];

pub static CENTER_RULES: [FallbackRule; 3] = [
    FallbackRule {
        source: MetricSource::TorsoPairs,
        applies: has_torso_pair,
        compute: torso_center_x,
    },
    FallbackRule {
        source: MetricSource::FaceLandmarks,
        applies: has_face_center,
        compute: face_center_x,
    },
    FallbackRule {
        source: MetricSource::Default,
        applies: always,
        compute: default_center,
    },
];

/// Reduces a keypoint set to the four framing metrics.
pub fn compute_pose(keypoints: &Keypoints) -> PoseMetrics {
    let (eyeline_y, eyeline_source) = resolve(&EYELINE_RULES, keypoints, DEFAULT_EYELINE_Y);
    let (ankle_y, ankle_source) = resolve(&ANKLE_RULES, keypoints, DEFAULT_ANKLE_Y);
    let (center_x, center_source) = resolve(&CENTER_RULES, keypoints, DEFAULT_CENTER_X);

    debug!(
        "pose sources: eyeline={:?} ankle={:?} center={:?}",
        eyeline_source, ankle_source, center_source
    );

    PoseMetrics {
        eyeline_y: round_to(eyeline_y, 4),
        ankle_y: round_to(ankle_y, 4),
        center_x: round_to(center_x, 4),
        body_height: round_to(ankle_y - eyeline_y, 4).max(MIN_BODY_HEIGHT),
    }
}
