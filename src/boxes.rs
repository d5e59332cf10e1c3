use serde::{Deserialize, Serialize};

use crate::geometry::NormBox;
use crate::keypoints::{KeypointName, Keypoints};

/// Face box used when no facial landmark survived: the top quarter, centre half.
pub const FALLBACK_FACE_BOX: NormBox = NormBox::new(0.25, 0.0, 0.50, 0.25);
/// Body box used when no landmark survived at all.
pub const FALLBACK_BODY_BOX: NormBox = NormBox::new(0.15, 0.04, 0.70, 0.86);

// landmark spread to face size, leaves room for hair and chin
const FACE_SPREAD_FACTOR: f64 = 1.8;
const MIN_FACE_SIZE: f64 = 0.10;
// share of the face size placed above the landmark centre
const FACE_TOP_BIAS: f64 = 0.6;

const BODY_PAD_X: f64 = 0.05;
const BODY_PAD_TOP: f64 = 0.04;
const BODY_PAD_HEIGHT: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boxes {
    pub face: NormBox,
    pub body: NormBox,
}

impl Boxes {
    pub fn fallback() -> Self {
        Self {
            face: FALLBACK_FACE_BOX,
            body: FALLBACK_BODY_BOX,
        }
    }
}

pub fn compute_boxes(keypoints: &Keypoints) -> Boxes {
    Boxes {
        face: face_box(keypoints),
        body: body_box(keypoints),
    }
}

/// Square around the ears, eyes and nose, biased upward.
pub fn face_box(keypoints: &Keypoints) -> NormBox {
    let points = keypoints.select(&KeypointName::FACE);
    if points.is_empty() {
        return FALLBACK_FACE_BOX;
    }

    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (min_x, max_x) = extent(points.iter().map(|p| p.x));
    let (min_y, max_y) = extent(points.iter().map(|p| p.y));
    let size = ((max_x - min_x).max(max_y - min_y) * FACE_SPREAD_FACTOR).max(MIN_FACE_SIZE);

    NormBox::new(cx - size / 2.0, cy - size * FACE_TOP_BIAS, size, size).clamp_to_frame()
}

/// Padded bounds of every surviving landmark.
pub fn body_box(keypoints: &Keypoints) -> NormBox {
    if keypoints.is_empty() {
        return FALLBACK_BODY_BOX;
    }

    let (min_x, max_x) = extent(keypoints.iter().map(|(_, k)| k.x));
    let (min_y, max_y) = extent(keypoints.iter().map(|(_, k)| k.y));

    NormBox::new(
        min_x - BODY_PAD_X,
        min_y - BODY_PAD_TOP,
        max_x - min_x + 2.0 * BODY_PAD_X,
        max_y - min_y + BODY_PAD_HEIGHT,
    )
    .clamp_to_frame()
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
