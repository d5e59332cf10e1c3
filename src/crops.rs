use serde::{Deserialize, Serialize};

use crate::boxes::Boxes;
use crate::geometry::NormBox;
use crate::pose::PoseMetrics;

// face crop side relative to the larger face box side
const FACE_CROP_SCALE: f64 = 1.2;
// share of the face crop placed above the face box centre
const FACE_CROP_TOP_BIAS: f64 = 0.45;

const CARD_SIZE: (f64, f64) = (0.80, 0.40);
const CARD_HEADROOM: f64 = 0.02;
const PORTRAIT_SIZE: (f64, f64) = (0.80, 0.53);
const LANDSCAPE_HEIGHT: f64 = 0.35;
const LANDSCAPE_HEADROOM: f64 = 0.10;
const STRIP: NormBox = NormBox::new(0.25, 0.0, 0.50, 1.0);

/// The five display crops of one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSet {
    /// Square around the face.
    pub face: NormBox,
    /// Head and shoulders.
    pub card: NormBox,
    /// Head to waist.
    pub portrait: NormBox,
    /// Full-width banner through the eyeline.
    pub landscape: NormBox,
    /// Centre half, full height; independent of any landmark.
    pub strip: NormBox,
}

impl CropSet {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &NormBox)> {
        [
            ("face", &self.face),
            ("card", &self.card),
            ("portrait", &self.portrait),
            ("landscape", &self.landscape),
            ("strip", &self.strip),
        ]
        .into_iter()
    }
}

pub fn compute_crops(pose: &PoseMetrics, boxes: &Boxes) -> CropSet {
    let face = &boxes.face;
    let cx = pose.center_x;

    let (face_cx, face_cy) = face.center();
    let side = face.w.max(face.h) * FACE_CROP_SCALE;
    let face_crop = NormBox::new(
        face_cx - side / 2.0,
        face_cy - side * FACE_CROP_TOP_BIAS,
        side,
        side,
    );

    let (card_w, card_h) = CARD_SIZE;
    let card = NormBox::new(
        cx - card_w / 2.0,
        (face.y - CARD_HEADROOM).max(0.0),
        card_w,
        card_h,
    );

    let (portrait_w, portrait_h) = PORTRAIT_SIZE;
    let portrait = NormBox::new(cx - portrait_w / 2.0, 0.0, portrait_w, portrait_h);

    let landscape = NormBox::new(
        0.0,
        (pose.eyeline_y - LANDSCAPE_HEADROOM).max(0.0),
        1.0,
        LANDSCAPE_HEIGHT,
    );

    CropSet {
        face: face_crop.clamp_position_first(),
        card: card.clamp_position_first(),
        portrait: portrait.clamp_position_first(),
        landscape: landscape.clamp_position_first(),
        strip: STRIP.clamp_position_first(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::compute_boxes;
    use crate::keypoints::{Keypoint, KeypointName, Keypoints};
    use crate::pose::compute_pose;
    use rand::{Rng, SeedableRng};

    #[test]
    fn fallback_framing_produces_all_crops() {
        let crops = compute_crops(&PoseMetrics::default(), &Boxes::fallback());

        // face box side 0.5 -> 0.6 square, centre (0.5, 0.125)
        assert_eq!(crops.face, NormBox::new(0.2, 0.0, 0.6, 0.6));
        assert_eq!(crops.card, NormBox::new(0.1, 0.0, 0.8, 0.4));
        assert_eq!(crops.portrait, NormBox::new(0.1, 0.0, 0.8, 0.53));
        assert_eq!(crops.landscape, NormBox::new(0.0, 0.05, 1.0, 0.35));
        assert_eq!(crops.strip, NormBox::new(0.25, 0.0, 0.5, 1.0));
    }

    #[test]
    fn off_center_figure_slides_crops_inside() {
        let pose = PoseMetrics {
            eyeline_y: 0.9,
            ankle_y: 0.95,
            center_x: 0.95,
            body_height: 0.3,
        };
        let crops = compute_crops(&pose, &Boxes::fallback());

        // sizes survive, only the position moves
        assert_eq!(crops.card.w, 0.8);
        assert_eq!(crops.card.x, 0.2);
        assert_eq!(crops.portrait.w, 0.8);
        assert_eq!(crops.landscape.h, 0.35);
        assert_eq!(crops.landscape.y, 0.65);
    }

    #[test]
    fn crops_stay_in_frame_for_random_keypoints() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let mut kps = Keypoints::new();
            for &name in KeypointName::ALL.iter() {
                if rng.gen_bool(0.6) {
                    let keypoint = Keypoint {
                        x: rng.gen_range(-0.1..1.1),
                        y: rng.gen_range(0.0001..1.2),
                        conf: rng.gen_range(0.31..1.0),
                    };
                    kps.insert(name, keypoint);
                }
            }

            let pose = compute_pose(&kps);
            let boxes = compute_boxes(&kps);
            let crops = compute_crops(&pose, &boxes);

            assert!(boxes.face.is_within_frame(), "face {:?}", boxes.face);
            assert!(boxes.body.is_within_frame(), "body {:?}", boxes.body);
            for (name, crop) in crops.iter() {
                assert!(crop.is_within_frame(), "{} {:?} from {:?}", name, crop, kps);
            }
        }
    }
}
