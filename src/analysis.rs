//! Per-image framing analysis: pose estimation through to the crop set.

use std::fmt;

use image::DynamicImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::boxes::{compute_boxes, Boxes};
use crate::crops::{compute_crops, CropSet};
use crate::geometry::round_to;
use crate::keypoints::{normalize_keypoints, Keypoints};
use crate::pose::{compute_pose, PoseMetrics};
use crate::pose_estimation::PoseEstimationModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Pose,
    Fallback,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectionMethod::Pose => "pose",
            DetectionMethod::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub confidence: f64,
    pub method: DetectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Keypoints>,
}

impl Detection {
    pub fn fallback() -> Self {
        Self {
            model: None,
            confidence: 0.0,
            method: DetectionMethod::Fallback,
            keypoints: None,
        }
    }
}

/// Everything derived for one image; serialized as its sidecar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub source: String,
    pub dimensions: Dimensions,
    pub detection: Detection,
    pub pose: PoseMetrics,
    pub boxes: Boxes,
    pub crops: CropSet,
}

/// Runs the full derivation for one decoded image.
///
/// Pose estimation failures never propagate: the image is framed with the
/// fallback metrics and boxes instead.
pub fn analyze_image(
    image: &DynamicImage,
    source: &str,
    model: &dyn PoseEstimationModel,
) -> ImageAnalysis {
    let (width, height) = (image.width(), image.height());

    let raw_pose = match model.run(image) {
        Ok(pose) => pose,
        Err(e) => {
            warn!("{}: pose estimation failed, using fallback framing: {}", source, e);
            None
        }
    };

    let (detection, pose, boxes) = match raw_pose {
        Some(raw) => {
            let keypoints = normalize_keypoints(&raw.keypoints, width, height);
            debug!("{}: {} keypoints survived", source, keypoints.len());

            let pose = compute_pose(&keypoints);
            let boxes = compute_boxes(&keypoints);
            let detection = Detection {
                model: Some(model.name().to_string()),
                confidence: round_to(raw.confidence as f64, 3),
                method: DetectionMethod::Pose,
                keypoints: Some(keypoints),
            };
            (detection, pose, boxes)
        }
        None => (Detection::fallback(), PoseMetrics::default(), Boxes::fallback()),
    };

    let crops = compute_crops(&pose, &boxes);

    ImageAnalysis {
        source: source.to_string(),
        dimensions: Dimensions {
            w: width,
            h: height,
        },
        detection,
        pose,
        boxes,
        crops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::geometry::NormBox;
    use crate::keypoints::{KeypointName, KEYPOINT_COUNT};
    use crate::pose_estimation::{NoPoseModel, RawKeypoint, RawPose};

    struct FixedPose(RawPose);

    impl PoseEstimationModel for FixedPose {
        fn run(&self, _image: &DynamicImage) -> Result<Option<RawPose>> {
            Ok(Some(self.0.clone()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenModel;

    impl PoseEstimationModel for BrokenModel {
        fn run(&self, _image: &DynamicImage) -> Result<Option<RawPose>> {
            Err(Error::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            )))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn standing_figure() -> RawPose {
        // 200x400 image, eyes at y=40, ankles at y=340
        let mut keypoints = vec![RawKeypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        keypoints[0] = RawKeypoint::new(100.0, 48.0, 0.95);
        keypoints[1] = RawKeypoint::new(92.0, 40.0, 0.9);
        keypoints[2] = RawKeypoint::new(108.0, 40.0, 0.9);
        keypoints[5] = RawKeypoint::new(70.0, 90.0, 0.8);
        keypoints[6] = RawKeypoint::new(130.0, 90.0, 0.8);
        keypoints[15] = RawKeypoint::new(90.0, 340.0, 0.7);
        keypoints[16] = RawKeypoint::new(110.0, 340.0, 0.2);
        RawPose {
            confidence: 0.8765,
            keypoints,
        }
    }

    #[test]
    fn pose_detection_is_recorded() {
        let image = DynamicImage::new_rgb8(200, 400);
        let analysis = analyze_image(&image, "00_hero.png", &FixedPose(standing_figure()));

        assert_eq!(analysis.detection.method, DetectionMethod::Pose);
        assert_eq!(analysis.detection.model.as_deref(), Some("fixed"));
        assert_eq!(analysis.detection.confidence, 0.877);

        let keypoints = analysis.detection.keypoints.as_ref().unwrap();
        assert_eq!(keypoints.len(), 6);
        assert!(!keypoints.contains(KeypointName::RightAnkle));

        assert_eq!(analysis.pose.eyeline_y, 0.1);
        assert_eq!(analysis.pose.ankle_y, 0.85);
        assert_eq!(analysis.pose.center_x, 0.5);
        assert_eq!(analysis.pose.body_height, 0.75);
        assert_eq!(analysis.dimensions, Dimensions { w: 200, h: 400 });
    }

    #[test]
    fn no_person_uses_fallback_framing() {
        let image = DynamicImage::new_rgb8(64, 128);
        let analysis = analyze_image(&image, "00_hero.png", &NoPoseModel);

        assert_eq!(analysis.detection, Detection::fallback());
        assert_eq!(analysis.boxes.face, NormBox::new(0.25, 0.0, 0.50, 0.25));
        assert_eq!(analysis.boxes.body, NormBox::new(0.15, 0.04, 0.70, 0.86));
        assert_eq!(analysis.crops.strip, NormBox::new(0.25, 0.0, 0.5, 1.0));
    }

    #[test]
    fn model_error_is_not_fatal() {
        let image = DynamicImage::new_rgb8(64, 128);
        let analysis = analyze_image(&image, "00_hero.png", &BrokenModel);
        assert_eq!(analysis.detection.method, DetectionMethod::Fallback);
        assert_eq!(analysis.pose, PoseMetrics::default());
    }

    #[test]
    fn method_displays_like_the_sidecar_value() {
        for method in [DetectionMethod::Pose, DetectionMethod::Fallback] {
            let yaml = serde_yaml::to_string(&method).unwrap();
            assert_eq!(yaml.trim(), method.to_string());
        }
        assert_eq!(DetectionMethod::Pose.to_string(), "pose");
    }

    #[test]
    fn analysis_is_deterministic() {
        let image = DynamicImage::new_rgb8(200, 400);
        let model = FixedPose(standing_figure());
        let a = serde_yaml::to_string(&analyze_image(&image, "x.png", &model)).unwrap();
        let b = serde_yaml::to_string(&analyze_image(&image, "x.png", &model)).unwrap();
        assert_eq!(a, b);
    }
}
