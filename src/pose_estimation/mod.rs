pub mod model_yolo_pose;

use image::DynamicImage;
use nalgebra::Point2;

use crate::error::Result;

/// Trait representing a whole-body pose estimator.
///
/// Implementations are constructed once by the caller and shared by reference
/// across the batch, so they must be usable from several worker threads.
pub trait PoseEstimationModel: Send + Sync {
    /// Runs the model on one image.
    ///
    /// Returns `Ok(None)` when no person was found.
    fn run(&self, image: &DynamicImage) -> Result<Option<RawPose>>;

    /// Name recorded in the sidecar for detections made by this model.
    fn name(&self) -> &str;
}

/// A single landmark as reported by the model, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawKeypoint {
    pub position: Point2<f32>,
    pub confidence: f32,
}

impl RawKeypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            confidence,
        }
    }
}

/// The best person found in an image.
///
/// `keypoints` follows detector order (nose, eyes, ears, shoulders, elbows,
/// wrists, hips, knees, ankles) and may be shorter than 17 entries.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPose {
    pub confidence: f32,
    pub keypoints: Vec<RawKeypoint>,
}

/// Estimator that never finds anyone, which sends every image down the
/// fallback framing path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPoseModel;

impl PoseEstimationModel for NoPoseModel {
    fn run(&self, _image: &DynamicImage) -> Result<Option<RawPose>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "none"
    }
}
