use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use log::debug;
use ndarray::prelude::*;
use ndarray::CowArray;
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, ExecutionProvider, Session, SessionBuilder, Value};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::keypoints::KEYPOINT_COUNT;
use crate::pose_estimation::{PoseEstimationModel, RawKeypoint, RawPose};

// box centre + size, then the person score
const BOX_CHANNELS: usize = 5;

/// YOLOv8-pose network exported to ONNX.
///
/// Expects a `[1, 3, S, S]` input and produces `[1, 56, N]`: for each of the
/// `N` candidates the box, the person score and 17 `(x, y, conf)` triples, all
/// in input pixel space.
pub struct YoloPoseModel {
    pub environment: Arc<Environment>,
    pub session: Arc<Session>,
    name: String,
    input_size: u32,
    score_threshold: f32,
}

impl YoloPoseModel {
    pub fn from_config(config: &ModelConfig) -> Result<YoloPoseModel> {
        Self::from_file(
            &config.path,
            config.input_size,
            config.score_threshold,
            config.intra_threads,
        )
    }

    pub fn from_file(
        path: &Path,
        input_size: u32,
        score_threshold: f32,
        intra_threads: i16,
    ) -> Result<YoloPoseModel> {
        let environment = Environment::builder()
            .with_name("portrait-framing")
            .with_execution_providers([ExecutionProvider::CPU(Default::default())])
            .build()?
            .into_arc();

        let session = SessionBuilder::new(&environment)?
            .with_intra_threads(intra_threads)?
            .with_model_from_file(path)?;

        // the sidecar records the model by file stem, e.g. "yolov8x-pose"
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo-pose".to_string());

        Ok(YoloPoseModel {
            environment,
            session: Arc::new(session),
            name,
            input_size,
            score_threshold,
        })
    }

    fn preprocess<'a>(&self, image: &DynamicImage) -> CowArray<'a, f32, IxDyn> {
        let size = self.input_size;

        // stretch to the square network input, the keypoints are scaled back afterwards
        let resized = image.resize_exact(size, size, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();

        // NCHW, RGB in [0, 1]
        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
            }
        }

        input.into_dyn().into()
    }
}

impl PoseEstimationModel for YoloPoseModel {
    fn run(&self, image: &DynamicImage) -> Result<Option<RawPose>> {
        let array = self.preprocess(image);

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;

        let output: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let output = output.view();
        let predictions = output.deref().clone().into_dimensionality::<Ix3>()?;

        let x_scale = image.width() as f32 / self.input_size as f32;
        let y_scale = image.height() as f32 / self.input_size as f32;

        Ok(decode_best_pose(
            predictions,
            self.score_threshold,
            x_scale,
            y_scale,
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Picks the highest scoring candidate and maps its keypoints back to source pixels.
fn decode_best_pose(
    predictions: ArrayView3<f32>,
    score_threshold: f32,
    x_scale: f32,
    y_scale: f32,
) -> Option<RawPose> {
    let channels = predictions.shape()[1];
    let candidates = predictions.shape()[2];
    if channels < BOX_CHANNELS + 3 * KEYPOINT_COUNT {
        debug!(
            "pose output has {} channels, expected at least {}",
            channels,
            BOX_CHANNELS + 3 * KEYPOINT_COUNT
        );
        return None;
    }

    // best person candidate
    let mut best_score = 0.0;
    let mut best_index = None;
    for i in 0..candidates {
        let score = predictions[[0, 4, i]];
        if score > best_score {
            best_score = score;
            best_index = Some(i);
        }
    }

    let best_index = best_index?;
    if best_score < score_threshold {
        debug!(
            "best person score {:.3} below threshold {:.3}",
            best_score, score_threshold
        );
        return None;
    }

    let keypoints = (0..KEYPOINT_COUNT)
        .map(|k| {
            let offset = BOX_CHANNELS + k * 3;
            RawKeypoint::new(
                predictions[[0, offset, best_index]] * x_scale,
                predictions[[0, offset + 1, best_index]] * y_scale,
                predictions[[0, offset + 2, best_index]],
            )
        })
        .collect();

    Some(RawPose {
        confidence: best_score,
        keypoints,
    })
}
