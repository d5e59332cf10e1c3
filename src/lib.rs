//! Framing pipeline for generated character portraits: pose estimation,
//! normalized boxes and crops, sidecar and metadata outputs, and the
//! aligned filmstrip composite.

pub mod analysis;
pub mod batch;
pub mod boxes;
pub mod composite;
pub mod config;
pub mod crops;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod keypoints;
pub mod metadata;
pub mod output;
pub mod overlay;
pub mod pose;
pub mod pose_estimation;
pub mod sidecar;

pub use analysis::{analyze_image, ImageAnalysis};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pose_estimation::{NoPoseModel, PoseEstimationModel};
