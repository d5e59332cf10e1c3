//! Filmstrip compositing: one slice per discipline, all aligned on a shared
//! eyeline and feet row.

pub mod content_bounds;

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{DetectionMethod, ImageAnalysis};
use crate::pose::{DEFAULT_CENTER_X, DEFAULT_EYELINE_Y};

use self::content_bounds::{find_character_bounds, find_character_center_x};

const EYE_LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const FEET_LINE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const GUIDE_THICKNESS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeLayout {
    pub width: u32,
    pub height: u32,
    pub slices: u32,
    /// Target eyeline row, as a fraction of the canvas height.
    pub target_eye_y: f64,
    pub target_feet_y: f64,
    /// Minimum scaled source width, in slice widths.
    pub min_slice_fill: f64,
}

impl Default for CompositeLayout {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            slices: 8,
            target_eye_y: 0.15,
            target_feet_y: 0.90,
            min_slice_fill: 1.1,
        }
    }
}

impl CompositeLayout {
    pub fn slice_width(&self) -> u32 {
        self.width / self.slices.max(1)
    }

    pub fn target_eye_px(&self) -> u32 {
        (self.height as f64 * self.target_eye_y) as u32
    }

    pub fn target_feet_px(&self) -> u32 {
        (self.height as f64 * self.target_feet_y) as u32
    }

    pub fn target_body_px(&self) -> u32 {
        self.target_feet_px().saturating_sub(self.target_eye_px())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorMethod {
    Pose,
    Variance,
    Fallback,
}

impl std::fmt::Display for AnchorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnchorMethod::Pose => "pose",
            AnchorMethod::Variance => "variance",
            AnchorMethod::Fallback => "fallback",
        };
        write!(f, "{}", s)
    }
}

/// Where a source image's character sits, in normalized coordinates.
///
/// Without `feet_y` the image is scaled to the canvas height and only the
/// eyeline is aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceAnchor {
    pub eye_y: f64,
    pub feet_y: Option<f64>,
    pub center_x: f64,
    pub method: AnchorMethod,
}

impl SliceAnchor {
    pub fn fallback() -> Self {
        Self {
            eye_y: DEFAULT_EYELINE_Y,
            feet_y: None,
            center_x: DEFAULT_CENTER_X,
            method: AnchorMethod::Fallback,
        }
    }

    /// Anchor from a sidecar, only when it holds real pose metrics.
    pub fn from_analysis(analysis: &ImageAnalysis) -> Option<Self> {
        if analysis.detection.method != DetectionMethod::Pose {
            return None;
        }
        let pose = &analysis.pose;
        Some(Self {
            eye_y: pose.eyeline_y,
            feet_y: Some(pose.eyeline_y + pose.body_height),
            center_x: pose.center_x,
            method: AnchorMethod::Pose,
        })
    }

    /// Anchor estimated from pixel variance.
    pub fn detect(image: &RgbImage) -> Self {
        let center_x = find_character_center_x(image).unwrap_or(DEFAULT_CENTER_X);
        match find_character_bounds(image) {
            Some(bounds) => Self {
                eye_y: bounds.eye_y,
                feet_y: Some(bounds.feet_y),
                center_x,
                method: AnchorMethod::Variance,
            },
            None => Self {
                center_x,
                ..Self::fallback()
            },
        }
    }
}

/// How one source image is scaled and cropped into its slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentTransform {
    pub slice_index: u32,
    pub scale: f64,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_left: u32,
    pub crop_top: u32,
    /// Row of the source eyeline inside the slice.
    pub eye_row: i64,
}

/// Computes the scale and crop window for one source image.
pub fn plan_slice(
    layout: &CompositeLayout,
    slice_index: u32,
    anchor: &SliceAnchor,
    source_width: u32,
    source_height: u32,
) -> AlignmentTransform {
    let slice_w = layout.slice_width() as f64;
    let canvas_h = layout.height as i64;
    let (src_w, src_h) = (source_width.max(1) as f64, source_height.max(1) as f64);

    let mut scale = match anchor.feet_y {
        Some(feet_y) if feet_y > anchor.eye_y => {
            layout.target_body_px() as f64 / ((feet_y - anchor.eye_y) * src_h)
        }
        _ => layout.height as f64 / src_h,
    };
    if ((src_w * scale) as u32 as f64) < slice_w {
        scale = slice_w * layout.min_slice_fill / src_w;
    }

    let scaled_width = ((src_w * scale) as u32).max(1);
    let scaled_height = ((src_h * scale) as u32).max(1);

    let scaled_eye = (anchor.eye_y * scaled_height as f64) as i64;
    let max_top = (scaled_height as i64 - canvas_h).max(0);
    let top = (scaled_eye - layout.target_eye_px() as i64).min(max_top).max(0);

    let scaled_cx = (anchor.center_x * scaled_width as f64) as i64;
    let max_left = (scaled_width as i64 - slice_w as i64).max(0);
    let left = (scaled_cx - slice_w as i64 / 2).min(max_left).max(0);

    AlignmentTransform {
        slice_index,
        scale,
        scaled_width,
        scaled_height,
        crop_left: left as u32,
        crop_top: top as u32,
        eye_row: scaled_eye - top,
    }
}

/// Resizes and crops a source into a `slice_width × height` tile; anything
/// the source cannot cover stays black.
pub fn render_slice(
    image: &RgbImage,
    transform: &AlignmentTransform,
    layout: &CompositeLayout,
) -> RgbImage {
    let resized = imageops::resize(
        image,
        transform.scaled_width,
        transform.scaled_height,
        imageops::FilterType::Lanczos3,
    );

    let slice_w = layout.slice_width();
    let crop_w = slice_w.min(transform.scaled_width - transform.crop_left);
    let crop_h = layout.height.min(transform.scaled_height - transform.crop_top);
    let window = imageops::crop_imm(
        &resized,
        transform.crop_left,
        transform.crop_top,
        crop_w,
        crop_h,
    )
    .to_image();

    let mut slice = RgbImage::new(slice_w, layout.height);
    imageops::replace(&mut slice, &window, 0, 0);
    slice
}

/// Builds the filmstrip. Slices are rendered in parallel and pasted in
/// order; `sources[i]` lands in slice `i`.
pub fn compose(
    layout: &CompositeLayout,
    sources: &[(RgbImage, SliceAnchor)],
) -> (RgbImage, Vec<AlignmentTransform>) {
    let rendered: Vec<(RgbImage, AlignmentTransform)> = sources
        .par_iter()
        .enumerate()
        .map(|(i, (image, anchor))| {
            let transform = plan_slice(layout, i as u32, anchor, image.width(), image.height());
            (render_slice(image, &transform, layout), transform)
        })
        .collect();

    let mut canvas = RgbImage::new(layout.width, layout.height);
    let mut transforms = Vec::with_capacity(rendered.len());
    for ((slice, transform), (_, anchor)) in rendered.into_iter().zip(sources) {
        info!(
            "  slice {:02} [{}] eye={:.1}% cx={:.1}% scale={:.3}",
            transform.slice_index,
            anchor.method,
            anchor.eye_y * 100.0,
            anchor.center_x * 100.0,
            transform.scale
        );
        debug!("  slice {:02}: {:?}", transform.slice_index, transform);

        let x = transform.slice_index as i64 * layout.slice_width() as i64;
        imageops::replace(&mut canvas, &slice, x, 0);
        transforms.push(transform);
    }

    (canvas, transforms)
}

/// Copy of the composite with the target eyeline (red) and feet row (blue).
pub fn debug_composite(layout: &CompositeLayout, composite: &RgbImage) -> RgbImage {
    let mut debug = composite.clone();
    let width = debug.width();
    for (row, color) in [
        (layout.target_eye_px(), EYE_LINE_COLOR),
        (layout.target_feet_px(), FEET_LINE_COLOR),
    ] {
        let top = row as i32 - (GUIDE_THICKNESS / 2) as i32;
        draw_filled_rect_mut(
            &mut debug,
            Rect::at(0, top).of_size(width, GUIDE_THICKNESS),
            color,
        );
    }
    debug
}
