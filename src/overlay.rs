//! `_dev.png` debug overlay: boxes, crops and keypoints drawn over the
//! source with a color legend underneath.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_text_mut, text_size, Blend, Canvas,
};
use imageproc::rect::Rect;
use log::{debug, warn};
use rusttype::{Font, Scale};

use crate::analysis::ImageAnalysis;
use crate::discovery::debug_overlay_path;
use crate::error::{Error, Result};
use crate::geometry::NormBox;
use crate::output::save_png;

pub const LEGEND_HEIGHT: u32 = 28;
const LEGEND_BACKGROUND: Rgb<u8> = Rgb([20, 20, 20]);
const LEGEND_TEXT: Rgb<u8> = Rgb([220, 220, 220]);
const SWATCH_RIM: Rgb<u8> = Rgb([180, 180, 180]);
const LEGEND_FONT_SIZE: f32 = 13.0;

const FACE_BOX_COLOR: [u8; 3] = [255, 50, 50];
const BODY_BOX_COLOR: [u8; 3] = [50, 50, 255];
const KEYPOINT_COLOR: [u8; 3] = [255, 255, 255];
const KEYPOINT_RADIUS: i32 = 5;

// crops are painted largest first so the small ones stay visible
const CROP_COLORS: [(&str, [u8; 3]); 5] = [
    ("strip", [200, 50, 255]),
    ("landscape", [0, 200, 255]),
    ("portrait", [50, 220, 50]),
    ("card", [255, 200, 0]),
    ("face", [255, 120, 120]),
];

const FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/google-noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn legend_entries() -> Vec<(String, [u8; 3])> {
    let mut entries = vec![
        ("face box".to_string(), FACE_BOX_COLOR),
        ("body box".to_string(), BODY_BOX_COLOR),
    ];
    entries.extend(
        CROP_COLORS
            .iter()
            .rev()
            .map(|(name, color)| (format!("crop:{}", name), *color)),
    );
    entries
}

pub fn load_font(path: &Path) -> Result<Font<'static>> {
    let bytes = fs::read(path)?;
    Font::try_from_vec(bytes)
        .ok_or_else(|| Error::Font(format!("{} is not a TrueType font", path.display())))
}

/// The configured legend font, else the first common system font found.
pub fn find_legend_font(configured: Option<&Path>) -> Option<Font<'static>> {
    if let Some(path) = configured {
        match load_font(path) {
            Ok(font) => return Some(font),
            Err(e) => warn!("legend font {}: {}", path.display(), e),
        }
    }
    let found = FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok());
    if found.is_none() {
        debug!("no legend font found, legend will show swatches only");
    }
    found
}

fn pixel_rect(b: &NormBox, w: u32, h: u32) -> Option<Rect> {
    let x0 = (b.x * w as f64) as i32;
    let y0 = (b.y * h as f64) as i32;
    let x1 = ((b.x + b.w) * w as f64) as i32;
    let y1 = ((b.y + b.h) * h as f64) as i32;
    (x1 > x0 && y1 > y0).then(|| Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32))
}

fn draw_outline<C>(canvas: &mut C, rect: Rect, thickness: u32, color: C::Pixel)
where
    C: Canvas,
    C::Pixel: 'static,
{
    for i in 0..thickness {
        let (w, h) = (rect.width(), rect.height());
        if w <= 2 * i || h <= 2 * i {
            break;
        }
        let inset = Rect::at(rect.left() + i as i32, rect.top() + i as i32).of_size(w - 2 * i, h - 2 * i);
        draw_hollow_rect_mut(canvas, inset, color);
    }
}

fn rgba(color: [u8; 3], alpha: u8) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], alpha])
}

fn draw_legend(legend: &mut RgbImage, font: Option<&Font>) {
    let scale = Scale::uniform(LEGEND_FONT_SIZE);
    let mut x = 8i32;
    for (label, color) in legend_entries() {
        let swatch = Rect::at(x, 7).of_size(15, 15);
        draw_filled_rect_mut(legend, swatch, Rgb(color));
        draw_hollow_rect_mut(legend, swatch, SWATCH_RIM);
        x += 18;

        if let Some(font) = font {
            draw_text_mut(legend, LEGEND_TEXT, x, 6, scale, font, &label);
            let (text_w, _) = text_size(scale, font, &label);
            x += text_w + 14;
        } else {
            x += 6;
        }
    }
}

/// Draws the analysis over `image` and appends the legend bar.
pub fn render_debug_overlay(
    image: &RgbImage,
    analysis: &ImageAnalysis,
    font: Option<&Font>,
) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut blend = Blend(RgbaImage::from_fn(w, h, |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgba([r, g, b, 255])
    }));

    let crops = &analysis.crops;
    for (name, color) in CROP_COLORS {
        let crop = match name {
            "strip" => &crops.strip,
            "landscape" => &crops.landscape,
            "portrait" => &crops.portrait,
            "card" => &crops.card,
            _ => &crops.face,
        };
        if let Some(rect) = pixel_rect(crop, w, h) {
            draw_filled_rect_mut(&mut blend, rect, rgba(color, 25));
            draw_outline(&mut blend, rect, 2, rgba(color, 200));
        }
    }

    for (b, color) in [
        (&analysis.boxes.body, BODY_BOX_COLOR),
        (&analysis.boxes.face, FACE_BOX_COLOR),
    ] {
        if let Some(rect) = pixel_rect(b, w, h) {
            draw_outline(&mut blend, rect, 3, rgba(color, 255));
        }
    }

    if let Some(keypoints) = &analysis.detection.keypoints {
        for (_, kp) in keypoints.iter() {
            let center = ((kp.x * w as f64) as i32, (kp.y * h as f64) as i32);
            draw_filled_circle_mut(&mut blend, center, KEYPOINT_RADIUS, rgba(KEYPOINT_COLOR, 220));
            draw_hollow_circle_mut(&mut blend, center, KEYPOINT_RADIUS, Rgba([0, 0, 0, 180]));
        }
    }

    // eyeline and ankle guides
    for y in [analysis.pose.eyeline_y, analysis.pose.ankle_y] {
        let row = (y * h as f64) as i32 as f32;
        draw_line_segment_mut(&mut blend, (0.0, row), (w as f32, row), Rgba([255, 255, 0, 100]));
    }

    let drawn = blend.0;
    let mut out = RgbImage::from_pixel(w, h + LEGEND_HEIGHT, LEGEND_BACKGROUND);
    for (x, y, p) in drawn.enumerate_pixels() {
        out.put_pixel(x, y, Rgb([p[0], p[1], p[2]]));
    }

    let mut legend = RgbImage::from_pixel(w, LEGEND_HEIGHT, LEGEND_BACKGROUND);
    draw_legend(&mut legend, font);
    image::imageops::replace(&mut out, &legend, 0, h as i64);
    out
}

/// Renders and saves the overlay next to the source image.
pub fn write_debug_overlay(
    image_path: &Path,
    image: &RgbImage,
    analysis: &ImageAnalysis,
    font: Option<&Font>,
) -> Result<PathBuf> {
    let path = debug_overlay_path(image_path);
    save_png(&path, &render_debug_overlay(image, analysis, font))?;
    Ok(path)
}
