//! Character extent from pixel variance, for images without pose metrics.
//!
//! Rows and columns crossing the character vary far more than flat
//! background, so thresholding their variance against the median finds the
//! figure's extent.

use image::RgbImage;
use ndarray::{s, Array1, ArrayView3, Axis};

// fraction of the median variance a row/column must exceed to count as content
const ROW_THRESHOLD: f64 = 0.3;
const COLUMN_THRESHOLD: f64 = 0.3;
const MIN_ACTIVE_ROWS: f64 = 0.2;
const MIN_ACTIVE_COLUMNS: f64 = 0.1;
const MIN_BODY_SPAN: f64 = 0.3;
// eyes sit this far below the top of the content, as a share of its height
const HEAD_OFFSET: f64 = 0.08;

/// Vertical anchors of a character, as fractions of image height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterBounds {
    pub eye_y: f64,
    pub feet_y: f64,
}

fn pixels(image: &RgbImage) -> Option<ArrayView3<'_, u8>> {
    let (w, h) = image.dimensions();
    ArrayView3::from_shape((h as usize, w as usize, 3), image.as_raw().as_slice()).ok()
}

// population variance of every sample (all channels) along `axis` of `pixels`
fn variance_along(pixels: ArrayView3<'_, u8>, axis: Axis) -> Option<Array1<f64>> {
    let samples = pixels.mapv(f64::from);
    let lines = samples.len_of(axis);
    if lines == 0 || samples.len() == 0 {
        return None;
    }
    let per_line = samples.len() / lines;
    let grouped = match axis.index() {
        0 => samples,
        _ => samples.permuted_axes([1, 0, 2]).as_standard_layout().into_owned(),
    };
    let grouped = grouped.into_shape((lines, per_line)).ok()?;
    Some(grouped.var_axis(Axis(1), 0.0))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// indices whose variance exceeds `factor` times the median
fn active_indices(variances: &[f64], factor: f64) -> Vec<usize> {
    if variances.is_empty() {
        return Vec::new();
    }
    let threshold = median(variances) * factor;
    variances
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Eyeline and feet from row variance over the central half of the columns.
///
/// `None` when too few rows carry content or the content is too short to be
/// a standing figure.
pub fn find_character_bounds(image: &RgbImage) -> Option<CharacterBounds> {
    let arr = pixels(image)?;
    let (h, w) = (arr.shape()[0], arr.shape()[1]);
    if h == 0 || w < 4 {
        return None;
    }

    let strip = arr.slice(s![.., w / 4..3 * w / 4, ..]);
    let row_variance = variance_along(strip, Axis(0))?.to_vec();

    let active = active_indices(&row_variance, ROW_THRESHOLD);
    if (active.len() as f64) < h as f64 * MIN_ACTIVE_ROWS {
        return None;
    }

    let top = *active.first()? as f64 / h as f64;
    let bottom = *active.last()? as f64 / h as f64;
    if bottom - top < MIN_BODY_SPAN {
        return None;
    }

    Some(CharacterBounds {
        eye_y: top + (bottom - top) * HEAD_OFFSET,
        feet_y: bottom,
    })
}

/// Horizontal centre from column variance over the central half of the rows.
pub fn find_character_center_x(image: &RgbImage) -> Option<f64> {
    let arr = pixels(image)?;
    let (h, w) = (arr.shape()[0], arr.shape()[1]);
    if w == 0 || h < 4 {
        return None;
    }

    let band = arr.slice(s![h / 4..3 * h / 4, .., ..]);
    let column_variance = variance_along(band, Axis(1))?.to_vec();

    let active = active_indices(&column_variance, COLUMN_THRESHOLD);
    if (active.len() as f64) < w as f64 * MIN_ACTIVE_COLUMNS {
        return None;
    }

    let left = *active.first()? as f64;
    let right = *active.last()? as f64;
    Some((left + right) / 2.0 / w as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    // flat grey with a checkered figure in rows 20..180, columns 40..60
    fn figure_image() -> RgbImage {
        RgbImage::from_fn(100, 200, |x, y| {
            if (20..180).contains(&y) && (40..60).contains(&x) {
                if (x + y) % 2 == 0 {
                    Rgb([250, 240, 230])
                } else {
                    Rgb([10, 20, 30])
                }
            } else {
                Rgb([128, 128, 128])
            }
        })
    }

    #[test]
    fn finds_vertical_extent() {
        let bounds = find_character_bounds(&figure_image()).unwrap();
        let top = 20.0 / 200.0;
        let bottom = 179.0 / 200.0;
        assert!((bounds.feet_y - bottom).abs() < 1e-12);
        assert!((bounds.eye_y - (top + (bottom - top) * HEAD_OFFSET)).abs() < 1e-12);
    }

    #[test]
    fn finds_horizontal_center() {
        let cx = find_character_center_x(&figure_image()).unwrap();
        assert!((cx - 0.495).abs() < 1e-12);
    }

    #[test]
    fn flat_image_has_no_character() {
        let flat = RgbImage::from_pixel(100, 200, Rgb([40, 40, 40]));
        assert!(find_character_bounds(&flat).is_none());
        assert!(find_character_center_x(&flat).is_none());
    }

    #[test]
    fn short_content_is_rejected() {
        // content in only 25% of the rows, contiguous: enough rows, too short a span
        let img = RgbImage::from_fn(100, 200, |x, y| {
            if (100..150).contains(&y) && (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        assert!(find_character_bounds(&img).is_none());
    }

    #[test]
    fn variance_is_per_row_and_per_column() {
        // 2 rows x 3 columns; row 0 alternates 0/255, row 1 is flat
        let img = RgbImage::from_fn(3, 2, |x, y| {
            let v = if y == 0 && x % 2 == 1 { 255 } else { 0 };
            Rgb([v, v, v])
        });
        let arr = pixels(&img).unwrap();

        let rows = variance_along(arr, Axis(0)).unwrap();
        // row 0 holds three 255s among nine samples
        let mean = 255.0 / 3.0;
        let expected = (6.0 * mean * mean + 3.0 * (255.0 - mean) * (255.0 - mean)) / 9.0;
        assert!((rows[0] - expected).abs() < 1e-9);
        assert_eq!(rows[1], 0.0);

        let columns = variance_along(arr, Axis(1)).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0], 0.0);
        assert!((columns[1] - 255.0 * 255.0 / 4.0).abs() < 1e-9);
        assert_eq!(columns[2], 0.0);
    }

    #[test]
    fn median_of_even_count_averages() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }
}
