use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::ImageAnalysis;
use crate::error::Result;
use crate::output::write_atomic;

/// `00_hero_1_512x768_a.png` -> `00_hero_1_512x768_a.yaml`
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("yaml")
}

pub fn render_sidecar(analysis: &ImageAnalysis) -> Result<String> {
    Ok(serde_yaml::to_string(analysis)?)
}

/// Replaces the sidecar next to `image_path` with the rendered analysis.
pub fn write_sidecar(image_path: &Path, analysis: &ImageAnalysis) -> Result<PathBuf> {
    let path = sidecar_path(image_path);
    write_atomic(&path, render_sidecar(analysis)?)?;
    Ok(path)
}

/// Reads the sidecar of `image_path`, if one has been written.
pub fn read_sidecar(image_path: &Path) -> Result<Option<ImageAnalysis>> {
    let path = sidecar_path(image_path);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    Ok(Some(serde_yaml::from_str(&text)?))
}
