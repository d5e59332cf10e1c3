use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;

/// `<index>_<slug>_<seed>_<W>x<H>_<tag>.png`
fn image_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2})_(.+?)_(\d+)_(\d+)x(\d+)_([a-z0-9]+)\.png$").expect("valid image name regex")
    })
}

/// Parsed parts of a generated image file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub index: u32,
    pub slug: String,
    pub width: u32,
    pub height: u32,
    pub tag: String,
}

impl ImageName {
    pub fn parse(file_name: &str) -> Option<ImageName> {
        let caps = image_name_regex().captures(file_name)?;
        Some(ImageName {
            index: caps[1].parse().ok()?,
            slug: caps[2].to_string(),
            width: caps[4].parse().ok()?,
            height: caps[5].parse().ok()?,
            tag: caps[6].to_string(),
        })
    }
}

fn file_names(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), entry.path()));
        }
    }
    names.sort();
    Ok(names)
}

/// The newest generated image for a discipline, i.e. the one with the
/// greatest tag. Debug overlays never match the naming scheme.
pub fn find_latest_image(images_dir: &Path, index: u32) -> Result<Option<PathBuf>> {
    let latest = file_names(images_dir)?
        .into_iter()
        .filter_map(|(name, path)| {
            let parsed = ImageName::parse(&name)?;
            (parsed.index == index).then_some((parsed.tag, name, path))
        })
        .max();
    Ok(latest.map(|(_, _, path)| path))
}

/// The discipline's metadata document, `<index>_*.yaml` in the stack directory.
pub fn find_discipline_yaml(stack_dir: &Path, index: u32) -> Result<Option<PathBuf>> {
    let prefix = format!("{:02}_", index);
    Ok(file_names(stack_dir)?
        .into_iter()
        .find(|(name, path)| {
            name.starts_with(&prefix) && path.extension().map_or(false, |e| e == "yaml")
        })
        .map(|(_, path)| path))
}

/// `00_hero_1_512x768_a.png` -> `00_hero_1_512x768_a_dev.png`
pub fn debug_overlay_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_path.with_file_name(format!("{}_dev.png", stem))
}
