//! Batch drivers behind the `analyze` and `compose` commands.
//!
//! Every discipline is independent: failures are logged and counted, and the
//! run carries on with the next item.

use std::fmt;
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rusttype::Font;

use crate::analysis::{analyze_image, ImageAnalysis};
use crate::composite::{compose, debug_composite, SliceAnchor};
use crate::config::{PipelineConfig, StackConfig};
use crate::discovery::{debug_overlay_path, find_discipline_yaml, find_latest_image};
use crate::error::{Error, Result};
use crate::metadata::{update_metadata_file, CropsBlock, MergeOutcome};
use crate::output::save_png;
use crate::overlay::write_debug_overlay;
use crate::pose_estimation::PoseEstimationModel;
use crate::sidecar::{read_sidecar, render_sidecar, sidecar_path, write_sidecar};

// characters of the would-be sidecar shown by a dry run
const SIDECAR_PREVIEW_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub changes: usize,
    pub skips: usize,
    pub errors: usize,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

impl AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.changes += other.changes;
        self.skips += other.skips;
        self.errors += other.errors;
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done: {} updated, {} unchanged, {} errors",
            self.changes, self.skips, self.errors
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub stack_prefix: Option<String>,
    pub discipline: Option<u32>,
    pub dry_run: bool,
}

struct WorkItem {
    index: u32,
    image_path: PathBuf,
    yaml_path: PathBuf,
}

fn resolve_item(config: &PipelineConfig, stack: &StackConfig, index: u32) -> Result<WorkItem> {
    let image_path = find_latest_image(&config.images_dir(stack), index)?.ok_or_else(|| {
        Error::MissingImage {
            stack: stack.name.clone(),
            index,
        }
    })?;
    let yaml_path = find_discipline_yaml(&config.stack_dir(stack), index)?.ok_or_else(|| {
        Error::MissingMetadata {
            stack: stack.name.clone(),
            index,
        }
    })?;
    Ok(WorkItem {
        index,
        image_path,
        yaml_path,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn load_and_analyze(
    item: &WorkItem,
    model: &dyn PoseEstimationModel,
) -> Result<(DynamicImage, ImageAnalysis)> {
    let image = image::open(&item.image_path)?;
    let analysis = analyze_image(&image, &file_name(&item.image_path), model);
    Ok((image, analysis))
}

fn write_outputs(
    item: &WorkItem,
    image: &DynamicImage,
    analysis: &ImageAnalysis,
    font: Option<&Font>,
    dry_run: bool,
) -> Result<MergeOutcome> {
    if dry_run {
        info!(
            "    WOULD WRITE {} and {}",
            file_name(&sidecar_path(&item.image_path)),
            file_name(&debug_overlay_path(&item.image_path))
        );
        let preview: String = render_sidecar(analysis)?
            .chars()
            .take(SIDECAR_PREVIEW_LEN)
            .collect();
        debug!("    sidecar preview:\n{}", preview);
    } else {
        write_sidecar(&item.image_path, analysis)?;
        write_debug_overlay(&item.image_path, &image.to_rgb8(), analysis, font)?;
    }
    update_metadata_file(&item.yaml_path, &CropsBlock::from_crops(&analysis.crops), dry_run)
}

fn analyze_stack(
    config: &PipelineConfig,
    stack: &StackConfig,
    model: &dyn PoseEstimationModel,
    font: Option<&Font>,
    options: &AnalyzeOptions,
) -> BatchReport {
    let mut report = BatchReport::default();
    let indices: Vec<u32> = match options.discipline {
        Some(index) => vec![index],
        None => (0..stack.disciplines).collect(),
    };

    if !config.images_dir(stack).is_dir() {
        info!("SKIP {}: no images/ directory", stack.name);
        report.skips += indices.len();
        return report;
    }
    info!("=== {} ===", stack.name);

    let mut items = Vec::new();
    for index in indices {
        match resolve_item(config, stack, index) {
            Ok(item) => items.push(item),
            Err(e) => {
                error!("  {:02}: {}", index, e);
                report.errors += 1;
            }
        }
    }

    let analyzed: Vec<Result<(DynamicImage, ImageAnalysis)>> = items
        .par_iter()
        .map(|item| load_and_analyze(item, model))
        .collect();

    for (item, result) in items.iter().zip(analyzed) {
        info!("  {:02}: analyzed {}", item.index, file_name(&item.image_path));
        let outcome = result.and_then(|(image, analysis)| {
            let outcome = write_outputs(item, &image, &analysis, font, options.dry_run)?;
            let (face, card) = (&analysis.crops.face, &analysis.crops.card);
            info!(
                "       face=({:.2},{:.2},{:.2},{:.2}) card=({:.2},{:.2},{:.2},{:.2}) [{}] yaml:{}",
                face.x, face.y, face.w, face.h, card.x, card.y, card.w, card.h,
                analysis.detection.method, outcome
            );
            Ok(outcome)
        });

        match outcome {
            Ok(MergeOutcome::Unchanged) => report.skips += 1,
            Ok(_) => report.changes += 1,
            Err(e) => {
                error!("  {:02}: {}", item.index, e);
                report.errors += 1;
            }
        }
    }

    report
}

/// Analyzes every selected discipline and merges its crops into the
/// metadata document.
pub fn run_analysis(
    config: &PipelineConfig,
    model: &dyn PoseEstimationModel,
    font: Option<&Font>,
    options: &AnalyzeOptions,
) -> BatchReport {
    if options.dry_run {
        info!("DRY RUN, no files will be modified");
    }

    let prefixes: Vec<&str> = options.stack_prefix.as_deref().into_iter().collect();
    let mut report = BatchReport::default();
    for stack in config.select_stacks(prefixes.as_slice()) {
        report += analyze_stack(config, stack, model, font, options);
    }
    report
}

fn slice_source(image_path: &Path) -> Result<(image::RgbImage, SliceAnchor)> {
    let image = image::open(image_path)?.to_rgb8();
    let from_sidecar = match read_sidecar(image_path) {
        Ok(sidecar) => sidecar.as_ref().and_then(SliceAnchor::from_analysis),
        Err(e) => {
            warn!("{}: unreadable sidecar, detecting from pixels: {}", image_path.display(), e);
            None
        }
    };
    let anchor = from_sidecar.unwrap_or_else(|| SliceAnchor::detect(&image));
    Ok((image, anchor))
}

/// Builds one stack's composite; `None` when the stack has no images.
fn compose_stack(
    config: &PipelineConfig,
    stack: &StackConfig,
    dry_run: bool,
) -> Result<Option<PathBuf>> {
    let images_dir = config.images_dir(stack);
    if !images_dir.is_dir() {
        return Ok(None);
    }

    let layout = &config.composite;
    let mut paths = Vec::new();
    for index in 0..layout.slices {
        if let Some(path) = find_latest_image(&images_dir, index)? {
            paths.push(path);
        }
    }
    if paths.len() < layout.slices as usize {
        return Err(Error::IncompleteStack {
            stack: stack.name.clone(),
            found: paths.len(),
            expected: layout.slices as usize,
        });
    }

    let sources = paths
        .iter()
        .map(|p| slice_source(p))
        .collect::<Result<Vec<_>>>()?;
    let (canvas, _) = compose(layout, &sources);

    let out_dir = config.composites_dir();
    let out_path = out_dir.join(format!("{}_composite.png", stack.name));
    let debug_path = out_dir.join(format!("{}_debug.png", stack.name));
    if dry_run {
        info!("  WOULD WRITE {}", out_path.display());
        return Ok(Some(out_path));
    }

    fs::create_dir_all(&out_dir)?;
    save_png(&out_path, &canvas)?;
    save_png(&debug_path, &debug_composite(layout, &canvas))?;
    info!("  saved {} and {}", file_name(&out_path), file_name(&debug_path));
    Ok(Some(out_path))
}

/// Composes the filmstrip of every selected stack.
pub fn run_composites<S: AsRef<str>>(
    config: &PipelineConfig,
    stack_prefixes: &[S],
    dry_run: bool,
) -> BatchReport {
    if dry_run {
        info!("DRY RUN, no files will be modified");
    }

    let mut report = BatchReport::default();
    for stack in config.select_stacks(stack_prefixes) {
        info!("Stack {}:", stack.name);
        match compose_stack(config, stack, dry_run) {
            Ok(Some(_)) => report.changes += 1,
            Ok(None) => {
                info!("  skipping: no images/ directory");
                report.skips += 1;
            }
            Err(e) => {
                error!("  {}", e);
                report.errors += 1;
            }
        }
    }
    report
}
