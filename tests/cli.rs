use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const METADATA: &str = "name: Frontend Developer\n# palette\ncolors:\n  - teal\n";

fn cmd(root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("portrait-framing");
    cmd.env("RUST_LOG", "warn")
        .arg("--config")
        .arg(root.join("pipeline.yaml"));
    cmd
}

fn workspace(disciplines: u32) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let config = format!(
        "disciplines_dir: {}\nstacks:\n  - name: 01_generic\n    disciplines: {}\n",
        dir.path().join("disciplines").display(),
        disciplines
    );
    fs::write(dir.path().join("pipeline.yaml"), config).unwrap();
    fs::create_dir_all(dir.path().join("disciplines/01_generic/images")).unwrap();
    dir
}

fn add_discipline(root: &Path, index: u32, with_metadata: bool) {
    let stack = root.join("disciplines/01_generic");
    if with_metadata {
        fs::write(stack.join(format!("{:02}_role.yaml", index)), METADATA).unwrap();
    }
    let shade = 40 + index as u8 * 20;
    RgbImage::from_fn(64, 128, |x, y| {
        if (16..48).contains(&x) && (20..120).contains(&y) && (x + y) % 2 == 0 {
            Rgb([230, 200, 180])
        } else {
            Rgb([shade, shade, shade])
        }
    })
    .save(stack.join("images").join(format!("{:02}_role_7_64x128_a.png", index)))
    .unwrap();
}

#[test]
fn analyze_inserts_then_reports_unchanged() {
    let root = workspace(1);
    add_discipline(root.path(), 0, true);

    cmd(root.path())
        .args(["analyze", "--no-detect"])
        .assert()
        .success()
        .stdout(contains("Done: 1 updated, 0 unchanged, 0 errors"));

    let metadata = fs::read_to_string(root.path().join("disciplines/01_generic/00_role.yaml")).unwrap();
    assert!(metadata.starts_with(METADATA));
    assert!(metadata.contains("\ncrops:\n  face:\n"));

    let images = root.path().join("disciplines/01_generic/images");
    let sidecar = fs::read_to_string(images.join("00_role_7_64x128_a.yaml")).unwrap();
    assert!(sidecar.contains("method: fallback"));
    assert!(images.join("00_role_7_64x128_a_dev.png").exists());

    cmd(root.path())
        .args(["analyze", "--no-detect"])
        .assert()
        .success()
        .stdout(contains("Done: 0 updated, 1 unchanged, 0 errors"));
}

#[test]
fn missing_image_fails_the_run() {
    let root = workspace(2);
    add_discipline(root.path(), 0, true);

    cmd(root.path())
        .args(["analyze", "01", "--no-detect"])
        .assert()
        .failure()
        .stdout(contains("Done: 1 updated, 0 unchanged, 1 errors"));
}

#[test]
fn dry_run_leaves_files_alone() {
    let root = workspace(1);
    add_discipline(root.path(), 0, true);

    cmd(root.path())
        .args(["analyze", "01", "0", "--no-detect", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("Done: 1 updated"));

    let stack = root.path().join("disciplines/01_generic");
    assert_eq!(fs::read_to_string(stack.join("00_role.yaml")).unwrap(), METADATA);
    assert!(!stack.join("images/00_role_7_64x128_a.yaml").exists());
    assert!(!stack.join("images/00_role_7_64x128_a_dev.png").exists());
}

#[test]
fn missing_model_is_a_setup_failure() {
    let root = workspace(1);
    add_discipline(root.path(), 0, true);

    cmd(root.path())
        .args(["analyze", "--model"])
        .arg(root.path().join("absent.onnx"))
        .assert()
        .failure()
        .stdout(contains("Done:").not());
}

#[test]
fn unreadable_config_is_a_setup_failure() {
    let root = workspace(1);
    fs::write(root.path().join("pipeline.yaml"), "stacks: [unterminated").unwrap();

    cmd(root.path()).args(["compose"]).assert().failure();
}

#[test]
fn compose_builds_full_hd_filmstrip() {
    let root = workspace(8);
    for index in 0..8 {
        add_discipline(root.path(), index, false);
    }

    cmd(root.path())
        .args(["compose", "01"])
        .assert()
        .success()
        .stdout(contains("Done: 1 updated, 0 unchanged, 0 errors"));

    let composites = root.path().join("disciplines/composites");
    let composite = image::open(composites.join("01_generic_composite.png")).unwrap();
    assert_eq!((composite.width(), composite.height()), (1920, 1080));
    assert!(composites.join("01_generic_debug.png").exists());
}

#[test]
fn compose_rejects_incomplete_stack() {
    let root = workspace(8);
    for index in 0..5 {
        add_discipline(root.path(), index, false);
    }

    cmd(root.path())
        .args(["compose"])
        .assert()
        .failure()
        .stdout(contains("1 errors"));
    assert!(!root.path().join("disciplines/composites").exists());
}
