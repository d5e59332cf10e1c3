//! Whole-file replacement for everything the pipeline writes.
//!
//! Contents go to a sibling `<name>.tmp` first and are renamed over the
//! target, so an interrupted run leaves either the old file or the new one.

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageOutputFormat, RgbImage};

use crate::error::Result;

/// `00_role.yaml` -> `00_role.yaml.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Encodes `image` as PNG in memory, then replaces `path` with it.
pub fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageOutputFormat::Png)?;
    write_atomic(path, encoded.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn temp_file_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/stack/00_role.yaml")),
            PathBuf::from("/stack/00_role.yaml.tmp")
        );
    }

    #[test]
    fn replaces_whole_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00_role.yaml");
        fs::write(&path, "name: Old\nlong: content that is longer than the new one\n").unwrap();

        write_atomic(&path, "name: New\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "name: New\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00_role.yaml");
        fs::write(&path, "name: Old\n").unwrap();
        // the staging file cannot be created when a directory holds its name
        fs::create_dir(temp_path(&path)).unwrap();

        assert!(write_atomic(&path, "name: New\n").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "name: Old\n");
    }

    #[test]
    fn png_is_written_through_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strip.png");
        save_png(&path, &RgbImage::from_pixel(4, 2, Rgb([9, 8, 7]))).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(*back.get_pixel(3, 1), Rgb([9, 8, 7]));
        assert!(!temp_path(&path).exists());
    }
}
