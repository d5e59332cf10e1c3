use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pose model error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("unexpected tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("font error: {0}")]
    Font(String),

    #[error("invalid metadata document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("no image found for {stack} discipline {index:02}")]
    MissingImage { stack: String, index: u32 },

    #[error("no metadata document found for {stack} discipline {index:02}")]
    MissingMetadata { stack: String, index: u32 },

    #[error("stack {stack} has {found}/{expected} disciplines")]
    IncompleteStack {
        stack: String,
        found: usize,
        expected: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
