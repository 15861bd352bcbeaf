use std::path::PathBuf;
use thiserror::Error;

/// Per-document failures. Any of these ends processing of the affected
/// document only; the batch continues with the next input.
#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("not a PDF file: {0}")]
    InvalidInput(PathBuf),

    #[error("failed to load PDF {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("failed to save PDF {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("failed to replace {path}: {message}")]
    Replace { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-image failures. These are contained inside the walker: the offending
/// image resource is left in its original encoded form.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("unsupported image filter: {0}")]
    UnsupportedFilter(String),

    #[error("unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}
