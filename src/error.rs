use std::path::PathBuf;
use thiserror::Error;

/// The main error type for boxslice operations.
///
/// Skip conditions inside the slicing core (oversized boxes, windows that
/// retain no label, unloadable images) are never errors; they are recorded
/// on the [`SliceReport`](crate::slice::SliceReport) instead. The variants
/// here are the conditions that genuinely stop a run.
#[derive(Debug, Error)]
pub enum BoxsliceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CVAT XML from {path}: {message}")]
    CvatXmlParse { path: PathBuf, message: String },

    #[error("Failed to fetch annotations from {location}: {message}")]
    AnnotationFetch { location: String, message: String },

    #[error("Invalid image source {location}: {message}")]
    ImageSourceInvalid { location: String, message: String },

    #[error("Failed to load image '{name}': {message}")]
    ImageLoad { name: String, message: String },

    #[error("Failed to encode window '{name}': {source}")]
    ImageEncode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Window size must be a positive number of pixels")]
    InvalidWindowSize,

    #[error("Invalid training range '{0}'; expected '<lo>..<hi>'")]
    InvalidRange(String),

    #[error("Failed to render report: {0}")]
    ReportRender(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
