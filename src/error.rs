use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParcError>;

#[derive(Debug, Error)]
pub enum ParcError {
    #[error("missing data: {path}")]
    MissingData { path: PathBuf },

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("channel {channel} has zero range (min = max = {value}), cannot normalize")]
    DegenerateChannel { channel: String, value: f64 },

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("input is {actual_width}x{actual_height}, smaller than the required {required}x{required}")]
    InsufficientResolution {
        required: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("malformed field file for case {case}, timestep {timestep} ({path}): {detail}")]
    MalformedField {
        case: usize,
        timestep: usize,
        path: PathBuf,
        detail: String,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParcError {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        ParcError::ShapeMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}
