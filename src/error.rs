use thiserror::Error;

use crate::censor::CensorMethod;
use crate::compositor::DisplayMode;

#[derive(Error, Debug)]
pub enum CensorError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Censor method {0:?} is not implemented")]
    UnsupportedMethod(CensorMethod),

    #[error("Dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("No image is loaded")]
    NotLoaded,

    #[error("Display mode {0:?} cannot be exported")]
    NotExportable(DisplayMode),
}

impl CensorError {
    /// True for errors that reject a method configuration. The engine keeps its
    /// previous Censored buffer when one of these is returned.
    pub fn is_config_error(&self) -> bool {
        matches!(self, CensorError::InvalidConfig(_) | CensorError::UnsupportedMethod(_))
    }
}

pub type Result<T> = std::result::Result<T, CensorError>;
