//! Render error types.

use pixelplace_core::CanvasError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Raster I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored raster is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Cannot render {cells_x}x{cells_y} cells at scale {scale}")]
    InvalidScale { cells_x: u32, cells_y: u32, scale: u32 },

    #[error("Tile {0} lies outside its canvas")]
    EmptyTile(String),

    #[error(transparent)]
    State(#[from] CanvasError),
}

impl From<RenderError> for CanvasError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::State(inner) => inner,
            other => CanvasError::Render(other.to_string()),
        }
    }
}

/// Result type using RenderError
pub type Result<T> = std::result::Result<T, RenderError>;
