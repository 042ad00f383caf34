//! Error taxonomy for the canvas engine.

use pixelplace_types::ColorError;
use thiserror::Error;

/// Errors surfaced by command handling, reconstruction and storage.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Bad command input. No event was appended and no state changed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced canvas or pixel does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rendering, encoding or raster I/O failed for one scope.
    #[error("Render failed: {0}")]
    Render(String),

    /// A durable store could not be read or written.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl CanvasError {
    pub fn validation(message: impl Into<String>) -> Self {
        CanvasError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CanvasError::NotFound(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CanvasError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CanvasError::NotFound(_))
    }
}

impl From<ColorError> for CanvasError {
    fn from(err: ColorError) -> Self {
        CanvasError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for CanvasError {
    fn from(err: std::io::Error) -> Self {
        CanvasError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(err: serde_json::Error) -> Self {
        CanvasError::Persistence(format!("malformed log record: {err}"))
    }
}

/// Result type using CanvasError
pub type Result<T> = std::result::Result<T, CanvasError>;
