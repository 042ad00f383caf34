//! Commands accepted by the canvas engine.
//!
//! Numeric fields are signed so that out-of-range input reaches entity
//! validation instead of failing at deserialization.

use crate::ids::CanvasId;
use serde::{Deserialize, Serialize};

/// Create a new canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCanvas {
    /// Explicit identity; the engine assigns a UUID when absent.
    #[serde(default)]
    pub canvas_id: Option<CanvasId>,
    pub name: String,
    pub width: i64,
    pub height: i64,
    pub background_color: String,
    pub created_by: String,
}

/// Paint one cell of a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePixel {
    pub canvas_id: CanvasId,
    pub x: i64,
    pub y: i64,
    pub color: String,
    pub user_id: String,
}

impl PlacePixel {
    pub fn new(
        canvas_id: impl Into<String>,
        x: i64,
        y: i64,
        color: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            canvas_id: CanvasId::new(canvas_id),
            x,
            y,
            color: color.into(),
            user_id: user_id.into(),
        }
    }
}
