//! Events appended to the canvas and pixel streams.

use crate::color::HexColor;
use crate::ids::{CanvasId, Coord, PixelKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a pixel's placement history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub user_id: String,
    pub placed_at: DateTime<Utc>,
}

/// Emitted once when a canvas is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasCreated {
    pub canvas_id: CanvasId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub background_color: HexColor,
    pub created_by: String,
}

/// Emitted on every placement, carrying the updated history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelPlaced {
    pub canvas_id: CanvasId,
    pub x: u32,
    pub y: u32,
    pub color: HexColor,
    pub user_id: String,
    /// Retained placements, oldest first. The last entry is this placement.
    pub history: Vec<Placement>,
    /// Placements ever made at this coordinate, including pruned ones.
    #[serde(default)]
    pub total_placements: u64,
}

impl PixelPlaced {
    pub fn key(&self) -> PixelKey {
        PixelKey::new(self.canvas_id.clone(), self.x, self.y)
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Timestamp of this placement.
    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|p| p.placed_at)
    }
}

/// Everything that can be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CanvasEvent {
    CanvasCreated(CanvasCreated),
    PixelPlaced(PixelPlaced),
}

impl CanvasEvent {
    pub fn canvas_id(&self) -> &CanvasId {
        match self {
            CanvasEvent::CanvasCreated(e) => &e.canvas_id,
            CanvasEvent::PixelPlaced(e) => &e.canvas_id,
        }
    }

    /// Stream the event belongs to.
    pub fn stream_id(&self) -> String {
        match self {
            CanvasEvent::CanvasCreated(e) => e.canvas_id.to_string(),
            CanvasEvent::PixelPlaced(e) => e.key().stream_id(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CanvasEvent::CanvasCreated(_) => "CanvasCreated",
            CanvasEvent::PixelPlaced(_) => "PixelPlaced",
        }
    }
}

/// A single cell change waiting to be painted onto a raster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelDelta {
    pub x: u32,
    pub y: u32,
    pub color: HexColor,
    pub user_id: String,
    /// Global log position of the originating event.
    pub position: u64,
}

impl PixelDelta {
    pub fn from_event(event: &PixelPlaced, position: u64) -> Self {
        Self {
            x: event.x,
            y: event.y,
            color: event.color.clone(),
            user_id: event.user_id.clone(),
            position,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}
