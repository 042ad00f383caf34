//! Identifiers for canvases, pixels and tiles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canvas identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasId(pub String);

impl CanvasId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by the stream ids of every pixel on this canvas.
    pub fn pixel_stream_prefix(&self) -> String {
        format!("{}_", self.0)
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanvasId {
    fn from(id: &str) -> Self {
        CanvasId(id.to_string())
    }
}

/// A cell coordinate within a canvas.
///
/// Ordering is row-major (`y` first) so that iterating a `BTreeMap<Coord, _>`
/// walks the canvas top to bottom, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Identity of a single pixel entity: `(canvasId, x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelKey {
    pub canvas_id: CanvasId,
    pub coord: Coord,
}

impl PixelKey {
    pub fn new(canvas_id: CanvasId, x: u32, y: u32) -> Self {
        Self {
            canvas_id,
            coord: Coord::new(x, y),
        }
    }

    /// Event log stream id, `{canvasId}_{x}_{y}`.
    pub fn stream_id(&self) -> String {
        format!("{}_{}_{}", self.canvas_id, self.coord.x, self.coord.y)
    }

    /// Parse a stream id discovered under `canvas_id`'s pixel prefix.
    ///
    /// Returns `None` for the canvas stream itself and for any id whose
    /// suffix is not exactly `{x}_{y}`.
    pub fn from_stream_id(canvas_id: &CanvasId, stream_id: &str) -> Option<Self> {
        let rest = stream_id.strip_prefix(&canvas_id.pixel_stream_prefix())?;
        let (x, y) = rest.split_once('_')?;
        if x.is_empty() || y.is_empty() || !x.bytes().chain(y.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(canvas_id.clone(), x.parse().ok()?, y.parse().ok()?))
    }
}

impl fmt::Display for PixelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stream_id())
    }
}

/// A spatial partition of a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub canvas_id: CanvasId,
    pub tile_x: u32,
    pub tile_y: u32,
}

impl TileKey {
    pub fn new(canvas_id: CanvasId, tile_x: u32, tile_y: u32) -> Self {
        Self {
            canvas_id,
            tile_x,
            tile_y,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_tile_{}_{}", self.canvas_id, self.tile_x, self.tile_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_stream_id_roundtrip() {
        let key = PixelKey::new(CanvasId::new("canvas-123"), 30, 50);
        assert_eq!(key.stream_id(), "canvas-123_30_50");

        let parsed = PixelKey::from_stream_id(&CanvasId::new("canvas-123"), "canvas-123_30_50");
        assert_eq!(parsed, Some(key));
    }

    #[test]
    fn test_from_stream_id_rejects_foreign_ids() {
        let canvas = CanvasId::new("abc");
        assert_eq!(PixelKey::from_stream_id(&canvas, "abc"), None);
        assert_eq!(PixelKey::from_stream_id(&canvas, "abc_1"), None);
        assert_eq!(PixelKey::from_stream_id(&canvas, "abc_def_1_2"), None);
        assert_eq!(PixelKey::from_stream_id(&canvas, "abc_-1_2"), None);
        assert_eq!(PixelKey::from_stream_id(&canvas, "abcd_1_2"), None);
    }

    #[test]
    fn test_coord_ordering_is_row_major() {
        let mut coords = vec![Coord::new(5, 1), Coord::new(0, 2), Coord::new(9, 0)];
        coords.sort();
        assert_eq!(
            coords,
            vec![Coord::new(9, 0), Coord::new(5, 1), Coord::new(0, 2)]
        );
    }
}
