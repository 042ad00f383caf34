//! Spatial partitioning of canvases into fixed-size tiles.
//!
//! The tile size is fixed for the lifetime of the data: every persisted tile
//! raster and every command partition assignment is derived from it. Changing
//! it is a migration (delete tile rasters, regenerate from the event log),
//! never a runtime toggle.

use pixelplace_types::{CanvasId, Coord, TileKey};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Pixel-space rectangle covered by one tile, clipped to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileExtent {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileExtent {
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x >= self.origin_x
            && coord.y >= self.origin_y
            && coord.x - self.origin_x < self.width
            && coord.y - self.origin_y < self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Maps coordinates to tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRouter {
    tile_size: u32,
}

impl TileRouter {
    /// Create a router; a zero tile size is treated as 1.
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
        }
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// `(floor(x / tileSize), floor(y / tileSize))`
    #[inline]
    pub fn tile_of(&self, x: u32, y: u32) -> (u32, u32) {
        (x / self.tile_size, y / self.tile_size)
    }

    pub fn tile_key(&self, canvas_id: &CanvasId, coord: Coord) -> TileKey {
        let (tile_x, tile_y) = self.tile_of(coord.x, coord.y);
        TileKey::new(canvas_id.clone(), tile_x, tile_y)
    }

    /// Number of tiles needed to cover `dimension` pixels.
    pub fn tile_count(&self, dimension: u32) -> u32 {
        dimension.div_ceil(self.tile_size)
    }

    /// Total tiles for a `width × height` canvas.
    pub fn total_tiles(&self, width: u32, height: u32) -> u32 {
        self.tile_count(width) * self.tile_count(height)
    }

    /// Extent of tile `(tile_x, tile_y)` on a `width × height` canvas.
    ///
    /// Edge tiles are smaller than the tile size when the canvas dimensions
    /// are not exact multiples of it; tiles past the canvas are empty.
    pub fn extent(&self, width: u32, height: u32, tile_x: u32, tile_y: u32) -> TileExtent {
        let origin_x = tile_x.saturating_mul(self.tile_size);
        let origin_y = tile_y.saturating_mul(self.tile_size);
        TileExtent {
            origin_x,
            origin_y,
            width: self.tile_size.min(width.saturating_sub(origin_x)),
            height: self.tile_size.min(height.saturating_sub(origin_y)),
        }
    }

    /// Every tile of a canvas, row-major.
    pub fn tiles<'a>(
        &'a self,
        canvas_id: &'a CanvasId,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = TileKey> + 'a {
        let tiles_x = self.tile_count(width);
        let tiles_y = self.tile_count(height);
        (0..tiles_y).flat_map(move |ty| {
            (0..tiles_x).map(move |tx| TileKey::new(canvas_id.clone(), tx, ty))
        })
    }

    /// Command partition for a tile.
    ///
    /// Stable for a given key and partition count, so every command for one
    /// region lands on the same worker.
    pub fn partition_for(&self, key: &TileKey, partitions: usize) -> usize {
        if partitions <= 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % partitions as u64) as usize
    }
}

impl Default for TileRouter {
    fn default() -> Self {
        Self::new(100)
    }
}
