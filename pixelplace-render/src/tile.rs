use crate::error::{RenderError, Result};
use crate::lock::ScopeLocks;
use crate::paint::{apply_deltas, render_region};
use crate::store::{RasterScope, RasterStore};
use crate::ScopeRenderer;
use pixelplace_core::{CanvasMetadata, StateReconstructor, TileExtent, TileRouter};
use pixelplace_types::{PixelDelta, TileKey};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-tile rasters. Edge tiles are clipped to the canvas.
pub struct TileRenderer {
    reconstructor: Arc<StateReconstructor>,
    store: Arc<dyn RasterStore>,
    router: TileRouter,
    locks: ScopeLocks<TileKey>,
}

impl TileRenderer {
    pub fn new(
        reconstructor: Arc<StateReconstructor>,
        store: Arc<dyn RasterStore>,
        router: TileRouter,
    ) -> Self {
        Self {
            reconstructor,
            store,
            router,
            locks: ScopeLocks::new(),
        }
    }

    pub fn router(&self) -> TileRouter {
        self.router
    }

    /// Tile extent in canvas coordinates.
    pub fn extent(&self, key: &TileKey) -> Result<(TileExtent, Arc<CanvasMetadata>)> {
        let metadata = self.reconstructor.metadata(&key.canvas_id)?;
        let extent = self
            .router
            .extent(metadata.width, metadata.height, key.tile_x, key.tile_y);
        if extent.is_empty() {
            return Err(RenderError::EmptyTile(key.to_string()));
        }
        Ok((extent, metadata))
    }
}

impl ScopeRenderer for TileRenderer {
    type Scope = TileKey;

    fn update(&self, key: &TileKey, deltas: &[PixelDelta], scale: u32, grid: bool) -> Result<()> {
        self.locks.with_lock(key, || {
            let (extent, metadata) = self.extent(key)?;
            let scope = RasterScope::Tile(key.clone());
            let cells = apply_deltas(
                self.store.as_ref(),
                &scope,
                extent,
                &metadata.background_color,
                deltas,
                scale,
                grid,
            )?;
            debug!(tile = %key, scale, deltas = deltas.len(), cells, "Updated tile raster");
            Ok(())
        })
    }

    fn regenerate_full(&self, key: &TileKey, scale: u32, grid: bool) -> Result<()> {
        self.locks.with_lock(key, || {
            let (extent, _) = self.extent(key)?;
            let state = self.reconstructor.rebuild(&key.canvas_id)?;
            let scope = RasterScope::Tile(key.clone());
            let painted = render_region(self.store.as_ref(), &scope, extent, &state, scale, grid)?;
            info!(tile = %key, scale, pixels = painted, "Regenerated tile raster");
            Ok(())
        })
    }
}
