use crate::error::Result;
use crate::lock::ScopeLocks;
use crate::paint::{apply_deltas, render_region};
use crate::store::{RasterScope, RasterStore};
use crate::ScopeRenderer;
use pixelplace_core::{StateReconstructor, TileExtent};
use pixelplace_types::{CanvasId, HexColor, PixelDelta};
use std::sync::Arc;
use tracing::{debug, info};

/// Whole-canvas rasters.
pub struct IncrementalRenderer {
    reconstructor: Arc<StateReconstructor>,
    store: Arc<dyn RasterStore>,
    locks: ScopeLocks<CanvasId>,
}

impl IncrementalRenderer {
    pub fn new(reconstructor: Arc<StateReconstructor>, store: Arc<dyn RasterStore>) -> Self {
        Self {
            reconstructor,
            store,
            locks: ScopeLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RasterStore> {
        &self.store
    }

    fn region(&self, canvas_id: &CanvasId) -> Result<(TileExtent, HexColor)> {
        let metadata = self.reconstructor.metadata(canvas_id)?;
        let region = TileExtent {
            origin_x: 0,
            origin_y: 0,
            width: metadata.width,
            height: metadata.height,
        };
        Ok((region, metadata.background_color.clone()))
    }
}

impl ScopeRenderer for IncrementalRenderer {
    type Scope = CanvasId;

    fn update(&self, canvas_id: &CanvasId, deltas: &[PixelDelta], scale: u32, grid: bool) -> Result<()> {
        self.locks.with_lock(canvas_id, || {
            let (region, background) = self.region(canvas_id)?;
            let scope = RasterScope::Canvas(canvas_id.clone());
            let cells = apply_deltas(
                self.store.as_ref(),
                &scope,
                region,
                &background,
                deltas,
                scale,
                grid,
            )?;
            debug!(canvas = %canvas_id, scale, deltas = deltas.len(), cells, "Updated canvas raster");
            Ok(())
        })
    }

    fn regenerate_full(&self, canvas_id: &CanvasId, scale: u32, grid: bool) -> Result<()> {
        self.locks.with_lock(canvas_id, || {
            let state = self.reconstructor.rebuild(canvas_id)?;
            let (region, _) = self.region(canvas_id)?;
            let scope = RasterScope::Canvas(canvas_id.clone());
            let painted = render_region(self.store.as_ref(), &scope, region, &state, scale, grid)?;
            info!(canvas = %canvas_id, scale, pixels = painted, "Regenerated canvas raster");
            Ok(())
        })
    }
}
