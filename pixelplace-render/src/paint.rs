//! Raster update and rebuild over a rectangular region of a canvas.

use crate::error::Result;
use crate::raster::Raster;
use crate::store::{RasterScope, RasterStore};
use pixelplace_core::{CanvasState, TileExtent};
use pixelplace_types::{Coord, HexColor, PixelDelta};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Paint `deltas` onto the stored raster for `scope`, in order.
///
/// A missing raster starts blank (with the full grid when `grid` is set).
/// Deltas outside `region` are skipped. Grid lines of the painted cells are
/// redrawn after every delta is down.
pub(crate) fn apply_deltas(
    store: &dyn RasterStore,
    scope: &RasterScope,
    region: TileExtent,
    background: &HexColor,
    deltas: &[PixelDelta],
    scale: u32,
    grid: bool,
) -> Result<usize> {
    let mut raster = match store.load(scope, scale)? {
        Some(bytes) => Raster::decode(&bytes, region.width, region.height, scale)?,
        None => {
            debug!(scope = %scope, scale, "No stored raster, starting blank");
            let mut blank = Raster::blank(region.width, region.height, scale, background.rgb())?;
            if grid {
                blank.grid_all();
            }
            blank
        }
    };

    let mut touched = BTreeSet::new();
    for delta in deltas {
        let coord = delta.coord();
        if !region.contains(coord) {
            warn!(scope = %scope, x = coord.x, y = coord.y, "Delta outside raster region");
            continue;
        }
        let cell = Coord::new(coord.x - region.origin_x, coord.y - region.origin_y);
        raster.fill_cell(cell.x, cell.y, delta.color.rgb());
        touched.insert(cell);
    }

    if grid {
        for cell in &touched {
            raster.grid_cell(cell.x, cell.y);
        }
    }

    store.save(scope, scale, &raster.encode_png()?)?;
    Ok(touched.len())
}

/// Rebuild the raster for `scope` from reconstructed state.
pub(crate) fn render_region(
    store: &dyn RasterStore,
    scope: &RasterScope,
    region: TileExtent,
    state: &CanvasState,
    scale: u32,
    grid: bool,
) -> Result<usize> {
    let background = state.metadata.background_color.rgb();
    let mut raster = Raster::blank(region.width, region.height, scale, background)?;

    let rows = Coord::new(0, region.origin_y)..Coord::new(0, region.origin_y + region.height);
    let mut painted = 0;
    for (coord, pixel) in state.pixels.range(rows) {
        if region.contains(*coord) {
            raster.fill_cell(
                coord.x - region.origin_x,
                coord.y - region.origin_y,
                pixel.color.rgb(),
            );
            painted += 1;
        }
    }
    if grid {
        raster.grid_all();
    }

    store.save(scope, scale, &raster.encode_png()?)?;
    Ok(painted)
}
