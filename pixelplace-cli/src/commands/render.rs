//! Regenerate canvas and tile rasters from the event log.

use crate::app::Settings;
use anyhow::{Context, Result};
use pixelplace_core::{CanvasId, TileRouter, MAX_SCALE};
use pixelplace_render::{IncrementalRenderer, RasterScope, ScopeRenderer, TileRenderer};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Rebuild every requested raster of `canvas` from scratch.
///
/// `scales` overrides both the canvas and tile scale sets; when empty the
/// configured ones apply.
pub fn render_canvas(
    settings: &Settings,
    canvas: &str,
    scales: &[u32],
    grid: bool,
    tiles: bool,
) -> Result<()> {
    let generation = &settings.config.generation;
    let grid = grid || generation.default_grid;
    let canvas_scales = pick_scales(scales, &generation.scale_versions)?;
    let tile_scales = pick_scales(scales, &generation.tile_scale_versions)?;

    let engine = settings.open_engine()?;
    let canvas_id = CanvasId::new(canvas);
    let metadata = engine
        .reconstructor()
        .metadata(&canvas_id)
        .with_context(|| format!("Canvas '{canvas}' could not be loaded"))?;

    let fs_store = settings.raster_store();
    let started = Instant::now();
    let mut written = 0usize;

    let renderer = IncrementalRenderer::new(engine.reconstructor().clone(), fs_store.clone());
    for &scale in &canvas_scales {
        renderer
            .regenerate_full(&canvas_id, scale, grid)
            .with_context(|| format!("Failed to render {canvas} at scale {scale}"))?;
        let path = fs_store.path_for(&RasterScope::Canvas(canvas_id.clone()), scale);
        println!("{}", path.display());
        written += 1;
    }

    if tiles {
        let router = TileRouter::new(generation.tile_size);
        let tile_renderer =
            TileRenderer::new(engine.reconstructor().clone(), fs_store.clone(), router);
        let keys: Vec<_> = router
            .tiles(&canvas_id, metadata.width, metadata.height)
            .collect();
        for key in keys {
            for &scale in &tile_scales {
                tile_renderer
                    .regenerate_full(&key, scale, grid)
                    .with_context(|| format!("Failed to render tile {key} at scale {scale}"))?;
                written += 1;
            }
        }
        println!(
            "{} ({} tiles)",
            fs_store
                .root()
                .join(canvas_id.as_str())
                .join("tiles")
                .display(),
            router.total_tiles(metadata.width, metadata.height)
        );
    }

    info!(
        canvas = %canvas_id,
        rasters = written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Render complete"
    );
    Ok(())
}

fn pick_scales(requested: &[u32], configured: &[u32]) -> Result<Vec<u32>> {
    if let Some(bad) = requested.iter().find(|s| !(1..=MAX_SCALE).contains(*s)) {
        anyhow::bail!("Scale {bad} is outside 1..={MAX_SCALE}");
    }
    let mut scales = if requested.is_empty() {
        configured.to_vec()
    } else {
        requested.to_vec()
    };
    scales.sort_unstable();
    scales.dedup();
    Ok(scales)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_scales_prefers_request() {
        assert_eq!(pick_scales(&[], &[1, 4]).unwrap(), vec![1, 4]);
        assert_eq!(pick_scales(&[3, 1, 3], &[1, 4]).unwrap(), vec![1, 3]);
        assert!(pick_scales(&[0], &[1]).is_err());
        assert!(pick_scales(&[2, MAX_SCALE + 1], &[1]).is_err());
        assert!(pick_scales(&[5_000_000], &[1]).is_err());
        assert_eq!(pick_scales(&[MAX_SCALE], &[1]).unwrap(), vec![MAX_SCALE]);
    }
}
