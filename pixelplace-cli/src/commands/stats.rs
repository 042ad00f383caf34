//! Summarize the event log.

use crate::app::Settings;
use anyhow::{Context, Result};
use pixelplace_render::{RasterScope, RasterStore};
use serde_json::json;

pub fn show_stats(settings: &Settings, json: bool) -> Result<()> {
    let engine = settings.open_engine()?;
    let store = settings.raster_store();
    let ids = engine.canvas_ids().context("Failed to list canvases")?;
    let base_scale = settings
        .config
        .generation
        .scale_versions
        .iter()
        .copied()
        .min()
        .unwrap_or(1);

    let mut rows = Vec::with_capacity(ids.len());
    for id in &ids {
        let state = engine
            .canvas_state(id)
            .with_context(|| format!("Canvas '{id}' could not be loaded"))?;
        let placements: u64 = state.pixels.values().map(|p| p.total_placements).sum();
        let rendered = store
            .exists(&RasterScope::Canvas(id.clone()), base_scale)
            .with_context(|| format!("Failed to check rasters of '{id}'"))?;
        rows.push((state, placements, rendered));
    }

    let events = engine.log().last_position();
    if json {
        let canvases: Vec<_> = rows
            .iter()
            .map(|(state, placements, rendered)| {
                json!({
                    "canvasId": state.metadata.canvas_id,
                    "name": state.metadata.name,
                    "width": state.metadata.width,
                    "height": state.metadata.height,
                    "paintedCells": state.pixels.len(),
                    "placements": placements,
                    "rendered": rendered,
                })
            })
            .collect();
        let payload = json!({ "events": events, "canvases": canvases });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Events: {events}");
    println!("Canvases: {}", rows.len());
    for (state, placements, rendered) in &rows {
        let meta = &state.metadata;
        println!(
            "  {} \"{}\" {}x{} | {} painted | {} placements | raster {}",
            meta.canvas_id,
            meta.name,
            meta.width,
            meta.height,
            state.pixels.len(),
            placements,
            if *rendered { "present" } else { "missing" }
        );
    }
    Ok(())
}
