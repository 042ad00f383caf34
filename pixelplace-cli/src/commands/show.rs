//! Print a canvas reconstructed from the event log.

use crate::app::Settings;
use anyhow::{Context, Result};
use pixelplace_core::{CanvasId, CanvasState};
use serde_json::{json, Value};

pub fn show_canvas(settings: &Settings, canvas: &str, pixels: bool, json: bool) -> Result<()> {
    let engine = settings.open_engine()?;
    let state = engine
        .canvas_state(&CanvasId::new(canvas))
        .with_context(|| format!("Canvas '{canvas}' could not be loaded"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&state, pixels))?);
        return Ok(());
    }

    let meta = &state.metadata;
    println!("Canvas {} \"{}\"", meta.canvas_id, meta.name);
    println!("  Size: {}x{}", meta.width, meta.height);
    println!("  Background: {}", meta.background_color);
    println!("  Created by {} at {}", meta.created_by, meta.created_at.to_rfc3339());
    println!("  Painted cells: {}", state.pixels.len());
    if pixels {
        for record in state.pixels.values() {
            let last_user = record.history.last().map_or("-", |p| p.user_id.as_str());
            println!(
                "  ({}, {}) {} placements={} last={}",
                record.coord.x, record.coord.y, record.color, record.total_placements, last_user
            );
        }
    }
    Ok(())
}

fn to_json(state: &CanvasState, pixels: bool) -> Value {
    let meta = &state.metadata;
    let mut payload = json!({
        "canvasId": meta.canvas_id,
        "name": meta.name,
        "width": meta.width,
        "height": meta.height,
        "backgroundColor": meta.background_color,
        "createdBy": meta.created_by,
        "createdAt": meta.created_at,
        "paintedCells": state.pixels.len(),
    });
    if pixels {
        payload["pixels"] = state
            .pixels
            .values()
            .map(|record| {
                json!({
                    "x": record.coord.x,
                    "y": record.coord.y,
                    "color": record.color,
                    "totalPlacements": record.total_placements,
                    "history": record.history,
                })
            })
            .collect();
    }
    payload
}
