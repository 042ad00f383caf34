//! Place a single pixel.

use crate::app::{Session, Settings};
use anyhow::{Context, Result};
use pixelplace_core::PlacePixel;

pub async fn place_pixel(
    settings: &Settings,
    canvas: &str,
    x: i64,
    y: i64,
    color: &str,
    user: &str,
) -> Result<()> {
    let session = Session::open(settings)?;

    let outcome = session
        .dispatcher()
        .place_pixel(PlacePixel::new(canvas, x, y, color, user))
        .await;
    let view = outcome
        .as_ref()
        .ok()
        .and_then(|placed| session.views.pixel(&placed.key().stream_id()));
    session.close().await;

    let placed = outcome.with_context(|| format!("Failed to place pixel on canvas '{canvas}'"))?;
    let placements = view.map_or(placed.total_placements, |v| v.placement_count);
    println!(
        "Placed {} at ({}, {}) on {} by {} [placement {}]",
        placed.color, placed.x, placed.y, placed.canvas_id, placed.user_id, placements
    );
    Ok(())
}
