//! Create a canvas.

use crate::app::{Session, Settings};
use anyhow::{Context, Result};
use pixelplace_core::{CanvasId, CreateCanvas};

/// Arguments of `pixelplace create`.
pub struct CreateRequest {
    pub name: String,
    pub width: i64,
    pub height: i64,
    pub background: String,
    pub created_by: String,
    pub id: Option<String>,
}

/// Create a canvas and write its base rasters.
pub async fn create_canvas(settings: &Settings, request: CreateRequest) -> Result<()> {
    let session = Session::open(settings)?;

    let command = CreateCanvas {
        canvas_id: request.id.map(CanvasId::new),
        name: request.name,
        width: request.width,
        height: request.height,
        background_color: request.background,
        created_by: request.created_by,
    };
    let outcome = session.dispatcher().create_canvas(command).await;
    session.close().await;

    let created = outcome.context("Failed to create canvas")?;
    println!(
        "Created canvas {} ({}x{}, background {})",
        created.canvas_id, created.width, created.height, created.background_color
    );
    Ok(())
}
