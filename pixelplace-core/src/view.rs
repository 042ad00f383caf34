//! Read-optimized projections of the event log.

use crate::engine::EventListener;
use crate::error::Result;
use crate::eventlog::EventEnvelope;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pixelplace_types::{CanvasEvent, CanvasId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasView {
    pub canvas_id: CanvasId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub background_color: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelView {
    /// `{canvasId}_{x}_{y}`
    pub pixel_id: String,
    pub canvas_id: CanvasId,
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub user_id: String,
    pub placement_count: u64,
    pub placed_at: DateTime<Utc>,
}

/// A record accepted by a [`ViewSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRecord {
    Canvas(CanvasView),
    Pixel(PixelView),
}

impl ViewRecord {
    pub fn primary_key(&self) -> &str {
        match self {
            ViewRecord::Canvas(view) => view.canvas_id.as_str(),
            ViewRecord::Pixel(view) => &view.pixel_id,
        }
    }

    /// Project a stored event. Every field derives from the envelope, so
    /// projecting the same envelope twice yields the same record.
    pub fn from_envelope(envelope: &EventEnvelope) -> Self {
        match &envelope.event {
            CanvasEvent::CanvasCreated(e) => ViewRecord::Canvas(CanvasView {
                canvas_id: e.canvas_id.clone(),
                name: e.name.clone(),
                width: e.width,
                height: e.height,
                background_color: e.background_color.to_string(),
                created_by: e.created_by.clone(),
                created_at: envelope.recorded_at,
                updated_at: envelope.recorded_at,
            }),
            CanvasEvent::PixelPlaced(e) => ViewRecord::Pixel(PixelView {
                pixel_id: e.key().stream_id(),
                canvas_id: e.canvas_id.clone(),
                x: e.x,
                y: e.y,
                color: e.color.to_string(),
                user_id: e.user_id.clone(),
                placement_count: e.total_placements,
                placed_at: e.placed_at().unwrap_or(envelope.recorded_at),
            }),
        }
    }
}

/// Upsert-capable record store collaborator.
///
/// `upsert` must be idempotent by primary key.
pub trait ViewSink: Send + Sync {
    fn upsert(&self, record: ViewRecord) -> Result<()>;
}

/// In-memory view store.
#[derive(Debug, Default)]
pub struct MemoryViewStore {
    canvases: DashMap<String, CanvasView>,
    pixels: DashMap<String, PixelView>,
    upserts: AtomicU64,
}

impl MemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canvas(&self, canvas_id: &CanvasId) -> Option<CanvasView> {
        self.canvases.get(canvas_id.as_str()).map(|v| v.clone())
    }

    pub fn pixel(&self, pixel_id: &str) -> Option<PixelView> {
        self.pixels.get(pixel_id).map(|v| v.clone())
    }

    /// Pixels of one canvas, row-major.
    pub fn pixels_for(&self, canvas_id: &CanvasId) -> Vec<PixelView> {
        let mut views: Vec<_> = self
            .pixels
            .iter()
            .filter(|v| &v.canvas_id == canvas_id)
            .map(|v| v.clone())
            .collect();
        views.sort_by_key(|v| (v.y, v.x));
        views
    }

    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }
}

impl ViewSink for MemoryViewStore {
    fn upsert(&self, record: ViewRecord) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::Relaxed);
        match record {
            ViewRecord::Canvas(view) => {
                self.canvases.insert(view.canvas_id.to_string(), view);
            }
            ViewRecord::Pixel(view) => {
                // An older event replayed late must not overwrite a newer one.
                let mut entry = self.pixels.entry(view.pixel_id.clone()).or_insert(view.clone());
                if view.placement_count >= entry.placement_count {
                    *entry = view;
                }
            }
        }
        Ok(())
    }
}

/// Listener that keeps a [`ViewSink`] up to date.
pub struct ViewProjector {
    sink: Arc<dyn ViewSink>,
}

impl ViewProjector {
    pub fn new(sink: Arc<dyn ViewSink>) -> Self {
        Self { sink }
    }
}

impl EventListener for ViewProjector {
    fn on_event(&self, envelope: &EventEnvelope) {
        let record = ViewRecord::from_envelope(envelope);
        let key = record.primary_key().to_string();
        match self.sink.upsert(record) {
            Ok(()) => debug!(key = %key, "Projected view record"),
            Err(e) => error!(key = %key, error = %e, "Failed to project view record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelplace_types::{HexColor, PixelPlaced, Placement};

    fn envelope(position: u64, total: u64, color: &str) -> EventEnvelope {
        let now = Utc::now();
        EventEnvelope {
            stream_id: "c_1_2".to_string(),
            sequence: total,
            position,
            recorded_at: now,
            event: CanvasEvent::PixelPlaced(PixelPlaced {
                canvas_id: CanvasId::new("c"),
                x: 1,
                y: 2,
                color: HexColor::parse(color).unwrap(),
                user_id: "u".to_string(),
                history: vec![Placement {
                    user_id: "u".to_string(),
                    placed_at: now,
                }],
                total_placements: total,
            }),
        }
    }

    #[test]
    fn test_pixel_primary_key() {
        let record = ViewRecord::from_envelope(&envelope(1, 1, "#000"));
        assert_eq!(record.primary_key(), "c_1_2");
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = Arc::new(MemoryViewStore::new());
        let projector = ViewProjector::new(store.clone());
        let env = envelope(1, 1, "#000");
        projector.on_event(&env);
        projector.on_event(&env);

        assert_eq!(store.pixels_for(&CanvasId::new("c")).len(), 1);
        assert_eq!(store.pixel("c_1_2").unwrap().color, "#000000");
        assert_eq!(store.upsert_count(), 2);
    }

    #[test]
    fn test_stale_pixel_does_not_overwrite() {
        let store = MemoryViewStore::new();
        store
            .upsert(ViewRecord::from_envelope(&envelope(5, 2, "#F00")))
            .unwrap();
        store
            .upsert(ViewRecord::from_envelope(&envelope(3, 1, "#0F0")))
            .unwrap();
        assert_eq!(store.pixel("c_1_2").unwrap().color, "#FF0000");
    }
}
