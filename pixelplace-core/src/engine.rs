//! Command handling and event delivery.

use crate::config::Config;
use crate::entity::{
    validate_canvas_id, validate_placement, CanvasEntity, Entity, EntityStore, PixelEntity,
};
use crate::error::{CanvasError, Result};
use crate::eventlog::{EventEnvelope, EventLog};
use crate::ratelimit::{policy_from_config, PlacementPolicy};
use crate::reconstruct::{CanvasState, StateReconstructor};
use chrono::Utc;
use parking_lot::RwLock;
use pixelplace_types::{CanvasCreated, CanvasEvent, CanvasId, CreateCanvas, PixelPlaced, PlacePixel};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives every event after it is durably appended.
///
/// Events for one coordinate arrive in log order; nothing is guaranteed
/// across coordinates. Implementations must not block for long and must
/// handle their own failures.
pub trait EventListener: Send + Sync {
    fn on_event(&self, envelope: &EventEnvelope);
}

/// The write side: validates commands, appends events, notifies listeners.
pub struct CanvasEngine {
    log: Arc<dyn EventLog>,
    canvases: EntityStore<CanvasEntity>,
    pixels: EntityStore<PixelEntity>,
    reconstructor: Arc<StateReconstructor>,
    policy: Arc<dyn PlacementPolicy>,
    retain_last: Option<usize>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl CanvasEngine {
    pub fn new(log: Arc<dyn EventLog>, config: &Config) -> Self {
        Self {
            canvases: EntityStore::new(log.clone()),
            pixels: EntityStore::new(log.clone()),
            reconstructor: Arc::new(StateReconstructor::new(log.clone())),
            policy: policy_from_config(&config.rate_limit),
            retain_last: config.history.retain_last,
            listeners: RwLock::new(Vec::new()),
            log,
        }
    }

    /// Replace the placement policy selected by configuration.
    pub fn with_policy(mut self, policy: Arc<dyn PlacementPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Create a canvas; a UUID is assigned when the command carries no id.
    pub fn create_canvas(&self, command: CreateCanvas) -> Result<CanvasCreated> {
        let canvas_id = command
            .canvas_id
            .clone()
            .unwrap_or_else(|| CanvasId::new(uuid::Uuid::new_v4().to_string()));
        validate_canvas_id(&canvas_id)?;

        let handle = self.canvases.handle(&canvas_id)?;
        let mut canvas = handle.lock();
        let created = canvas.create(&command)?;
        let envelope = self.log.append(
            &CanvasEntity::stream_id(&canvas_id),
            canvas.version(),
            CanvasEvent::CanvasCreated(created.clone()),
        )?;
        canvas.apply(&envelope)?;

        info!(
            canvas = %canvas_id,
            width = created.width,
            height = created.height,
            "Created canvas"
        );
        self.notify(&envelope);
        Ok(created)
    }

    /// Place one pixel.
    ///
    /// Rejects coordinates outside the canvas. Holds the coordinate's lock
    /// from validation through listener delivery, so listeners observe one
    /// coordinate's placements in log order.
    pub fn place_pixel(&self, command: PlacePixel) -> Result<PixelPlaced> {
        let placement = validate_placement(&command)?;
        let metadata = self.reconstructor.metadata(&placement.key.canvas_id)?;
        if !metadata.contains(placement.key.coord) {
            return Err(CanvasError::validation(format!(
                "pixel {} is outside the {}x{} canvas {}",
                placement.key.coord, metadata.width, metadata.height, metadata.canvas_id
            )));
        }

        let handle = self.pixels.handle(&placement.key)?;
        let mut pixel = handle.lock();
        let placed = pixel.place(&placement, Utc::now(), self.policy.as_ref(), self.retain_last)?;
        let envelope = self.log.append(
            &PixelEntity::stream_id(&placement.key),
            pixel.version(),
            CanvasEvent::PixelPlaced(placed.clone()),
        )?;
        pixel.apply(&envelope)?;
        self.reconstructor.invalidate(&placement.key.canvas_id);

        debug!(
            pixel = %placement.key,
            color = %placed.color,
            user = %placed.user_id,
            position = envelope.position,
            "Placed pixel"
        );
        self.notify(&envelope);
        Ok(placed)
    }

    /// Reconstructed state of a canvas.
    pub fn canvas_state(&self, canvas_id: &CanvasId) -> Result<Arc<CanvasState>> {
        self.reconstructor.rebuild(canvas_id)
    }

    /// Ids of every canvas in the log.
    pub fn canvas_ids(&self) -> Result<BTreeSet<CanvasId>> {
        Ok(self
            .log
            .list_stream_ids("")?
            .into_iter()
            .filter(|id| !id.contains('_'))
            .map(CanvasId::new)
            .collect())
    }

    pub fn reconstructor(&self) -> &Arc<StateReconstructor> {
        &self.reconstructor
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    fn notify(&self, envelope: &EventEnvelope) {
        for listener in self.listeners.read().iter() {
            listener.on_event(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::MemoryEventLog;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, u64)>>,
    }

    impl EventListener for Recorder {
        fn on_event(&self, envelope: &EventEnvelope) {
            self.seen
                .lock()
                .push((envelope.event.type_name().to_string(), envelope.position));
        }
    }

    fn engine() -> CanvasEngine {
        CanvasEngine::new(Arc::new(MemoryEventLog::new()), &Config::default())
    }

    fn create(id: Option<&str>) -> CreateCanvas {
        CreateCanvas {
            canvas_id: id.map(CanvasId::new),
            name: "Board".to_string(),
            width: 100,
            height: 100,
            background_color: "#FFFFFF".to_string(),
            created_by: "admin".to_string(),
        }
    }

    #[test]
    fn test_generated_canvas_id() {
        let engine = engine();
        let created = engine.create_canvas(create(None)).unwrap();
        assert_eq!(created.canvas_id.as_str().len(), 36);
        assert!(engine.canvas_ids().unwrap().contains(&created.canvas_id));
    }

    #[test]
    fn test_duplicate_create_rejected_without_event() {
        let engine = engine();
        engine.create_canvas(create(Some("dup"))).unwrap();
        let before = engine.log().last_position();
        assert!(engine
            .create_canvas(create(Some("dup")))
            .unwrap_err()
            .is_validation());
        assert_eq!(engine.log().last_position(), before);
    }

    #[test]
    fn test_place_on_unknown_canvas_is_not_found() {
        let engine = engine();
        let err = engine
            .place_pixel(PlacePixel::new("ghost", 1, 1, "#000", "u1"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let engine = engine();
        engine.create_canvas(create(Some("b"))).unwrap();
        for (x, y) in [(100, 0), (0, 100), (5000, 5000)] {
            let err = engine
                .place_pixel(PlacePixel::new("b", x, y, "#000", "u1"))
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert!(engine
            .place_pixel(PlacePixel::new("b", 99, 99, "#000", "u1"))
            .is_ok());
        assert_eq!(engine.log().last_position(), 2);
    }

    #[test]
    fn test_listeners_see_events_in_order() {
        let engine = engine();
        let recorder = Arc::new(Recorder::default());
        engine.subscribe(recorder.clone());

        engine.create_canvas(create(Some("l"))).unwrap();
        engine
            .place_pixel(PlacePixel::new("l", 1, 1, "#000", "u1"))
            .unwrap();
        engine
            .place_pixel(PlacePixel::new("l", 1, 1, "#fff", "u2"))
            .unwrap();

        let seen = recorder.seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                ("CanvasCreated".to_string(), 1),
                ("PixelPlaced".to_string(), 2),
                ("PixelPlaced".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_placement_invalidates_snapshot() {
        let engine = engine();
        engine.create_canvas(create(Some("s"))).unwrap();
        let id = CanvasId::new("s");
        assert!(engine.canvas_state(&id).unwrap().pixels.is_empty());

        engine
            .place_pixel(PlacePixel::new("s", 3, 3, "#abc", "u1"))
            .unwrap();
        let state = engine.canvas_state(&id).unwrap();
        assert_eq!(state.color_at(pixelplace_types::Coord::new(3, 3)).as_str(), "#AABBCC");
    }
}
