//! Canvas state reconstruction from the event log.
//!
//! A canvas is one metadata stream plus one stream per painted coordinate.
//! [`StateReconstructor::rebuild`] replays all of them into a
//! [`CanvasState`] and caches the snapshot until it is invalidated.

use crate::error::{CanvasError, Result};
use crate::eventlog::EventLog;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pixelplace_types::{CanvasCreated, CanvasEvent, CanvasId, Coord, HexColor, PixelKey, Placement};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable canvas metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasMetadata {
    pub canvas_id: CanvasId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub background_color: HexColor,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl CanvasMetadata {
    pub fn from_event(event: &CanvasCreated, created_at: DateTime<Utc>) -> Self {
        Self {
            canvas_id: event.canvas_id.clone(),
            name: event.name.clone(),
            width: event.width,
            height: event.height,
            background_color: event.background_color.clone(),
            created_by: event.created_by.clone(),
            created_at,
        }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }
}

/// Materialized state of one painted coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelRecord {
    pub coord: Coord,
    pub color: HexColor,
    pub history: Vec<Placement>,
    pub total_placements: u64,
    /// Log position of the event that set `color`.
    pub last_position: u64,
}

/// A canvas replayed from its streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasState {
    pub metadata: CanvasMetadata,
    /// Painted coordinates in row-major order.
    pub pixels: BTreeMap<Coord, PixelRecord>,
}

impl CanvasState {
    pub fn pixel(&self, coord: Coord) -> Option<&PixelRecord> {
        self.pixels.get(&coord)
    }

    /// Painted color, or the background for untouched cells.
    pub fn color_at(&self, coord: Coord) -> &HexColor {
        self.pixels
            .get(&coord)
            .map_or(&self.metadata.background_color, |p| &p.color)
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructorStats {
    pub hits: u64,
    pub misses: u64,
    pub skipped_streams: u64,
}

/// Replays canvases and caches the snapshots.
///
/// The cache is process-local. Every placement must call
/// [`invalidate`](Self::invalidate); a rebuild that raced with an
/// invalidation returns its result but does not cache it.
pub struct StateReconstructor {
    log: Arc<dyn EventLog>,
    snapshots: DashMap<CanvasId, Arc<CanvasState>>,
    metadata: DashMap<CanvasId, Arc<CanvasMetadata>>,
    epochs: DashMap<CanvasId, u64>,
    hits: AtomicU64,
    misses: AtomicU64,
    skipped: AtomicU64,
}

impl StateReconstructor {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            snapshots: DashMap::new(),
            metadata: DashMap::new(),
            epochs: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Current state of `canvas_id`, from cache when possible.
    pub fn rebuild(&self, canvas_id: &CanvasId) -> Result<Arc<CanvasState>> {
        if let Some(state) = self.snapshots.get(canvas_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(state.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let epoch = self.epoch(canvas_id);
        let state = Arc::new(self.replay(canvas_id)?);

        // Holding the epoch entry orders this check against invalidate().
        let current = self.epochs.entry(canvas_id.clone()).or_insert(0);
        if *current == epoch {
            self.snapshots.insert(canvas_id.clone(), state.clone());
        }
        drop(current);
        Ok(state)
    }

    /// Replay `canvas_id` from the log, bypassing the cache.
    ///
    /// A pixel stream that cannot be read or holds unexpected events is
    /// logged and left out; the rest of the canvas still reconstructs.
    pub fn replay(&self, canvas_id: &CanvasId) -> Result<CanvasState> {
        let metadata = self.load_metadata(canvas_id)?;
        let mut pixels = BTreeMap::new();

        let prefix = canvas_id.pixel_stream_prefix();
        let stream_ids = self.log.list_stream_ids(&prefix)?;
        for stream_id in &stream_ids {
            let Some(key) = PixelKey::from_stream_id(canvas_id, stream_id) else {
                continue;
            };
            match self.replay_pixel(&key, stream_id) {
                Ok(Some(record)) => {
                    pixels.insert(key.coord, record);
                }
                Ok(None) => {}
                Err(e) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(stream = %stream_id, error = %e, "Skipping unreadable pixel stream");
                }
            }
        }

        debug!(canvas = %canvas_id, pixels = pixels.len(), "Reconstructed canvas");
        Ok(CanvasState { metadata, pixels })
    }

    fn replay_pixel(&self, key: &PixelKey, stream_id: &str) -> Result<Option<PixelRecord>> {
        let mut record: Option<PixelRecord> = None;
        for envelope in self.log.read(stream_id)? {
            let CanvasEvent::PixelPlaced(placed) = envelope.event else {
                return Err(CanvasError::Persistence(format!(
                    "unexpected {} in pixel stream",
                    envelope.event.type_name()
                )));
            };
            let total = match (&record, placed.total_placements) {
                (_, n) if n > 0 => n,
                (Some(prev), _) => prev.total_placements + 1,
                (None, _) => 1,
            };
            record = Some(PixelRecord {
                coord: key.coord,
                color: placed.color,
                history: placed.history,
                total_placements: total,
                last_position: envelope.position,
            });
        }
        Ok(record)
    }

    /// Canvas metadata only, cached permanently since it never changes.
    pub fn metadata(&self, canvas_id: &CanvasId) -> Result<Arc<CanvasMetadata>> {
        if let Some(meta) = self.metadata.get(canvas_id) {
            return Ok(meta.clone());
        }
        let meta = Arc::new(self.load_metadata(canvas_id)?);
        self.metadata.insert(canvas_id.clone(), meta.clone());
        Ok(meta)
    }

    fn load_metadata(&self, canvas_id: &CanvasId) -> Result<CanvasMetadata> {
        let stream = self.log.read(canvas_id.as_str())?;
        let first = stream
            .first()
            .ok_or_else(|| CanvasError::not_found(format!("canvas {canvas_id}")))?;
        match &first.event {
            CanvasEvent::CanvasCreated(created) => {
                Ok(CanvasMetadata::from_event(created, first.recorded_at))
            }
            other => Err(CanvasError::Persistence(format!(
                "canvas stream {canvas_id} starts with {}",
                other.type_name()
            ))),
        }
    }

    /// Drop the cached snapshot for `canvas_id`.
    pub fn invalidate(&self, canvas_id: &CanvasId) {
        let mut epoch = self.epochs.entry(canvas_id.clone()).or_insert(0);
        *epoch += 1;
        self.snapshots.remove(canvas_id);
    }

    /// The cached snapshot, if any, without rebuilding.
    pub fn cached(&self, canvas_id: &CanvasId) -> Option<Arc<CanvasState>> {
        self.snapshots.get(canvas_id).map(|s| s.clone())
    }

    pub fn stats(&self) -> ReconstructorStats {
        ReconstructorStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            skipped_streams: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn epoch(&self, canvas_id: &CanvasId) -> u64 {
        self.epochs.get(canvas_id).map_or(0, |e| *e)
    }
}
