//! Event-driven raster maintenance.
//!
//! ```text
//! PixelPlaced ─┬─> canvas accumulator ──(threshold | sweep)──> canvas queue ──> IncrementalRenderer
//!              └─> tile accumulator   ──(threshold | sweep)──> tile queue   ──> TileRenderer
//! CanvasCreated ─────────────────────────────────────────────> canvas queue (regenerate)
//! ```

use crate::accumulator::BatchAccumulator;
use crate::metrics::{FlushMetrics, FlushSnapshot};
use crate::queue::{RenderJob, RenderQueue};
use pixelplace_core::{
    CanvasError, EventEnvelope, EventListener, GenerationConfig, StateReconstructor, TileRouter,
};
use pixelplace_render::{IncrementalRenderer, RasterStore, TileRenderer};
use pixelplace_types::{CanvasEvent, CanvasId, PixelDelta, TileKey};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Pending work and counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub canvas_scopes: usize,
    pub canvas_pending: usize,
    pub tile_scopes: usize,
    pub tile_pending: usize,
    pub renders_in_flight: usize,
    pub render_workers: usize,
    pub metrics: FlushSnapshot,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  Pending: {} deltas in {} canvas scopes | {} deltas in {} tile scopes",
            self.canvas_pending, self.canvas_scopes, self.tile_pending, self.tile_scopes
        )?;
        writeln!(
            f,
            "  Renders in flight: {} across {} workers",
            self.renders_in_flight, self.render_workers
        )?;
        write!(f, "{}", self.metrics)
    }
}

pub struct BatchPipeline {
    config: GenerationConfig,
    router: TileRouter,
    reconstructor: Arc<StateReconstructor>,
    canvas_batches: BatchAccumulator<CanvasId>,
    tile_batches: BatchAccumulator<TileKey>,
    canvas_queue: Arc<RenderQueue<IncrementalRenderer>>,
    tile_queue: Arc<RenderQueue<TileRenderer>>,
    metrics: Arc<FlushMetrics>,
    runtime: Handle,
}

impl BatchPipeline {
    /// Build a pipeline whose render workers run on `runtime`.
    ///
    /// `reconstructor` must be the one the engine invalidates on every
    /// placement.
    pub fn new(
        config: GenerationConfig,
        reconstructor: Arc<StateReconstructor>,
        store: Arc<dyn RasterStore>,
        runtime: Handle,
    ) -> Self {
        let router = TileRouter::new(config.tile_size);
        let metrics = Arc::new(FlushMetrics::new());

        let canvas_renderer = Arc::new(IncrementalRenderer::new(reconstructor.clone(), store.clone()));
        let tile_renderer = Arc::new(TileRenderer::new(reconstructor.clone(), store, router));

        let canvas_queue = Arc::new(RenderQueue::new(
            canvas_renderer,
            config.scale_versions.clone(),
            config.default_grid,
            metrics.clone(),
            runtime.clone(),
        ));
        let tile_queue = Arc::new(RenderQueue::new(
            tile_renderer,
            config.tile_scale_versions.clone(),
            config.default_grid,
            metrics.clone(),
            runtime.clone(),
        ));

        let canvas_batches = BatchAccumulator::new(
            config.mode,
            config.canvas_batch_size,
            canvas_queue.clone(),
            metrics.clone(),
        );
        let tile_batches = BatchAccumulator::new(
            config.mode,
            config.tile_batch_size,
            tile_queue.clone(),
            metrics.clone(),
        );

        info!(
            enabled = config.enabled,
            mode = ?config.mode,
            canvas_batch_size = config.canvas_batch_size,
            tile_batch_size = config.tile_batch_size,
            tiles = config.tiles_enabled,
            "Batch pipeline configured"
        );

        Self {
            config,
            router,
            reconstructor,
            canvas_batches,
            tile_batches,
            canvas_queue,
            tile_queue,
            metrics,
            runtime,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Start the scheduled sweep, if the mode has a timer.
    ///
    /// The task holds only a weak reference and stops once the pipeline is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enabled || !self.config.mode.flushes_on_timer() {
            return None;
        }
        let period = self.config.batch_interval();
        let pipeline: Weak<Self> = Arc::downgrade(self);
        Some(self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(pipeline) = pipeline.upgrade() else {
                    break;
                };
                let flushed = pipeline.sweep();
                if flushed > 0 {
                    debug!(deltas = flushed, "Sweep flushed pending deltas");
                }
            }
        }))
    }

    /// Flush every non-empty scope, as the timer does.
    pub fn sweep(&self) -> usize {
        self.canvas_batches.sweep() + self.tile_batches.sweep()
    }

    /// Flush every non-empty scope regardless of mode.
    pub fn flush_all(&self) -> usize {
        self.canvas_batches.flush_all() + self.tile_batches.flush_all()
    }

    /// Resolve once every queued render has finished.
    pub async fn wait_idle(&self) {
        self.canvas_queue.wait_idle().await;
        self.tile_queue.wait_idle().await;
    }

    /// Flush everything, wait for the renders, and stop the workers.
    pub async fn shutdown(&self) {
        let flushed = self.flush_all();
        self.wait_idle().await;
        self.canvas_queue.close();
        self.tile_queue.close();
        info!(deltas = flushed, "Batch pipeline drained");
    }

    /// Queue full regeneration of a canvas and all of its tiles at every
    /// configured scale. Returns the number of scopes queued.
    pub fn repair_canvas(&self, canvas_id: &CanvasId) -> Result<usize, CanvasError> {
        let metadata = self.reconstructor.metadata(canvas_id)?;
        self.canvas_queue.enqueue(canvas_id, RenderJob::Regenerate);
        let mut scopes = 1;

        if self.config.tiles_enabled {
            for tile in self.router.tiles(canvas_id, metadata.width, metadata.height) {
                self.tile_queue.enqueue(&tile, RenderJob::Regenerate);
                scopes += 1;
            }
        }

        info!(canvas = %canvas_id, scopes, "Queued raster repair");
        Ok(scopes)
    }

    pub fn stats(&self) -> PipelineStats {
        let (canvas_scopes, canvas_pending) = self.canvas_batches.pending();
        let (tile_scopes, tile_pending) = self.tile_batches.pending();
        PipelineStats {
            canvas_scopes,
            canvas_pending,
            tile_scopes,
            tile_pending,
            renders_in_flight: self.canvas_queue.in_flight() + self.tile_queue.in_flight(),
            render_workers: self.canvas_queue.workers() + self.tile_queue.workers(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn accept(&self, delta: PixelDelta, canvas_id: &CanvasId) {
        self.metrics.record_accept();
        if self.config.tiles_enabled {
            let tile = self.router.tile_key(canvas_id, delta.coord());
            self.tile_batches.accept(tile, delta.clone());
        }
        self.canvas_batches.accept(canvas_id.clone(), delta);
    }
}

impl EventListener for BatchPipeline {
    fn on_event(&self, envelope: &EventEnvelope) {
        if !self.config.enabled {
            return;
        }
        match &envelope.event {
            CanvasEvent::CanvasCreated(created) => {
                debug!(canvas = %created.canvas_id, "Queueing base raster");
                self.canvas_queue
                    .enqueue(&created.canvas_id, RenderJob::Regenerate);
            }
            CanvasEvent::PixelPlaced(placed) => {
                let delta = PixelDelta::from_event(placed, envelope.position);
                self.accept(delta, &placed.canvas_id);
            }
        }
    }
}
