//! Batched incremental raster regeneration.
//!
//! Placements become [`PixelDelta`](pixelplace_types::PixelDelta)s that are
//! buffered per scope, one [`BatchAccumulator`] keyed by canvas and one keyed
//! by tile. A bucket is flushed when it reaches its batch size (COUNT,
//! HYBRID) or when the scheduled sweep runs (TIME, HYBRID). Flushed batches
//! are painted by a per-scope [`RenderQueue`] worker, which falls back to a
//! full regeneration when an incremental render fails.
//!
//! The buffers are a performance cache: a crash loses un-flushed deltas,
//! never events, and [`BatchPipeline::repair_canvas`] rebuilds any raster
//! from the log.

pub mod accumulator;
pub mod metrics;
pub mod pipeline;
pub mod queue;

pub use accumulator::{BatchAccumulator, BatchSink};
pub use metrics::{FlushMetrics, FlushSnapshot, FlushTrigger};
pub use pipeline::{BatchPipeline, PipelineStats};
pub use queue::{RenderJob, RenderQueue};
