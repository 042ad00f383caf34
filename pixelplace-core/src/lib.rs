//! Event-sourced canvas and pixel state engine.
//!
//! Commands are validated by per-identity entities, appended to an
//! [`EventLog`], and delivered to [`EventListener`]s. Canvas state is
//! reconstructed on demand by replaying the log.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod entity;
pub mod error;
pub mod eventlog;
pub mod ratelimit;
pub mod reconstruct;
pub mod tile;
pub mod view;

pub use config::{BatchMode, Config, ConfigError, GenerationConfig, MAX_SCALE};
pub use dispatch::{Command, CommandDispatcher, CommandOutcome};
pub use engine::{CanvasEngine, EventListener};
pub use error::{CanvasError, Result};
pub use eventlog::{EventEnvelope, EventLog, FileEventLog, MemoryEventLog};
pub use ratelimit::{AllowAll, CooldownPolicy, PlacementPolicy};
pub use reconstruct::{CanvasMetadata, CanvasState, PixelRecord, StateReconstructor};
pub use tile::{TileExtent, TileRouter};
pub use view::{MemoryViewStore, ViewProjector, ViewRecord, ViewSink};

// Re-export the shared vocabulary
pub use pixelplace_types::*;
