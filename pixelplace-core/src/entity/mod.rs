//! Consistency boundaries for canvases and pixels.
//!
//! An entity validates a command against its current state and produces the
//! event to append; it never mutates itself directly. State only changes by
//! applying stored envelopes, so live entities and replayed ones agree.

mod canvas;
mod pixel;
mod store;

pub use canvas::{validate_canvas_id, CanvasEntity, MAX_DIMENSION, MAX_NAME_LEN, MIN_DIMENSION};
pub use pixel::{validate_placement, PixelEntity, ValidPlacement};
pub use store::{Entity, EntityStore};
