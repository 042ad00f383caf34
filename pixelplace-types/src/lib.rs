//! Shared types for pixelplace
//!
//! This crate provides the vocabulary used across the pixelplace crates:
//! canvas, pixel and tile identifiers, normalized hex colors, the commands
//! accepted by the engine and the events it appends to the log.

pub mod color;
pub mod command;
pub mod event;
pub mod ids;

pub use color::{ColorError, HexColor};
pub use command::{CreateCanvas, PlacePixel};
pub use event::{CanvasCreated, CanvasEvent, PixelDelta, PixelPlaced, Placement};
pub use ids::{CanvasId, Coord, PixelKey, TileKey};
