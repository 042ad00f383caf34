//! Raster rendering for pixelplace.
//!
//! Renderers keep one persisted PNG per `(scope, scale)` in a
//! [`RasterStore`]. [`ScopeRenderer::update`] paints deltas onto the stored
//! raster; [`ScopeRenderer::regenerate_full`] rebuilds it from reconstructed
//! canvas state. Both hold a per-scope lock, so two renders of the same
//! scope never race on its raster.

mod canvas;
pub mod error;
mod lock;
mod paint;
pub mod raster;
pub mod store;
mod tile;

pub use canvas::IncrementalRenderer;
pub use error::{RenderError, Result};
pub use lock::ScopeLocks;
pub use raster::Raster;
pub use store::{FsRasterStore, MemoryRasterStore, RasterScope, RasterStore};
pub use tile::TileRenderer;

use pixelplace_types::PixelDelta;
use std::fmt::Display;
use std::hash::Hash;

/// Paints one kind of scope.
pub trait ScopeRenderer: Send + Sync + 'static {
    type Scope: Clone + Eq + Hash + Display + Send + Sync + 'static;

    /// Paint `deltas` in order onto the stored raster, then redraw the grid
    /// over the painted cells when `grid` is set.
    fn update(&self, scope: &Self::Scope, deltas: &[PixelDelta], scale: u32, grid: bool) -> Result<()>;

    /// Rebuild the raster from the full reconstructed canvas.
    fn regenerate_full(&self, scope: &Self::Scope, scale: u32, grid: bool) -> Result<()>;
}
