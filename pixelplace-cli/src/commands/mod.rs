//! CLI command implementations.

pub mod create;
pub mod place;
pub mod render;
pub mod show;
pub mod stats;

pub use create::{create_canvas, CreateRequest};
pub use place::place_pixel;
pub use render::render_canvas;
pub use show::show_canvas;
pub use stats::show_stats;
