//! RGB raster painted in `scale × scale` cell blocks.

use crate::error::{RenderError, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixelplace_core::MAX_SCALE;
use std::io::Cursor;

/// Grid line color.
pub const GRID_COLOR: [u8; 3] = [128, 128, 128];
/// Grid line opacity out of 255.
pub const GRID_ALPHA: u8 = 150;

/// A raster covering `cells_x × cells_y` cells at a fixed scale.
///
/// With a grid, the top row and left column of every cell hold the cell's
/// color blended with [`GRID_COLOR`]. The blend is always recomputed from
/// the cell interior, so drawing the grid twice changes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: RgbImage,
    scale: u32,
}

impl Raster {
    /// A raster filled with `background`.
    pub fn blank(cells_x: u32, cells_y: u32, scale: u32, background: [u8; 3]) -> Result<Self> {
        let (width, height) = pixel_size(cells_x, cells_y, scale)?;
        Ok(Self {
            image: RgbImage::from_pixel(width, height, Rgb(background)),
            scale,
        })
    }

    /// Decode a persisted raster, checking it covers `cells_x × cells_y`.
    pub fn decode(bytes: &[u8], cells_x: u32, cells_y: u32, scale: u32) -> Result<Self> {
        let expected = pixel_size(cells_x, cells_y, scale)?;
        let image = image::load_from_memory(bytes)?.to_rgb8();
        if image.dimensions() != expected {
            return Err(RenderError::DimensionMismatch {
                expected,
                actual: image.dimensions(),
            });
        }
        Ok(Self { image, scale })
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn cells(&self) -> (u32, u32) {
        (self.image.width() / self.scale, self.image.height() / self.scale)
    }

    /// Color of one output pixel.
    pub fn pixel(&self, px: u32, py: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(px, py).map(|p| p.0)
    }

    /// Paint cell `(cx, cy)`. Cells outside the raster are ignored.
    pub fn fill_cell(&mut self, cx: u32, cy: u32, rgb: [u8; 3]) -> bool {
        let (cells_x, cells_y) = self.cells();
        if cx >= cells_x || cy >= cells_y {
            return false;
        }
        let x0 = cx * self.scale;
        let y0 = cy * self.scale;
        for py in y0..y0 + self.scale {
            for px in x0..x0 + self.scale {
                self.image.put_pixel(px, py, Rgb(rgb));
            }
        }
        true
    }

    /// Draw the grid lines owned by cell `(cx, cy)`.
    pub fn grid_cell(&mut self, cx: u32, cy: u32) {
        let (cells_x, cells_y) = self.cells();
        if self.scale < 2 || cx >= cells_x || cy >= cells_y {
            return;
        }
        let x0 = cx * self.scale;
        let y0 = cy * self.scale;
        let interior = self.image.get_pixel(x0 + 1, y0 + 1).0;
        let line = Rgb(blend(GRID_COLOR, interior, GRID_ALPHA));
        for i in 0..self.scale {
            self.image.put_pixel(x0 + i, y0, line);
            self.image.put_pixel(x0, y0 + i, line);
        }
    }

    /// Draw the whole grid.
    pub fn grid_all(&mut self) {
        let (cells_x, cells_y) = self.cells();
        for cy in 0..cells_y {
            for cx in 0..cells_x {
                self.grid_cell(cx, cy);
            }
        }
    }
}

/// `src` over `dst` at `alpha / 255`.
fn blend(src: [u8; 3], dst: [u8; 3], alpha: u8) -> [u8; 3] {
    let a = u32::from(alpha);
    let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * (255 - a) + 127) / 255) as u8;
    [mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2])]
}

/// Output dimensions of `cells_x × cells_y` cells at `scale`.
fn pixel_size(cells_x: u32, cells_y: u32, scale: u32) -> Result<(u32, u32)> {
    let invalid = || RenderError::InvalidScale {
        cells_x,
        cells_y,
        scale,
    };
    if !(1..=MAX_SCALE).contains(&scale) {
        return Err(invalid());
    }
    let width = cells_x.checked_mul(scale).ok_or_else(invalid)?;
    let height = cells_y.checked_mul(scale).ok_or_else(invalid)?;
    Ok((width, height))
}
