//! The raster: one full display frame in memory.
//!
//! Backed by an `RgbaImage` so image layers blend with their own alpha.
//! Implements `embedded_graphics::DrawTarget`, which is how text lands on
//! it; `Translucent` wraps it for text drawn at partial opacity.

use crate::Color;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Size};
use image::{Rgba, RgbaImage};

#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major RGBA bytes, alpha last.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let Rgba([r, g, b, _]) = *self.image.get_pixel(x, y);
        Color::new(r, g, b)
    }

    pub fn fill(&mut self, color: Color) {
        for p in self.image.pixels_mut() {
            *p = Rgba([color.r, color.g, color.b, 255]);
        }
    }

    /// Blend `color` over the pixel at (x, y) with opacity `alpha`.
    /// Out-of-bounds coordinates are ignored.
    pub fn blend(&mut self, x: i32, y: i32, color: Color, alpha: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        let mix = |src: u8, dst: u8| -> u8 {
            ((src as u16 * alpha as u16 + dst as u16 * (255 - alpha as u16) + 127) / 255) as u8
        };
        dst.0 = [
            mix(color.r, dst.0[0]),
            mix(color.g, dst.0[1]),
            mix(color.b, dst.0[2]),
            255,
        ];
    }

    /// Composite `layer` with its top-left corner at (x, y), source-over.
    pub fn draw_image(&mut self, layer: &RgbaImage, x: i32, y: i32) {
        for (lx, ly, px) in layer.enumerate_pixels() {
            let Rgba([r, g, b, a]) = *px;
            if a == 0 {
                continue;
            }
            self.blend(x + lx as i32, y + ly as i32, Color::new(r, g, b), a);
        }
    }
}

impl OriginDimensions for Raster {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl DrawTarget for Raster {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.blend(
                point.x,
                point.y,
                Color::new(color.r(), color.g(), color.b()),
                255,
            );
        }
        Ok(())
    }
}

/// A view of the raster that draws at fixed opacity.
pub struct Translucent<'a> {
    raster: &'a mut Raster,
    alpha: u8,
}

impl<'a> Translucent<'a> {
    pub fn new(raster: &'a mut Raster, alpha: u8) -> Self {
        Self { raster, alpha }
    }
}

impl OriginDimensions for Translucent<'_> {
    fn size(&self) -> Size {
        self.raster.size()
    }
}

impl DrawTarget for Translucent<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.raster.blend(
                point.x,
                point.y,
                Color::new(color.r(), color.g(), color.b()),
                self.alpha,
            );
        }
        Ok(())
    }
}
