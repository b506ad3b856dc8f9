//! Pixel streamer: raster → device scan order.
//!
//! The raster is read as a flat run of RGBA quadruplets (alpha ignored).
//! Logical index `i` lands on device coordinates `(i % width, i / width)`
//! where `width` is the raster's full stride across both sub-panels. This
//! is the only place the physical wiring order is encoded.

use crate::Color;
use crate::driver::MatrixDriver;
use crate::raster::Raster;

/// Device coordinates for logical pixel index `i` in a frame `frame_width`
/// pixels wide.
pub fn device_coords(i: usize, frame_width: usize) -> (i32, i32) {
    ((i % frame_width) as i32, (i / frame_width) as i32)
}

/// Push every pixel of `raster` to `driver` in index order, then commit once.
pub fn stream<D: MatrixDriver + ?Sized>(raster: &Raster, driver: &mut D) {
    let frame_width = raster.width() as usize;
    for (i, px) in raster.as_raw().chunks_exact(4).enumerate() {
        let (x, y) = device_coords(i, frame_width);
        driver.set_pixel(x, y, Color::new(px[0], px[1], px[2]));
    }
    driver.update();
}
