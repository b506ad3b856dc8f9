//! Matrix drivers: the per-pixel set / commit / brightness surface the
//! pixel streamer talks to.
//!
//! - `HardwareDriver` (feature `hardware`): rpi-rgb-led-matrix via
//!   `rpi-led-matrix`, double-buffered with `swap()`.
//! - `SimulatedDriver`: in-memory frame for development hosts, optionally
//!   written out as a PNG on every commit.
//! - `RecordingDriver`: records every call, for tests.
//!
//! Brightness is applied in software as pixels are set, so it must be
//! chosen before a frame is streamed.

use crate::{Color, PanelConfig};
use image::{Rgb, RgbImage};
use std::path::PathBuf;
use thiserror::Error;

/// The matrix could not be initialised (not root, GPIO unavailable, bad
/// options).
#[derive(Error, Debug)]
#[error("matrix initialisation failed: {0}")]
pub struct DriverError(pub String);

pub trait MatrixDriver {
    fn set_pixel(&mut self, x: i32, y: i32, color: Color);
    /// Commit everything set since the last update to the panel.
    fn update(&mut self);
    /// Brightness in percent, 0-100.
    fn set_brightness(&mut self, percent: u8);
    fn brightness(&self) -> u8;
}

// ── Hardware ─────────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use hardware::HardwareDriver;

#[cfg(feature = "hardware")]
mod hardware {
    use super::{DriverError, MatrixDriver};
    use crate::config::HardwareConfig;
    use crate::{Color, PanelConfig, create_matrix};
    use rpi_led_matrix::{LedCanvas, LedMatrix};

    /// The `rpi-led-matrix` C library is not thread-safe; this driver stays
    /// on the thread that created it.
    pub struct HardwareDriver {
        matrix: LedMatrix,
        // Taken and replaced on every swap.
        canvas: Option<LedCanvas>,
        brightness: u8,
    }

    impl HardwareDriver {
        pub fn new(panel: PanelConfig, hw: &HardwareConfig) -> Result<Self, DriverError> {
            let matrix = create_matrix(panel, hw).map_err(|e| DriverError(e.to_string()))?;
            let canvas = matrix.offscreen_canvas();
            Ok(Self {
                matrix,
                canvas: Some(canvas),
                brightness: hw.initial_brightness.min(100),
            })
        }
    }

    impl MatrixDriver for HardwareDriver {
        fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
            if let Some(canvas) = self.canvas.as_mut() {
                canvas.set(x, y, &color.apply_brightness(self.brightness).into());
            }
        }

        fn update(&mut self) {
            if let Some(canvas) = self.canvas.take() {
                self.canvas = Some(self.matrix.swap(canvas));
            }
        }

        fn set_brightness(&mut self, percent: u8) {
            self.brightness = percent.min(100);
        }

        fn brightness(&self) -> u8 {
            self.brightness
        }
    }
}

// ── Simulated ────────────────────────────────────────────────────────

pub struct SimulatedDriver {
    frame: RgbImage,
    brightness: u8,
    snapshot: Option<PathBuf>,
    commits: u64,
}

impl SimulatedDriver {
    pub fn new(panel: PanelConfig, brightness: u8, snapshot: Option<PathBuf>) -> Self {
        Self {
            frame: RgbImage::new(panel.frame_width(), panel.frame_height()),
            brightness: brightness.min(100),
            snapshot,
            commits: 0,
        }
    }

    pub fn frame(&self) -> &RgbImage {
        &self.frame
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl MatrixDriver for SimulatedDriver {
    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x as u32 >= self.frame.width() || y as u32 >= self.frame.height() {
            return;
        }
        let c = color.apply_brightness(self.brightness);
        self.frame.put_pixel(x as u32, y as u32, Rgb([c.r, c.g, c.b]));
    }

    fn update(&mut self) {
        self.commits += 1;
        if let Some(path) = &self.snapshot {
            if let Err(e) = self.frame.save(path) {
                tracing::warn!("Failed to write snapshot {}: {}", path.display(), e);
            }
        }
    }

    fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent.min(100);
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }
}

// ── Recording ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverCall {
    SetPixel { x: i32, y: i32, color: Color },
    Update,
    SetBrightness(u8),
}

/// Test double: records calls in order, colors unscaled.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub calls: Vec<DriverCall>,
    brightness: u8,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixels(&self) -> Vec<(i32, i32, Color)> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                DriverCall::SetPixel { x, y, color } => Some((x, y, color)),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DriverCall::Update))
            .count()
    }
}

impl MatrixDriver for RecordingDriver {
    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        self.calls.push(DriverCall::SetPixel { x, y, color });
    }

    fn update(&mut self) {
        self.calls.push(DriverCall::Update);
    }

    fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent;
        self.calls.push(DriverCall::SetBrightness(percent));
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }
}
