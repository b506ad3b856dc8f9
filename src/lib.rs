//! Tide panel: drives a chained RGB LED matrix with tide, weather and
//! moon-phase data for a rotating set of NOAA stations.
//!
//! This module holds the pieces every other module leans on:
//! - Panel geometry
//! - The `Color` type used between the compositor and the driver
//! - Matrix initialization with our hardware defaults
//! - Signal handling for clean shutdown
//!
//! The render-and-drive pipeline lives in the submodules:
//! `station` → `orchestrator` → `frame` → `compositor` → `stream`,
//! sequenced by `render::run`.

pub mod assets;
pub mod brightness;
pub mod compositor;
pub mod config;
pub mod driver;
pub mod frame;
pub mod moon;
pub mod noaa;
pub mod orchestrator;
pub mod raster;
pub mod render;
pub mod server;
pub mod station;
pub mod stream;

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

// ── Panel configuration ────────────────────────────────────────────

/// Geometry of the physical panel array.
///
/// `rows`/`cols` describe a single panel. The logical frame is
/// `sub_panels` panels laid side by side, so the raster the compositor
/// draws into is `cols * sub_panels` wide and `rows` tall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
    pub chained: u32,
    pub parallel: u32,
    pub sub_panels: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    /// Width of the logical frame (both sub-panels side by side).
    pub fn frame_width(&self) -> u32 {
        self.cols * self.sub_panels
    }

    pub fn frame_height(&self) -> u32 {
        self.rows
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 64,
            chained: 1,
            parallel: 2,
            sub_panels: 2,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// This lets us test the whole pipeline without `rpi-led-matrix`.
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix for the configured panel array.
///
/// Fails when not running as root or when GPIO is unavailable.
#[cfg(feature = "hardware")]
pub fn create_matrix(
    panel: PanelConfig,
    hw: &config::HardwareConfig,
) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_chain_length(panel.chained);
    options.set_parallel(panel.parallel);
    options.set_hardware_mapping(&hw.mapping);
    options.set_led_rgb_sequence(&hw.rgb_sequence);
    options.set_multiplexing(hw.multiplexing);
    options.set_row_addr_type(hw.row_addr_type);
    options.set_pwm_bits(hw.pwm_bits)?;
    options.set_pwm_lsb_nanoseconds(hw.pwm_lsb_nanoseconds);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(hw.gpio_slowdown);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Shared shutdown state: a flag the loop can poll plus a `Notify` that
/// wakes it when it is parked in `select!`.
#[derive(Clone)]
pub struct Shutdown {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolve once `trigger` has been called.
    pub async fn wait(&self) {
        while self.is_running() {
            self.wake.notified().await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Set up a SIGINT / SIGTERM / SIGHUP handler that triggers `Shutdown`.
/// SIGTERM needs ctrlc's `termination` feature; systemd stops units with it.
pub fn setup_signal_handler() -> Result<Shutdown, ctrlc::Error> {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    ctrlc::set_handler(move || {
        handle.trigger();
    })?;

    Ok(shutdown)
}

// ── Tests ──────────────────────────────────────────────────────────
