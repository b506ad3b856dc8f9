//! Main loop: owns the panel context and sequences everything else.
//!
//! One task drives the panel. It waits on:
//! - the rotation timer (started once the background image has resolved)
//! - fetch outcomes from the orchestrator
//! - the render-queue deadline
//! - shutdown
//!
//! Rendering is synchronous: once a pass starts, nothing else touches the
//! frame state until the commit is done.

use crate::assets::load_scaled_async;
use crate::brightness::BrightnessScheduler;
use crate::compositor::FrameCompositor;
use crate::config::Config;
use crate::driver::MatrixDriver;
use crate::frame::{Applied, FieldUpdate, FrameState};
use crate::noaa::Fetcher;
use crate::orchestrator::{DataFetchOrchestrator, FetchOutcome};
use crate::raster::Raster;
use crate::station::StationRegistry;
use crate::stream::stream;
use crate::Shutdown;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of what the panel is showing, published after every render.
#[derive(Clone, Debug, Default, Serialize, utoipa::ToSchema)]
pub struct PanelStatus {
    pub station_id: u32,
    /// Full NOAA station name, once a temperature response supplied it
    pub station_name: Option<String>,
    /// Rotation tick the displayed data belongs to
    pub tick: u64,
    /// Brightness applied to the last frame (0-100)
    pub brightness: u8,
    pub has_tide: bool,
    pub has_air_temp: bool,
    pub has_water_temp: bool,
    pub has_wind: bool,
    pub has_moon: bool,
    pub has_background: bool,
    /// Frames committed since startup
    pub renders: u64,
    /// Local time of the last commit, `YYYY-MM-DD HH:MM:SS`
    pub last_render: Option<String>,
}

pub type SharedStatus = Arc<Mutex<PanelStatus>>;

// ── Render queue ─────────────────────────────────────────────────────

/// Coalesces bursts of render requests.
///
/// Every request pushes the deadline out by the debounce window, so the
/// last state change is always followed by a render. A zero window renders
/// every request immediately.
#[derive(Debug)]
pub struct RenderQueue {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl RenderQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
        }
    }

    /// Note a state change. Returns true when the caller should render now.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.debounce.is_zero() {
            return true;
        }
        self.deadline = Some(now + self.debounce);
        false
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Clear and report a pending render whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ── Panel context ────────────────────────────────────────────────────

/// Everything a render pass touches, owned in one place.
pub struct Panel<D: MatrixDriver> {
    pub state: FrameState,
    pub registry: StationRegistry,
    compositor: FrameCompositor,
    driver: D,
    scheduler: BrightnessScheduler,
    status: SharedStatus,
    renders: u64,
}

impl<D: MatrixDriver> Panel<D> {
    pub fn new(config: &Config, driver: D, status: SharedStatus) -> Self {
        let registry = StationRegistry::new(config.stations.clone());
        Self {
            state: FrameState::new(registry.current()),
            registry,
            compositor: FrameCompositor::new(config.panel),
            driver,
            scheduler: BrightnessScheduler::new(config.brightness),
            status,
            renders: 0,
        }
    }

    /// Brightness, composite, stream. Safe with any subset of data present.
    pub fn render(&mut self, now: NaiveDateTime) {
        let brightness = self.scheduler.brightness_for(now);
        self.driver.set_brightness(brightness);

        let raster = self.compositor.render(&self.state, now);
        stream(raster, &mut self.driver);
        self.renders += 1;

        tracing::debug!(
            station = self.state.station.id,
            tick = self.state.tick,
            brightness,
            tide = self.state.tides.is_some(),
            air = self.state.air_temp.is_some(),
            water = self.state.water_temp.is_some(),
            wind = self.state.wind.is_some(),
            moon = self.state.moon.is_some(),
            "Rendered frame"
        );
        self.publish(brightness, now);
    }

    /// Push an all-black frame.
    pub fn blank(&mut self) {
        let frame = self.compositor.raster();
        let raster = Raster::new(frame.width(), frame.height());
        stream(&raster, &mut self.driver);
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn publish(&self, brightness: u8, now: NaiveDateTime) {
        let state = &self.state;
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        *status = PanelStatus {
            station_id: state.station.id,
            station_name: state.display_name.clone(),
            tick: state.tick,
            brightness,
            has_tide: state.tides.is_some(),
            has_air_temp: state.air_temp.is_some(),
            has_water_temp: state.water_temp.is_some(),
            has_wind: state.wind.is_some(),
            has_moon: state.moon.is_some(),
            has_background: state.background.is_some(),
            renders: self.renders,
            last_render: Some(now.format("%Y-%m-%d %H:%M:%S").to_string()),
        };
    }
}

// ── Main loop ────────────────────────────────────────────────────────

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

async fn next_rotation(rotation: &mut Option<Interval>) {
    match rotation {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drive the panel until `shutdown` fires, then blank it.
///
/// Returns the driver so callers (and tests) can inspect what was sent.
pub async fn run<D, F>(
    config: Config,
    driver: D,
    fetcher: F,
    status: SharedStatus,
    shutdown: Shutdown,
) -> D
where
    D: MatrixDriver,
    F: Fetcher,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<FetchOutcome>();
    let orchestrator = DataFetchOrchestrator::new(
        Arc::new(fetcher),
        &config.noaa.base_url,
        config.assets.moon_dir.clone(),
        tx,
    );
    let mut panel = Panel::new(&config, driver, status);
    let mut queue = RenderQueue::new(config.render_debounce());
    let accept_stale = config.accept_stale_results;

    tracing::info!(
        stations = config.stations.len(),
        interval_secs = config.rotation_interval_secs,
        "Starting panel loop"
    );

    // First cycle: the current station, no advance.
    let now = local_now();
    let station = panel.registry.current();
    orchestrator.dispatch(&mut panel.state, station, now.date());
    panel.render(now);

    let background = load_scaled_async(
        config.assets.background_image.clone(),
        config.panel.frame_width(),
        config.panel.frame_height(),
    );
    tokio::pin!(background);
    let mut background_pending = true;
    let mut rotation: Option<Interval> = None;

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,

            result = &mut background, if background_pending => {
                background_pending = false;
                match result {
                    Ok(image) => {
                        panel.state.apply(panel.state.tick, FieldUpdate::Background(image), accept_stale);
                        if queue.request(Instant::now()) {
                            panel.render(local_now());
                        }
                    }
                    Err(e) => tracing::warn!("Background image unavailable: {}", e),
                }
                let period = config.rotation_interval();
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                rotation = Some(interval);
            }

            _ = next_rotation(&mut rotation) => {
                let today = local_now().date();
                orchestrator.rotate(&mut panel.registry, &mut panel.state, today);
                if queue.request(Instant::now()) {
                    panel.render(local_now());
                }
            }

            Some(outcome) = rx.recv() => {
                let field = outcome.update.name();
                match panel.state.apply(outcome.tick, outcome.update, accept_stale) {
                    Applied::Yes => {
                        if queue.request(Instant::now()) {
                            panel.render(local_now());
                        }
                    }
                    Applied::Stale => tracing::debug!(
                        tick = outcome.tick,
                        current = panel.state.tick,
                        field,
                        "Dropped result from an earlier tick"
                    ),
                }
            }

            _ = until(queue.deadline()) => {
                if queue.take_due(Instant::now()) {
                    panel.render(local_now());
                }
            }
        }
    }

    tracing::info!(renders = panel.renders(), "Shutting down, blanking panel");
    panel.blank();
    panel.into_driver()
}
