//! Frame state: everything one render pass reads.
//!
//! Fields are filled independently as fetches resolve. Each update replaces
//! a whole field in one assignment; nothing is built up in place. Rotation
//! clears every station-scoped field before any new fetch can resolve, so a
//! frame never mixes the previous station's data with the current one.

use crate::station::Station;
use chrono::{NaiveDate, NaiveDateTime};
use image::RgbaImage;

/// Title shown until a temperature response names the station.
pub const LOADING_TITLE: &str = "Loading...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    /// NOAA reports "H"/"L", and "HH"/"LL" for higher-high/lower-low.
    pub fn from_noaa(code: &str) -> Option<Self> {
        match code.trim().chars().next()? {
            'H' | 'h' => Some(Self::High),
            'L' | 'l' => Some(Self::Low),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Low => "L",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TideEvent {
    pub timestamp: NaiveDateTime,
    pub kind: TideKind,
    pub height_ft: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesSample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindSample {
    pub timestamp: NaiveDateTime,
    pub speed_knots: f64,
    /// Compass direction, e.g. "WSW".
    pub direction: String,
}

/// A temperature series plus the station name NOAA attached to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Readings {
    pub samples: Vec<TimeSeriesSample>,
    pub station_name: Option<String>,
}

/// One resolved fetch, ready to be written into `FrameState`.
#[derive(Clone, Debug)]
pub enum FieldUpdate {
    Tides(Vec<TideEvent>),
    AirTemp(Readings),
    WaterTemp(Readings),
    Wind(Vec<WindSample>),
    /// Pre-scaled to the moon slot.
    Moon(RgbaImage),
    /// Pre-scaled to the full raster. Loaded once, not tied to a station.
    Background(RgbaImage),
}

impl FieldUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tides(_) => "tide",
            Self::AirTemp(_) => "air_temperature",
            Self::WaterTemp(_) => "water_temperature",
            Self::Wind(_) => "wind",
            Self::Moon(_) => "moon",
            Self::Background(_) => "background",
        }
    }

    /// Whether this update belongs to the tick that requested it.
    pub fn is_tick_scoped(&self) -> bool {
        !matches!(self, Self::Background(_))
    }
}

/// Outcome of offering an update to the frame state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Yes,
    /// The update was requested for an earlier tick and was dropped.
    Stale,
}

#[derive(Clone, Debug)]
pub struct FrameState {
    pub tick: u64,
    pub station: Station,
    pub tides: Option<Vec<TideEvent>>,
    pub air_temp: Option<Vec<TimeSeriesSample>>,
    pub water_temp: Option<Vec<TimeSeriesSample>>,
    pub wind: Option<Vec<WindSample>>,
    pub display_name: Option<String>,
    pub moon: Option<RgbaImage>,
    /// Calendar date the moon slot belongs to.
    pub moon_date: Option<NaiveDate>,
    pub background: Option<RgbaImage>,
}

impl FrameState {
    pub fn new(station: Station) -> Self {
        Self {
            tick: 0,
            station,
            tides: None,
            air_temp: None,
            water_temp: None,
            wind: None,
            display_name: None,
            moon: None,
            moon_date: None,
            background: None,
        }
    }

    /// Start a new tick for `station`, clearing all station-scoped data.
    /// The moon and background layers survive rotation.
    pub fn begin_tick(&mut self, station: Station) -> u64 {
        self.tick += 1;
        self.station = station;
        self.tides = None;
        self.air_temp = None;
        self.water_temp = None;
        self.wind = None;
        self.display_name = None;
        self.tick
    }

    /// Point the moon slot at `date`. An icon loaded for another date is
    /// dropped, so a failed load after midnight shows no moon rather than
    /// yesterday's phase.
    pub fn moon_for(&mut self, date: NaiveDate) {
        if self.moon_date != Some(date) {
            self.moon = None;
            self.moon_date = Some(date);
        }
    }

    /// Write `update`, requested during `tick`, into the matching field.
    ///
    /// Updates from an earlier tick are dropped unless `accept_stale` is set.
    /// The station name is first-writer-wins within a tick.
    pub fn apply(&mut self, tick: u64, update: FieldUpdate, accept_stale: bool) -> Applied {
        if update.is_tick_scoped() && tick != self.tick && !accept_stale {
            return Applied::Stale;
        }

        match update {
            FieldUpdate::Tides(events) => self.tides = Some(events),
            FieldUpdate::AirTemp(readings) => {
                self.claim_name(readings.station_name);
                self.air_temp = Some(readings.samples);
            }
            FieldUpdate::WaterTemp(readings) => {
                self.claim_name(readings.station_name);
                self.water_temp = Some(readings.samples);
            }
            FieldUpdate::Wind(samples) => self.wind = Some(samples),
            FieldUpdate::Moon(image) => self.moon = Some(image),
            FieldUpdate::Background(image) => self.background = Some(image),
        }
        Applied::Yes
    }

    fn claim_name(&mut self, name: Option<String>) {
        if self.display_name.is_none() {
            self.display_name = name.filter(|n| !n.trim().is_empty());
        }
    }

    /// Station title: the display name up to its first comma.
    pub fn title(&self) -> &str {
        match &self.display_name {
            Some(name) => name.split(',').next().unwrap_or(name).trim(),
            None => LOADING_TITLE,
        }
    }

    pub fn latest_water_temp(&self) -> Option<&TimeSeriesSample> {
        self.water_temp.as_deref().and_then(<[_]>::last)
    }

    pub fn latest_air_temp(&self) -> Option<&TimeSeriesSample> {
        self.air_temp.as_deref().and_then(<[_]>::last)
    }

    pub fn latest_wind(&self) -> Option<&WindSample> {
        self.wind.as_deref().and_then(<[_]>::last)
    }
}
