//! Data fetch orchestration: one tick's worth of requests.
//!
//! Each tick fires four independent NOAA requests plus the moon-phase image
//! load. Every task reports back over an unbounded channel tagged with the
//! tick that issued it; the main loop applies results to `FrameState` and
//! decides whether a late result is still wanted. Failures are logged here
//! and never reach the channel, so a failed field simply stays absent.

use crate::assets::load_scaled_async;
use crate::compositor::MOON_SIZE;
use crate::frame::{FieldUpdate, FrameState};
use crate::moon::moon_image_for_date;
use crate::noaa::{FetchError, Fetcher, Product, fetch_product};
use crate::station::{Station, StationRegistry};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// A successful fetch, tagged with the tick that requested it.
#[derive(Debug)]
pub struct FetchOutcome {
    pub tick: u64,
    pub update: FieldUpdate,
}

pub struct DataFetchOrchestrator<F: Fetcher> {
    fetcher: Arc<F>,
    base_url: Arc<str>,
    moon_dir: PathBuf,
    tx: UnboundedSender<FetchOutcome>,
}

impl<F: Fetcher> DataFetchOrchestrator<F> {
    pub fn new(
        fetcher: Arc<F>,
        base_url: &str,
        moon_dir: PathBuf,
        tx: UnboundedSender<FetchOutcome>,
    ) -> Self {
        Self {
            fetcher,
            base_url: Arc::from(base_url),
            moon_dir,
            tx,
        }
    }

    /// Rotation tick: move to the next station and fetch for it.
    pub fn rotate(
        &self,
        registry: &mut StationRegistry,
        state: &mut FrameState,
        today: NaiveDate,
    ) -> Station {
        let station = registry.advance();
        self.dispatch(state, station, today);
        station
    }

    /// Reset `state` for `station` and issue every request for it.
    ///
    /// Returns the new tick id. Must be called from within a tokio runtime.
    pub fn dispatch(&self, state: &mut FrameState, station: Station, today: NaiveDate) -> u64 {
        let tick = state.begin_tick(station);
        state.moon_for(today);
        tracing::info!(
            station = station.id,
            tick,
            index = station.rotation_index,
            "Fetching station data"
        );

        for product in Product::ALL {
            let fetcher = Arc::clone(&self.fetcher);
            let base_url = Arc::clone(&self.base_url);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                match fetch_product(fetcher.as_ref(), &base_url, product, station.id, today).await {
                    Ok(update) => {
                        // The receiver only goes away on shutdown.
                        let _ = tx.send(FetchOutcome { tick, update });
                    }
                    Err(e) => log_fetch_failure(station.id, tick, product, &e),
                }
            });
        }

        let path = moon_image_for_date(&self.moon_dir, today);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match load_scaled_async(path, MOON_SIZE, MOON_SIZE).await {
                Ok(image) => {
                    let _ = tx.send(FetchOutcome {
                        tick,
                        update: FieldUpdate::Moon(image),
                    });
                }
                Err(e) => tracing::warn!(tick, "Moon image unavailable: {}", e),
            }
        });

        tick
    }
}

fn log_fetch_failure(station: u32, tick: u64, product: Product, error: &FetchError) {
    match error {
        FetchError::Malformed { reason, body, .. } => tracing::warn!(
            station,
            tick,
            product = product.name(),
            %body,
            "Malformed response: {}",
            reason
        ),
        _ => tracing::warn!(
            station,
            tick,
            product = product.name(),
            "Fetch failed: {}",
            error
        ),
    }
}
