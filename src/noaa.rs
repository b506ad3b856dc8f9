//! NOAA CO-OPS data retrieval: request URLs, the HTTP client, and response
//! decoding into frame updates.
//!
//! All four products come from the same `datagetter` endpoint and share the
//! same envelope: a `predictions` (tides) or `data` array of records plus,
//! for observations, a `metadata` object naming the station. Values arrive as
//! strings; an empty string marks a sensor gap and the record is skipped.

use crate::frame::{FieldUpdate, Readings, TideEvent, TideKind, TimeSeriesSample, WindSample};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const MAX_LOGGED_BODY: usize = 512;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Network, DNS, TLS or timeout failure.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    /// The body parsed but did not carry what the product needs.
    #[error("malformed {product} response: {reason}")]
    Malformed {
        product: &'static str,
        reason: String,
        body: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Product {
    Tide,
    AirTemperature,
    WaterTemperature,
    Wind,
}

impl Product {
    /// Dispatch order within a tick.
    pub const ALL: [Product; 4] = [
        Product::Tide,
        Product::AirTemperature,
        Product::WaterTemperature,
        Product::Wind,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Tide => "predictions",
            Self::AirTemperature => "air_temperature",
            Self::WaterTemperature => "water_temperature",
            Self::Wind => "wind",
        }
    }

    fn application(self) -> &'static str {
        match self {
            Self::Tide => "NOS.COOPS.TAC.WL",
            Self::AirTemperature | Self::Wind => "NOS.COOPS.TAC.MET",
            Self::WaterTemperature => "NOS.COOPS.TAC.PHYSOCEAN",
        }
    }

    fn extra_params(self) -> &'static str {
        match self {
            Self::Tide => "datum=MLLW&interval=hilo",
            _ => "interval=h",
        }
    }

    fn records_key(self) -> &'static str {
        match self {
            Self::Tide => "predictions",
            _ => "data",
        }
    }
}

/// `YYYYMMDD` for today and tomorrow.
pub fn date_range(today: NaiveDate) -> (String, String) {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    (
        today.format("%Y%m%d").to_string(),
        tomorrow.format("%Y%m%d").to_string(),
    )
}

pub fn product_url(base_url: &str, product: Product, station_id: u32, today: NaiveDate) -> String {
    let (begin, end) = date_range(today);
    format!(
        "{base_url}?product={}&application={}&begin_date={begin}&end_date={end}&station={station_id}&{}&time_zone=lst_ldt&units=english&format=json",
        product.name(),
        product.application(),
        product.extra_params(),
    )
}

// ── Fetching ─────────────────────────────────────────────────────────

/// Retrieves a URL's body as text.
///
/// The production implementation is `NoaaClient`; tests substitute canned
/// responses.
pub trait Fetcher: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

#[derive(Clone)]
pub struct NoaaClient {
    http: reqwest::Client,
}

impl NoaaClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tide-panel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl Fetcher for NoaaClient {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Fetch and decode one product for one station.
pub async fn fetch_product<F: Fetcher>(
    fetcher: &F,
    base_url: &str,
    product: Product,
    station_id: u32,
    today: NaiveDate,
) -> Result<FieldUpdate, FetchError> {
    let url = product_url(base_url, product, station_id, today);
    tracing::debug!(station = station_id, product = product.name(), %url, "Requesting");
    let body = fetcher.get(&url).await?;
    decode(product, &body)
}

// ── Decoding ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawPrediction {
    t: String,
    v: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct RawReading {
    t: String,
    v: String,
}

#[derive(Deserialize)]
struct RawWind {
    t: String,
    s: String,
    #[serde(default)]
    dr: String,
}

#[derive(Deserialize)]
struct RawMetadata {
    name: String,
}

/// Decode a response body for `product`.
pub fn decode(product: Product, body: &str) -> Result<FieldUpdate, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        product: product.name(),
        reason,
        body: truncate_body(body),
    };

    let root: Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    if let Some(error) = root.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified error");
        return Err(malformed(format!("service error: {message}")));
    }

    let key = product.records_key();
    let records = root
        .get(key)
        .cloned()
        .ok_or_else(|| malformed(format!("missing `{key}`")))?;

    let station_name = root
        .get("metadata")
        .cloned()
        .and_then(|m| serde_json::from_value::<RawMetadata>(m).ok())
        .map(|m| m.name);

    let update = match product {
        Product::Tide => {
            let raw: Vec<RawPrediction> = serde_json::from_value(records)
                .map_err(|e| malformed(format!("bad `{key}` records: {e}")))?;
            FieldUpdate::Tides(raw.iter().filter_map(tide_event).collect())
        }
        Product::AirTemperature | Product::WaterTemperature => {
            let raw: Vec<RawReading> = serde_json::from_value(records)
                .map_err(|e| malformed(format!("bad `{key}` records: {e}")))?;
            let readings = Readings {
                samples: raw.iter().filter_map(reading).collect(),
                station_name,
            };
            if product == Product::AirTemperature {
                FieldUpdate::AirTemp(readings)
            } else {
                FieldUpdate::WaterTemp(readings)
            }
        }
        Product::Wind => {
            let raw: Vec<RawWind> = serde_json::from_value(records)
                .map_err(|e| malformed(format!("bad `{key}` records: {e}")))?;
            FieldUpdate::Wind(raw.iter().filter_map(wind_sample).collect())
        }
    };
    Ok(update)
}

fn parse_timestamp(t: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(t.trim(), TIMESTAMP_FORMAT).ok()
}

fn parse_value(v: &str) -> Option<f64> {
    v.trim().parse().ok()
}

fn tide_event(raw: &RawPrediction) -> Option<TideEvent> {
    Some(TideEvent {
        timestamp: parse_timestamp(&raw.t)?,
        kind: TideKind::from_noaa(&raw.kind)?,
        height_ft: parse_value(&raw.v)?,
    })
}

fn reading(raw: &RawReading) -> Option<TimeSeriesSample> {
    Some(TimeSeriesSample {
        timestamp: parse_timestamp(&raw.t)?,
        value: parse_value(&raw.v)?,
    })
}

fn wind_sample(raw: &RawWind) -> Option<WindSample> {
    Some(WindSample {
        timestamp: parse_timestamp(&raw.t)?,
        speed_knots: parse_value(&raw.s)?,
        direction: raw.dr.trim().to_string(),
    })
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(day(2024, 6, 5), "20240605", "20240606")]
    #[case(day(2024, 6, 30), "20240630", "20240701")]
    #[case(day(2024, 12, 31), "20241231", "20250101")]
    #[case(day(2024, 2, 28), "20240228", "20240229")]
    fn date_range_is_zero_padded_and_rolls_over(
        #[case] today: NaiveDate,
        #[case] begin: &str,
        #[case] end: &str,
    ) {
        assert_eq!(date_range(today), (begin.to_string(), end.to_string()));
    }

    #[test]
    fn tide_url_requests_hilo_predictions_for_station() {
        let url = product_url("https://example.test/dg", Product::Tide, 9410230, day(2024, 1, 9));
        assert_eq!(
            url,
            "https://example.test/dg?product=predictions&application=NOS.COOPS.TAC.WL\
             &begin_date=20240109&end_date=20240110&station=9410230&datum=MLLW&interval=hilo\
             &time_zone=lst_ldt&units=english&format=json"
        );
    }

    #[rstest]
    #[case(Product::AirTemperature, "product=air_temperature", "NOS.COOPS.TAC.MET")]
    #[case(Product::WaterTemperature, "product=water_temperature", "NOS.COOPS.TAC.PHYSOCEAN")]
    #[case(Product::Wind, "product=wind", "NOS.COOPS.TAC.MET")]
    fn observation_urls_use_hourly_interval(
        #[case] product: Product,
        #[case] product_param: &str,
        #[case] application: &str,
    ) {
        let url = product_url("https://example.test/dg", product, 1, day(2024, 1, 9));
        assert!(url.contains(product_param));
        assert!(url.contains(application));
        assert!(url.contains("interval=h&"));
        assert!(!url.contains("datum="));
    }

    #[test]
    fn decodes_tide_predictions() {
        let body = r#"{"predictions":[
            {"t":"2024-06-16 03:12","v":"-0.412","type":"L"},
            {"t":"2024-06-16 09:40","v":"4.801","type":"H"},
            {"t":"garbage","v":"1.0","type":"H"}
        ]}"#;

        let FieldUpdate::Tides(events) = decode(Product::Tide, body).unwrap() else {
            panic!("expected tides");
        };

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TideKind::Low);
        assert_eq!(events[0].height_ft, -0.412);
        assert_eq!(events[1].timestamp, day(2024, 6, 16).and_hms_opt(9, 40, 0).unwrap());
    }

    #[test]
    fn decodes_temperature_with_station_name() {
        let body = r#"{"metadata":{"id":"9410230","name":"La Jolla, CA","lat":"32.8","lon":"-117.2"},
            "data":[{"t":"2024-06-16 10:00","v":"64.2","f":"0,0,0"},
                    {"t":"2024-06-16 11:00","v":"","f":"1,0,0"}]}"#;

        let FieldUpdate::WaterTemp(readings) = decode(Product::WaterTemperature, body).unwrap()
        else {
            panic!("expected water temperature");
        };

        assert_eq!(readings.station_name.as_deref(), Some("La Jolla, CA"));
        assert_eq!(readings.samples.len(), 1);
        assert_eq!(readings.samples[0].value, 64.2);
    }

    #[test]
    fn decodes_wind() {
        let body = r#"{"metadata":{"name":"La Jolla"},
            "data":[{"t":"2024-06-16 10:00","s":"10.00","d":"250.00","dr":"WSW","g":"12.0","f":"0,0"}]}"#;

        let FieldUpdate::Wind(samples) = decode(Product::Wind, body).unwrap() else {
            panic!("expected wind");
        };

        assert_eq!(samples[0].speed_knots, 10.0);
        assert_eq!(samples[0].direction, "WSW");
    }

    #[test]
    fn missing_records_key_is_malformed() {
        let err = decode(Product::Tide, r#"{"data":[]}"#).unwrap_err();
        match err {
            FetchError::Malformed { product, reason, body } => {
                assert_eq!(product, "predictions");
                assert!(reason.contains("predictions"));
                assert_eq!(body, r#"{"data":[]}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn service_error_is_malformed() {
        let body = r#"{"error":{"message":"No data was found."}}"#;
        let err = decode(Product::Wind, body).unwrap_err();
        assert!(err.to_string().contains("No data was found."));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            decode(Product::AirTemperature, "<html>oops</html>"),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn long_bodies_are_truncated_for_logging() {
        let body = "x".repeat(2000);
        let truncated = truncate_body(&body);
        assert!(truncated.len() < 600);
        assert!(truncated.ends_with('…'));
    }
}
