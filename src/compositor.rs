//! Frame compositor: turns a `FrameState` into pixels.
//!
//! Rendering is split in two. `layout` decides *what* text goes *where*
//! (tide-row selection, formatting, color rules, fallbacks) and is pure, so
//! it is what the tests poke at. `FrameCompositor::render` paints layers in
//! order: black fill, background, moon, then the laid-out text.
//!
//! Coordinates are for the 128×64 dual-panel frame. Text `y` is the
//! baseline.

use crate::frame::{FrameState, TideEvent, WindSample};
use crate::raster::{Raster, Translucent};
use crate::{Color, PanelConfig};
use chrono::{Duration, NaiveDateTime, Timelike};
use embedded_graphics::Drawable;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, iso_8859_1};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::Point;
use embedded_graphics::text::Text;

// ── Layout constants ─────────────────────────────────────────────────

/// Top-left corner and edge length of the moon icon.
pub const MOON_X: i32 = 90;
pub const MOON_Y: i32 = 12;
pub const MOON_SIZE: u32 = 38;

const TITLE_X: i32 = 2;
const TITLE_Y: i32 = 9;
const SHADOW_ALPHA: u8 = 160;
const TITLE_ALPHA: u8 = 220;

pub const MAX_TIDE_ROWS: usize = 4;
const ROW_HEIGHT: i32 = 10;
const LABEL_X: i32 = 2;
const TIME_X: i32 = 9;
pub const HEIGHT_X: i32 = 54;
/// Heights with an extra character (sign or tens digit) start here instead.
pub const HEIGHT_X_SHIFTED: i32 = 48;
const NO_TIDE_ROW: usize = 2;

/// How long a tide stays listed after it has passed.
pub const TIDE_GRACE_HOURS: i64 = 4;

const READOUT_Y: i32 = 62;
const WATER_X: i32 = 9;
const WIND_X: i32 = 45;
const AIR_X: i32 = 98;

pub const KNOTS_TO_MPH: f64 = 1.15078;

pub const MORNING_TIDE: Color = Color::new(0x7F, 0xD4, 0xFF);
pub const AFTERNOON_TIDE: Color = Color::new(0xFF, 0xFF, 0x00);
pub const READOUT: Color = Color::new(0xAC, 0xC1, 0x96);

// ── Layout ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Font {
    /// 4×6: tide kind labels, date/time fallback.
    Tiny,
    /// 5×8: tide times and heights, water temp, wind.
    Small,
    /// 6×10: title, air temperature.
    Medium,
}

impl Font {
    fn mono(self) -> &'static MonoFont<'static> {
        match self {
            Font::Tiny => &iso_8859_1::FONT_4X6,
            Font::Small => &iso_8859_1::FONT_5X8,
            Font::Medium => &iso_8859_1::FONT_6X10,
        }
    }
}

/// One piece of text placed on the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub font: Font,
    pub color: Color,
    pub alpha: u8,
}

impl TextItem {
    fn opaque(text: String, x: i32, y: i32, font: Font, color: Color) -> Self {
        Self {
            text,
            x,
            y,
            font,
            color,
            alpha: 255,
        }
    }
}

/// Tides still worth showing at `now`: at most four, in input order,
/// skipping any more than the grace window in the past.
pub fn select_tides(events: &[TideEvent], now: NaiveDateTime) -> Vec<&TideEvent> {
    let grace = Duration::hours(TIDE_GRACE_HOURS);
    events
        .iter()
        .filter(|e| e.timestamp + grace >= now)
        .take(MAX_TIDE_ROWS)
        .collect()
}

/// 12-hour clock value: 0 → 12, 13 → 1.
fn hour12(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        h => h,
    }
}

/// `HH:MMa` / `HH:MMp`; the 12 o'clock hour counts as morning, like its color.
pub fn format_tide_time(t: NaiveDateTime) -> String {
    let suffix = if t.hour() <= 12 { 'a' } else { 'p' };
    format!("{:02}:{:02}{suffix}", hour12(t.hour()), t.minute())
}

pub fn format_height(feet: f64) -> String {
    format!("{feet:.2}ft")
}

/// Left edge for a height so its right edge stays put.
pub fn height_x(feet: f64) -> i32 {
    if feet < 0.0 || feet >= 10.0 {
        HEIGHT_X_SHIFTED
    } else {
        HEIGHT_X
    }
}

pub fn tide_color(t: NaiveDateTime) -> Color {
    if t.hour() <= 12 {
        MORNING_TIDE
    } else {
        AFTERNOON_TIDE
    }
}

pub fn knots_to_mph(knots: f64) -> i64 {
    (knots * KNOTS_TO_MPH).round() as i64
}

pub fn format_wind(sample: &WindSample) -> String {
    let mph = knots_to_mph(sample.speed_knots);
    if sample.direction.is_empty() {
        format!("{mph}mph")
    } else {
        format!("{} {mph}mph", sample.direction)
    }
}

pub fn format_water_temp(fahrenheit: f64) -> String {
    format!("{}°", fahrenheit.round() as i64)
}

pub fn format_air_temp(fahrenheit: f64) -> String {
    format!("{fahrenheit:.1}°")
}

/// `MM/DD HH:MM`, 12-hour clock.
pub fn format_clock(now: NaiveDateTime) -> String {
    format!(
        "{} {:02}:{:02}",
        now.format("%m/%d"),
        hour12(now.hour()),
        now.minute()
    )
}

fn row_baseline(row: usize) -> i32 {
    (row as i32 + 1) * ROW_HEIGHT + 10
}

/// Every text item for `state` at `now`, in paint order.
pub fn layout(state: &FrameState, now: NaiveDateTime) -> Vec<TextItem> {
    let mut items = Vec::new();

    let title = state.title().to_string();
    items.push(TextItem {
        text: title.clone(),
        x: TITLE_X + 1,
        y: TITLE_Y + 1,
        font: Font::Medium,
        color: Color::BLACK,
        alpha: SHADOW_ALPHA,
    });
    items.push(TextItem {
        text: title,
        x: TITLE_X,
        y: TITLE_Y,
        font: Font::Medium,
        color: Color::WHITE,
        alpha: TITLE_ALPHA,
    });

    match state.tides.as_deref() {
        None | Some([]) => items.push(TextItem::opaque(
            "No tide data".to_string(),
            LABEL_X,
            row_baseline(NO_TIDE_ROW),
            Font::Small,
            READOUT,
        )),
        Some(events) => {
            for (row, event) in select_tides(events, now).into_iter().enumerate() {
                let color = tide_color(event.timestamp);
                let baseline = row_baseline(row);
                items.push(TextItem::opaque(
                    event.kind.label().to_string(),
                    LABEL_X,
                    baseline - 1,
                    Font::Tiny,
                    color,
                ));
                items.push(TextItem::opaque(
                    format_tide_time(event.timestamp),
                    TIME_X,
                    baseline,
                    Font::Small,
                    color,
                ));
                items.push(TextItem::opaque(
                    format_height(event.height_ft),
                    height_x(event.height_ft),
                    baseline,
                    Font::Small,
                    color,
                ));
            }
        }
    }

    if let Some(water) = state.latest_water_temp() {
        items.push(TextItem::opaque(
            format_water_temp(water.value),
            WATER_X,
            READOUT_Y,
            Font::Small,
            READOUT,
        ));
    }

    match state.latest_wind() {
        Some(wind) => items.push(TextItem::opaque(
            format_wind(wind),
            WIND_X,
            READOUT_Y,
            Font::Small,
            READOUT,
        )),
        None => items.push(TextItem::opaque(
            format_clock(now),
            WIND_X,
            READOUT_Y,
            Font::Tiny,
            READOUT,
        )),
    }

    if let Some(air) = state.latest_air_temp() {
        items.push(TextItem::opaque(
            format_air_temp(air.value),
            AIR_X,
            READOUT_Y,
            Font::Medium,
            READOUT,
        ));
    }

    items
}

// ── Painting ─────────────────────────────────────────────────────────

/// Owns the raster and paints frames into it.
pub struct FrameCompositor {
    raster: Raster,
}

impl FrameCompositor {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            raster: Raster::new(panel.frame_width(), panel.frame_height()),
        }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Paint a full frame. Any absent field just skips its layer.
    pub fn render(&mut self, state: &FrameState, now: NaiveDateTime) -> &Raster {
        self.raster.fill(Color::BLACK);

        if let Some(background) = &state.background {
            self.raster.draw_image(background, 0, 0);
        }
        if let Some(moon) = &state.moon {
            self.raster.draw_image(moon, MOON_X, MOON_Y);
        }

        for item in layout(state, now) {
            draw_text(&mut self.raster, &item);
        }

        &self.raster
    }
}

fn draw_text(raster: &mut Raster, item: &TextItem) {
    let style = MonoTextStyle::new(
        item.font.mono(),
        Rgb888::new(item.color.r, item.color.g, item.color.b),
    );
    let text = Text::new(&item.text, Point::new(item.x, item.y), style);
    if item.alpha == 255 {
        text.draw(raster).ok();
    } else {
        text.draw(&mut Translucent::new(raster, item.alpha)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FieldUpdate, Readings, TideKind, TimeSeriesSample};
    use crate::station::Station;
    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 16)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tide(h: u32, m: u32, kind: TideKind, height_ft: f64) -> TideEvent {
        TideEvent {
            timestamp: at(h, m),
            kind,
            height_ft,
        }
    }

    fn empty_state() -> FrameState {
        let station = Station {
            id: 9410230,
            rotation_index: 0,
        };
        let mut state = FrameState::new(station);
        state.begin_tick(station);
        state
    }

    fn texts(items: &[TextItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    fn find<'a>(items: &'a [TextItem], text: &str) -> &'a TextItem {
        items
            .iter()
            .find(|i| i.text == text)
            .unwrap_or_else(|| panic!("no item {text:?} in {:?}", texts(items)))
    }

    // ── Tide selection ─────────────────────────────────────────────

    #[test]
    fn selects_at_most_four_in_order() {
        let events: Vec<_> = (0..7)
            .map(|i| tide(6 + i * 2, 0, TideKind::High, 1.0))
            .collect();
        let selected = select_tides(&events, at(5, 0));
        assert_eq!(selected.len(), 4);
        let hours: Vec<u32> = selected.iter().map(|e| e.timestamp.hour()).collect();
        assert_eq!(hours, vec![6, 8, 10, 12]);
    }

    #[test]
    fn skips_tides_older_than_grace_window() {
        let events = vec![
            tide(1, 0, TideKind::Low, 0.5),
            tide(6, 0, TideKind::High, 4.0),
            tide(12, 0, TideKind::Low, 1.0),
        ];
        // 10:00 now: 01:00 is 9h old, 06:00 is exactly 4h old.
        let selected = select_tides(&events, at(10, 0));
        assert_eq!(selected, vec![&events[1], &events[2]]);
    }

    #[test]
    fn tide_one_minute_past_grace_is_dropped() {
        let events = vec![tide(6, 0, TideKind::High, 4.0)];
        assert!(select_tides(&events, at(10, 1)).is_empty());
    }

    // ── Formatting ─────────────────────────────────────────────────

    #[rstest]
    #[case(-3.456, "-3.46ft", HEIGHT_X_SHIFTED)]
    #[case(3.456, "3.46ft", HEIGHT_X)]
    #[case(10.2, "10.20ft", HEIGHT_X_SHIFTED)]
    #[case(9.99, "9.99ft", HEIGHT_X)]
    #[case(0.0, "0.00ft", HEIGHT_X)]
    fn height_text_and_slot(#[case] feet: f64, #[case] text: &str, #[case] x: i32) {
        assert_eq!(format_height(feet), text);
        assert_eq!(height_x(feet), x);
    }

    #[rstest]
    #[case(0, 5, "12:05a")]
    #[case(9, 30, "09:30a")]
    #[case(12, 0, "12:00a")]
    #[case(12, 30, "12:30a")]
    #[case(13, 7, "01:07p")]
    #[case(23, 59, "11:59p")]
    fn tide_time_format(#[case] h: u32, #[case] m: u32, #[case] expected: &str) {
        assert_eq!(format_tide_time(at(h, m)), expected);
    }

    #[rstest]
    #[case(10.0, 12)]
    #[case(0.0, 0)]
    #[case(3.2, 4)]
    fn wind_knots_to_mph(#[case] knots: f64, #[case] mph: i64) {
        assert_eq!(knots_to_mph(knots), mph);
    }

    #[test]
    fn readout_formats() {
        assert_eq!(format_water_temp(64.6), "65°");
        assert_eq!(format_air_temp(71.34), "71.3°");
        assert_eq!(format_air_temp(70.0), "70.0°");
        assert_eq!(format_clock(at(0, 7)), "06/16 12:07");
        assert_eq!(format_clock(at(15, 30)), "06/16 03:30");
    }

    #[rstest]
    #[case(0, MORNING_TIDE)]
    #[case(12, MORNING_TIDE)]
    #[case(13, AFTERNOON_TIDE)]
    fn tide_color_splits_after_noon_hour(#[case] h: u32, #[case] expected: Color) {
        assert_eq!(tide_color(at(h, 30)), expected);
    }

    // ── Layout ─────────────────────────────────────────────────────

    #[test]
    fn empty_state_shows_placeholders() {
        let items = layout(&empty_state(), at(14, 5));
        assert_eq!(
            texts(&items),
            vec!["Loading...", "Loading...", "No tide data", "06/16 02:05"]
        );
    }

    #[test]
    fn title_is_drawn_shadow_first() {
        let mut state = empty_state();
        let tick = state.tick;
        state.apply(
            tick,
            FieldUpdate::AirTemp(Readings {
                samples: vec![],
                station_name: Some("La Jolla, Scripps Pier, CA".into()),
            }),
            false,
        );

        let items = layout(&state, at(9, 0));

        assert_eq!(items[0].text, "La Jolla");
        assert_eq!(items[0].color, Color::BLACK);
        assert_eq!((items[0].x, items[0].y), (TITLE_X + 1, TITLE_Y + 1));
        assert_eq!(items[1].text, "La Jolla");
        assert_eq!(items[1].color, Color::WHITE);
        assert!(items[0].alpha < 255 && items[1].alpha < 255);
    }

    #[test]
    fn tide_rows_stack_and_pick_colors() {
        let mut state = empty_state();
        state.tides = Some(vec![
            tide(3, 12, TideKind::Low, -0.41),
            tide(9, 40, TideKind::High, 4.8),
            tide(15, 5, TideKind::Low, 1.25),
        ]);

        let items = layout(&state, at(8, 0));

        let first = find(&items, "03:12a");
        let second = find(&items, "09:40a");
        let third = find(&items, "03:05p");
        assert_eq!(second.y - first.y, ROW_HEIGHT);
        assert_eq!(third.y - second.y, ROW_HEIGHT);
        assert_eq!(first.color, MORNING_TIDE);
        assert_eq!(third.color, AFTERNOON_TIDE);
        assert_eq!(find(&items, "-0.41ft").x, HEIGHT_X_SHIFTED);
        assert_eq!(find(&items, "4.80ft").x, HEIGHT_X);
        assert!(!texts(&items).contains(&"No tide data"));
    }

    #[test]
    fn empty_tide_list_shows_placeholder() {
        let mut state = empty_state();
        state.tides = Some(vec![]);
        let items = layout(&state, at(8, 0));
        let placeholder = find(&items, "No tide data");
        assert_eq!(placeholder.y, row_baseline(NO_TIDE_ROW));
    }

    #[test]
    fn tides_all_past_grace_draw_nothing() {
        let mut state = empty_state();
        state.tides = Some(vec![tide(3, 12, TideKind::Low, -0.41)]);
        let items = layout(&state, at(20, 0));
        assert!(!texts(&items).contains(&"No tide data"));
        assert!(!texts(&items).contains(&"03:12a"));
    }

    #[test]
    fn wind_replaces_clock_fallback() {
        let mut state = empty_state();
        state.wind = Some(vec![WindSample {
            timestamp: at(8, 0),
            speed_knots: 10.0,
            direction: "WSW".into(),
        }]);
        state.water_temp = Some(vec![TimeSeriesSample {
            timestamp: at(8, 0),
            value: 63.7,
        }]);
        state.air_temp = Some(vec![TimeSeriesSample {
            timestamp: at(8, 0),
            value: 71.4,
        }]);

        let items = layout(&state, at(8, 30));

        assert_eq!(find(&items, "WSW 12mph").x, WIND_X);
        assert_eq!(find(&items, "64°").x, WATER_X);
        assert_eq!(find(&items, "71.4°").x, AIR_X);
        assert!(!texts(&items).contains(&"06/16 08:30"));
    }

    // ── Painting ───────────────────────────────────────────────────

    #[test]
    fn render_with_nothing_loaded_is_full_size() {
        let panel = PanelConfig::default();
        let mut compositor = FrameCompositor::new(panel);
        let raster = compositor.render(&empty_state(), at(12, 0));
        assert_eq!(raster.width(), 128);
        assert_eq!(raster.height(), 64);
        // Placeholder text lit something.
        assert!(raster.as_raw().chunks_exact(4).any(|p| p[..3] != [0, 0, 0]));
    }

    #[test]
    fn render_is_idempotent() {
        let mut state = empty_state();
        state.tides = Some(vec![tide(9, 40, TideKind::High, 4.8)]);
        state.moon = Some(RgbaImage::from_pixel(MOON_SIZE, MOON_SIZE, Rgba([200, 200, 180, 255])));

        let mut compositor = FrameCompositor::new(PanelConfig::default());
        let first = compositor.render(&state, at(8, 0)).clone();
        let second = compositor.render(&state, at(8, 0)).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn render_draws_background_then_moon() {
        let mut state = empty_state();
        state.background = Some(RgbaImage::from_pixel(128, 64, Rgba([0, 0, 80, 255])));
        state.moon = Some(RgbaImage::from_pixel(MOON_SIZE, MOON_SIZE, Rgba([250, 250, 250, 255])));

        let mut compositor = FrameCompositor::new(PanelConfig::default());
        let raster = compositor.render(&state, at(8, 0));

        assert_eq!(raster.pixel(127, 0), Color::new(0, 0, 80));
        assert_eq!(
            raster.pixel((MOON_X + 19) as u32, (MOON_Y + 19) as u32),
            Color::new(250, 250, 250)
        );
    }

    #[test]
    fn render_clears_previous_frame() {
        let mut state = empty_state();
        state.background = Some(RgbaImage::from_pixel(128, 64, Rgba([90, 0, 0, 255])));
        let mut compositor = FrameCompositor::new(PanelConfig::default());
        compositor.render(&state, at(8, 0));

        state.background = None;
        let raster = compositor.render(&state, at(8, 0));
        assert_eq!(raster.pixel(127, 0), Color::BLACK);
    }
}
