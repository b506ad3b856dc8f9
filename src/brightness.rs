//! Brightness by time of day: bright inside the awake window, dim outside.

use crate::config::BrightnessConfig;
use chrono::{NaiveDateTime, Timelike};

#[derive(Clone, Copy, Debug)]
pub struct BrightnessScheduler {
    config: BrightnessConfig,
}

impl BrightnessScheduler {
    pub fn new(config: BrightnessConfig) -> Self {
        Self { config }
    }

    /// Whether `hour` lies in `[awake_start_hour, awake_end_hour)`.
    /// A window whose start is after its end wraps past midnight.
    pub fn is_awake(&self, hour: u32) -> bool {
        let (start, end) = (self.config.awake_start_hour, self.config.awake_end_hour);
        if start <= end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }

    pub fn brightness_for(&self, now: NaiveDateTime) -> u8 {
        if self.is_awake(now.hour()) {
            self.config.bright
        } else {
            self.config.dim
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at_hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 16)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn scheduler(start: u32, end: u32) -> BrightnessScheduler {
        BrightnessScheduler::new(BrightnessConfig {
            bright: 90,
            dim: 10,
            awake_start_hour: start,
            awake_end_hour: end,
        })
    }

    #[rstest]
    #[case(6, 10)]
    #[case(7, 90)] // start is inclusive
    #[case(15, 90)]
    #[case(21, 90)]
    #[case(22, 10)] // end is exclusive
    #[case(0, 10)]
    fn daytime_window(#[case] hour: u32, #[case] expected: u8) {
        assert_eq!(scheduler(7, 22).brightness_for(at_hour(hour)), expected);
    }

    #[rstest]
    #[case(20, 90)]
    #[case(23, 90)]
    #[case(3, 90)]
    #[case(6, 10)]
    #[case(12, 10)]
    fn window_wrapping_midnight(#[case] hour: u32, #[case] expected: u8) {
        assert_eq!(scheduler(20, 6).brightness_for(at_hour(hour)), expected);
    }

    #[test]
    fn empty_window_is_always_dim() {
        let s = scheduler(8, 8);
        assert!((0..24).all(|h| !s.is_awake(h)));
    }
}
