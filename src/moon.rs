//! Moon phase lookup: calendar date → one of eight phase images.
//!
//! Low-precision synodic-month phase (Schaefer, Sky & Telescope 1985).
//! Accurate to about a day, which is all a 38px icon needs.

use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

const SYNODIC_MONTH_DAYS: f64 = 29.530_588_2;

/// Phase index 0-7: 0 = new, 2 = first quarter, 4 = full, 6 = last quarter.
pub fn phase_index(year: i32, month: u32, day: u32) -> u8 {
    // Treat Jan/Feb as months 13/14 of the previous year.
    let (mut y, mut m) = (year, month as i32);
    if m < 3 {
        y -= 1;
        m += 12;
    }
    m += 1;

    // Days since the 1900-01-00 new-moon epoch, noon UT.
    let days = (365.25 * y as f64).floor() + (30.6 * m as f64).floor() + day as f64 + 0.5
        - 694_039.09;

    let cycles = days / SYNODIC_MONTH_DAYS;
    let fraction = cycles - cycles.floor();
    ((fraction * 8.0 + 0.5).floor() as u8) & 7
}

/// Image path for the phase on `year-month-day`, inside `dir`.
pub fn moon_image_for(dir: &Path, year: i32, month: u32, day: u32) -> PathBuf {
    dir.join(format!("phase_{}.png", phase_index(year, month, day)))
}

pub fn moon_image_for_date(dir: &Path, date: NaiveDate) -> PathBuf {
    moon_image_for(dir, date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // Dates of known phases (UTC).
    #[rstest]
    #[case(2024, 1, 11, 0)] // new moon
    #[case(2024, 1, 25, 4)] // full moon
    #[case(2024, 4, 8, 0)] // new moon (eclipse)
    #[case(2024, 4, 23, 4)] // full moon
    #[case(2024, 1, 18, 2)] // first quarter
    #[case(2024, 2, 2, 6)] // last quarter
    fn known_phases(#[case] y: i32, #[case] m: u32, #[case] d: u32, #[case] expected: u8) {
        assert_eq!(phase_index(y, m, d), expected);
    }

    #[test]
    fn index_is_always_in_range() {
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for _ in 0..800 {
            let idx = phase_index(date.year(), date.month(), date.day());
            assert!(idx < 8);
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn image_path_names_the_phase() {
        let path = moon_image_for(Path::new("assets/moon"), 2024, 1, 25);
        assert_eq!(path, PathBuf::from("assets/moon/phase_4.png"));
    }
}
