//! Normalization of free-text opening-hours descriptions.
//!
//! Place records frequently carry schedules buried in prose, e.g.
//! `"Mo-Fr 08:00-20:00; charge applies 20:00-08:00"`. This module extracts
//! every `HH:MM-HH:MM` range and renders either a literal `24/7` when the
//! ranges amount to round-the-clock operation, or the ranges rejoined in
//! extraction order. Best effort over free text, not a calendar engine.

use std::sync::LazyLock;

use regex::Regex;

const TWENTY_FOUR_SEVEN: &str = "24/7";
const RANGE_SEPARATOR: &str = "; ";
const RANGE_DELIMITER: &str = "-";

/// Range strings that on their own mean the facility never closes.
const FULL_DAY_RANGES: [&str; 5] = [
    "00:00-24:00",
    "00:00-23:59",
    "24:00-24:00",
    "0:00-24:00",
    "0:00-23:59",
];

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2}:[0-9]{2})\s*-\s*([0-9]{1,2}:[0-9]{2})").expect("valid time range regex")
});

/// Extracts time ranges from `text` and renders them as a display string.
///
/// Returns the empty string when no range is present, `"24/7"` when the
/// ranges imply round-the-clock operation, and otherwise the ranges joined
/// with `"; "` in the order they appear (duplicates kept).
pub fn normalize_opening_hours(text: &str) -> String {
    let ranges: Vec<String> = TIME_RANGE
        .captures_iter(text)
        .map(|caps| format!("{}{RANGE_DELIMITER}{}", &caps[1], &caps[2]))
        .collect();

    if ranges.is_empty() {
        return String::new();
    }

    if covers_full_day(&ranges) {
        TWENTY_FOUR_SEVEN.to_string()
    } else {
        ranges.join(RANGE_SEPARATOR)
    }
}

/// Minutes past midnight for an `H:MM` token. Unparseable components count
/// as zero rather than failing.
fn minutes_of(time: &str) -> u32 {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 2 {
        return 0;
    }
    let hours: u32 = parts[0].trim().parse().unwrap_or(0);
    let minutes: u32 = parts[1].trim().parse().unwrap_or(0);
    hours * 60 + minutes
}

/// An overnight range ends earlier in the day than it starts (e.g.
/// `22:00-06:00`). `None` when the string is not a two-sided range.
fn is_overnight(range: &str) -> Option<bool> {
    let parts: Vec<&str> = range.split(RANGE_DELIMITER).collect();
    if parts.len() != 2 {
        return None;
    }
    Some(minutes_of(parts[1].trim()) < minutes_of(parts[0].trim()))
}

fn covers_full_day(ranges: &[String]) -> bool {
    if ranges.iter().any(|r| FULL_DAY_RANGES.contains(&r.as_str())) {
        return true;
    }

    if ranges.len() >= 2 {
        // A night-spanning range next to a day-spanning one implies the two
        // cover the clock between them.
        let has_overnight = ranges.iter().any(|r| is_overnight(r) == Some(true));
        let has_daytime = ranges.iter().any(|r| is_overnight(r) == Some(false));
        if has_overnight && has_daytime {
            return true;
        }

        // Bounds are compared on the sorted strings, not as numeric
        // intervals; the gaps between inner ranges are not checked.
        let mut sorted = ranges.to_vec();
        sorted.sort();
        let starts_at_midnight = sorted
            .first()
            .is_some_and(|r| r.starts_with("00:00") || r.starts_with("0:00"));
        let ends_at_midnight = sorted
            .last()
            .is_some_and(|r| r.ends_with("24:00") || r.ends_with("23:59"));
        if starts_at_midnight && ends_at_midnight {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_time_ranges_yields_empty_string() {
        assert_eq!(normalize_opening_hours(""), "");
        assert_eq!(normalize_opening_hours("free of charge"), "");
        assert_eq!(normalize_opening_hours("open at 9 until 17"), "");
        assert_eq!(normalize_opening_hours("9:0-17:0"), "");
    }

    #[test]
    fn full_day_literal_is_round_the_clock() {
        assert_eq!(normalize_opening_hours("Mo-Su 00:00-24:00"), "24/7");
        assert_eq!(normalize_opening_hours("0:00-23:59"), "24/7");
        assert_eq!(normalize_opening_hours("24:00-24:00"), "24/7");
    }

    #[test]
    fn overnight_plus_daytime_is_round_the_clock() {
        assert_eq!(normalize_opening_hours("22:00-06:00; 06:00-22:00"), "24/7");
        assert_eq!(
            normalize_opening_hours("charge 2 EUR 08:00-20:00, 1 EUR 20:00-08:00"),
            "24/7"
        );
    }

    #[test]
    fn sorted_bounds_touching_midnight_are_round_the_clock() {
        // Sorted first range starts at midnight, sorted last ends at 24:00.
        assert_eq!(normalize_opening_hours("12:00-24:00 and 00:00-12:00"), "24/7");
    }

    #[test]
    fn single_daytime_range_passes_through() {
        assert_eq!(normalize_opening_hours("09:00-17:00"), "09:00-17:00");
    }

    #[test]
    fn single_overnight_range_is_not_round_the_clock() {
        assert_eq!(normalize_opening_hours("22:00-06:00"), "22:00-06:00");
    }

    #[test]
    fn disjoint_daytime_ranges_stay_joined_in_order() {
        assert_eq!(
            normalize_opening_hours("09:00-12:00; 13:00-18:00"),
            "09:00-12:00; 13:00-18:00"
        );
        assert_eq!(
            normalize_opening_hours("late 13:00-18:00 early 06:00-12:00"),
            "13:00-18:00; 06:00-12:00"
        );
    }

    #[test]
    fn duplicate_ranges_are_kept() {
        assert_eq!(
            normalize_opening_hours("09:00-17:00 09:00-17:00"),
            "09:00-17:00; 09:00-17:00"
        );
    }

    #[test]
    fn spacing_around_the_dash_is_tolerated() {
        assert_eq!(normalize_opening_hours("8:00 - 18:30"), "8:00-18:30");
    }

    #[test]
    fn minutes_parse_degrades_to_zero() {
        assert_eq!(minutes_of("09:30"), 570);
        assert_eq!(minutes_of("9"), 0);
        assert_eq!(minutes_of("a:30"), 30);
    }
}
