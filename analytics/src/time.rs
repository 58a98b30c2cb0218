//! Time parsing and shift-window helpers.
//!
//! Registration times arrive as `HH:MM:SS` strings, sometimes with a
//! fractional-second suffix appended by the controller; dates arrive as ISO
//! dates. Everything here is timezone-naive: the plant runs on local time and
//! the persistence layer stores naive timestamps.

use chrono::{NaiveDateTime, NaiveTime, Timelike};

use crate::core::domain::Shift;
use crate::core::errors::{AnalysisError, AnalysisResult};

/// Full shift length in minutes.
pub const SHIFT_MINUTES: i64 = 480;

/// Drops a fractional-second suffix (`"12:30:01.4570000"` → `"12:30:01"`).
pub fn strip_subseconds(raw: &str) -> &str {
    match raw.find('.') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Parses an `hora_registro` value, truncating any sub-second fraction.
///
/// `context` identifies the offending record (machine id, date) in the error.
pub fn parse_hora_registro(raw: &str, context: &str) -> AnalysisResult<NaiveTime> {
    let trimmed = strip_subseconds(raw.trim());
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S").map_err(|e| {
        AnalysisError::parse(format!("hora_registro `{raw}` ({context}): {e}"))
    })
}

/// Floors a timestamp to whole seconds.
pub fn floor_to_second(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

/// Minutes elapsed since the start of `turno`, when `now` falls inside that
/// shift's own window; 480 otherwise (the shift has already concluded, or has
/// not started, and the caller is asking about a full period).
pub fn elapsed_shift_minutes(turno: Shift, now: NaiveDateTime) -> f64 {
    let hour = now.hour();
    let in_window = match turno {
        Shift::Morning => (8..16).contains(&hour),
        Shift::Evening => (16..24).contains(&hour),
        Shift::Night => hour < 8,
    };
    if !in_window {
        return SHIFT_MINUTES as f64;
    }

    match now.date().and_hms_opt(turno.start_hour(), 0, 0) {
        Some(start) => (now - start).num_seconds() as f64 / 60.0,
        None => SHIFT_MINUTES as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn strips_controller_subseconds() {
        assert_eq!(strip_subseconds("12:30:01.4570000"), "12:30:01");
        assert_eq!(strip_subseconds("12:30:01"), "12:30:01");
    }

    #[test]
    fn parses_hora_registro_with_fraction() {
        let time = parse_hora_registro("08:15:30.123", "TMF001").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(8, 15, 30).unwrap());
    }

    #[test]
    fn rejects_malformed_hora_registro() {
        let err = parse_hora_registro("25:99:00", "TMF001, 2024-05-01").unwrap_err();
        assert!(err.to_string().contains("TMF001"));
    }

    #[test]
    fn elapsed_minutes_inside_shift_window() {
        let now = dt(2024, 5, 1, 10, 30, 0);
        assert_eq!(elapsed_shift_minutes(Shift::Morning, now), 150.0);

        let now = dt(2024, 5, 1, 0, 45, 0);
        assert_eq!(elapsed_shift_minutes(Shift::Night, now), 45.0);
    }

    #[test]
    fn elapsed_minutes_outside_window_is_full_shift() {
        // Asking about the morning shift in the evening: shift concluded.
        let now = dt(2024, 5, 1, 17, 0, 0);
        assert_eq!(elapsed_shift_minutes(Shift::Morning, now), 480.0);
        assert_eq!(elapsed_shift_minutes(Shift::Night, now), 480.0);
    }

    #[test]
    fn floor_to_second_drops_nanos() {
        let value = dt(2024, 5, 1, 10, 0, 0) + chrono::Duration::nanoseconds(987);
        assert_eq!(floor_to_second(value), dt(2024, 5, 1, 10, 0, 0));
    }
}
