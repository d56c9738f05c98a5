//! Time-of-day parsing and timer arithmetic.
//!
//! Slot times are stored as `HH:mm` strings and compared against today's
//! occurrence only. The due band never reaches across midnight, so a dose
//! at 23:58 is not due at 00:02.

use crate::{Error, Result};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};

/// Parse an `HH:mm` time of day
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| Error::InvalidTime(s.to_string()))
}

/// Parse an `HH:mm:ss` (or `HH:mm`) time of day, used for the reset trigger
pub fn parse_clock_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| Error::InvalidTime(s.to_string()))
}

/// Whether `now` is within `tolerance` of today's `scheduled` time, both ends inclusive
pub fn is_within_tolerance(
    scheduled: NaiveTime,
    now: NaiveDateTime,
    tolerance: Duration,
) -> bool {
    let due_at = now.date().and_time(scheduled);
    due_at - tolerance <= now && now <= due_at + tolerance
}

/// Time left until the next whole minute
pub fn until_next_minute(now: NaiveDateTime) -> std::time::Duration {
    let into_minute = u64::from(now.second()) * 1000 + u64::from(now.nanosecond() / 1_000_000);
    std::time::Duration::from_millis(60_000 - into_minute.min(59_999))
}

/// Time left until the next occurrence of `at` in local time; a full day if
/// `now` is exactly `at`
pub fn until_next_daily(now: NaiveDateTime, at: NaiveTime) -> std::time::Duration {
    until_next_daily_in(&Local, now, at)
}

/// Like [`until_next_daily`], measured as elapsed time in `tz`
///
/// A DST shift between `now` and the target changes the wait. When either
/// end does not exist in `tz` (a spring-forward gap) the wall-clock
/// difference is used.
pub fn until_next_daily_in<Tz: TimeZone>(
    tz: &Tz,
    now: NaiveDateTime,
    at: NaiveTime,
) -> std::time::Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + Duration::days(1)
    };

    let wait = match (
        tz.from_local_datetime(&now).earliest(),
        tz.from_local_datetime(&next).earliest(),
    ) {
        (Some(from), Some(to)) => to.signed_duration_since(from),
        _ => next - now,
    };
    wait.to_std().unwrap_or_default()
}
