use chrono::{DateTime, Utc};

const MS_PER_DAY: i64 = 86_400_000;

/// `utc_day = floor(unix_ms / 86_400_000)`.
pub fn utc_day(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis().div_euclid(MS_PER_DAY)
}

/// A sweep runs on every fourth UTC day.
pub fn is_sweep_day(day: i64) -> bool {
    day.rem_euclid(4) == 0
}

/// `days_to_premier = max(1, ceil((now - started) / 86_400_000))`.
///
/// Ceiling with a floor of 1 day, so a career completed minutes after it
/// started still counts as a one-day career rather than zero.
pub fn days_to_premier(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> i64 {
    let delta_ms = (completed_at.timestamp_millis() - started_at.timestamp_millis()).max(0);
    let days = (delta_ms + MS_PER_DAY - 1) / MS_PER_DAY;
    days.max(1)
}
