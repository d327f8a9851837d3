//! Rule-based auto-shutdown suggestions.
//!
//! Devices are ranked by their mean draw over the trailing week; of the top
//! candidates, those averaging at least [`SUGGESTION_MIN_WATTS`] get a
//! suggestion with a monthly savings estimate of
//! `mean_watts * rate * hours_per_day * days / 1000`.

use crate::aggregate::{group_by_device, round_to};
use crate::model::{LogRow, Suggestion};
use crate::rank::top_n;
use chrono::Duration;

pub const SUGGESTION_WINDOW_DAYS: i64 = 7;
pub const SUGGESTION_CANDIDATES: usize = 10;
pub const SUGGESTION_MIN_WATTS: f64 = 10.0;
pub const SAVINGS_RATE_PER_KWH: f64 = 6.0;
pub const SAVINGS_HOURS_PER_DAY: f64 = 8.0;
pub const SAVINGS_DAYS_PER_MONTH: f64 = 30.0;
pub const SUGGESTION_TEXT: &str = "Schedule auto-shutdown during off-hours";

pub fn suggestion_window() -> Duration {
    Duration::days(SUGGESTION_WINDOW_DAYS)
}

/// Estimated monthly savings, in currency units, for a device averaging
/// `mean_watts` that is switched off for the assumed off-hours.
pub fn expected_savings(mean_watts: f64) -> f64 {
    round_to(
        mean_watts * SAVINGS_RATE_PER_KWH * SAVINGS_HOURS_PER_DAY * SAVINGS_DAYS_PER_MONTH / 1000.0,
        2,
    )
}

/// Builds suggestions from rows already restricted to the trailing window.
pub fn suggest<'a, I>(rows: I) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    top_n(group_by_device(rows), SUGGESTION_CANDIDATES)
        .into_iter()
        .filter(|device| device.mean_watts >= SUGGESTION_MIN_WATTS)
        .map(|device| Suggestion {
            device_id: device.id,
            expected_savings_rs: expected_savings(device.mean_watts),
            avg_power: round_to(device.mean_watts, 1),
            device: device.name,
            room: device.room.unwrap_or_default(),
            suggestion: SUGGESTION_TEXT,
        })
        .collect()
}
