use crate::model::{Alert, LogRow};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_ALERT_THRESHOLD_WATTS: f64 = 250.0;
pub const DEFAULT_ALERT_SINCE_HOURS: i64 = 24;
pub const ALERT_LIMIT: usize = 100;
pub const ALERT_ACTION: &str = "Consider turning off or reducing usage";

/// Earliest timestamp covered by an alert scan looking back `since_hours`.
pub fn alert_cutoff(now: DateTime<Utc>, since_hours: i64) -> DateTime<Utc> {
    match Duration::try_hours(since_hours).and_then(|d| now.checked_sub_signed(d)) {
        Some(cutoff) => cutoff,
        None if since_hours < 0 => DateTime::<Utc>::MAX_UTC,
        None => DateTime::<Utc>::MIN_UTC,
    }
}

/// Samples at or after `cutoff` drawing at least `threshold` watts, newest
/// first, capped at [`ALERT_LIMIT`].
pub fn scan<'a, I>(rows: I, threshold: f64, cutoff: DateTime<Utc>) -> Vec<Alert>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    let mut hits: Vec<&LogRow> = rows
        .into_iter()
        .filter(|row| row.timestamp >= cutoff && row.power_watts >= threshold)
        .collect();
    hits.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sample_id.cmp(&a.sample_id))
    });

    hits.into_iter()
        .take(ALERT_LIMIT)
        .map(|row| Alert {
            device_id: row.device_id,
            device: row.device_name.clone(),
            room: row.room.clone().unwrap_or_default(),
            power_watts: row.power_watts,
            timestamp: row.timestamp,
            action: ALERT_ACTION,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn row(sample_id: i64, ts: DateTime<Utc>, watts: f64) -> LogRow {
        LogRow {
            sample_id,
            device_id: 1,
            device_name: "Heater".to_string(),
            room: Some("Living".to_string()),
            timestamp: ts,
            power_watts: watts,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let cutoff = alert_cutoff(now(), DEFAULT_ALERT_SINCE_HOURS);
        let rows = vec![
            row(1, now() - Duration::hours(1), DEFAULT_ALERT_THRESHOLD_WATTS),
            row(2, now() - Duration::hours(1), 249.99),
        ];
        let alerts = scan(&rows, DEFAULT_ALERT_THRESHOLD_WATTS, cutoff);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].power_watts, 250.0);
        assert_eq!(alerts[0].action, ALERT_ACTION);
        assert_eq!(alerts[0].room, "Living");
    }

    #[test]
    fn test_lookback_excludes_older_samples() {
        let cutoff = alert_cutoff(now(), 24);
        let rows = vec![
            row(1, now() - Duration::hours(24) - Duration::minutes(1), 900.0),
            row(2, now() - Duration::hours(24), 900.0),
        ];
        let alerts = scan(&rows, DEFAULT_ALERT_THRESHOLD_WATTS, cutoff);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].timestamp, now() - Duration::hours(24));
    }

    #[test]
    fn test_newest_first_and_capped() {
        let rows: Vec<LogRow> = (0..150)
            .map(|i| row(i, now() - Duration::minutes(150 - i), 300.0))
            .collect();
        let alerts = scan(&rows, DEFAULT_ALERT_THRESHOLD_WATTS, alert_cutoff(now(), 24));
        assert_eq!(alerts.len(), ALERT_LIMIT);
        assert_eq!(alerts[0].timestamp, now() - Duration::minutes(1));
        assert!(alerts.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_cutoff_saturates() {
        assert_eq!(alert_cutoff(now(), i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(alert_cutoff(now(), i64::MIN), DateTime::<Utc>::MAX_UTC);
        assert_eq!(alert_cutoff(now(), 0), now());
    }
}
