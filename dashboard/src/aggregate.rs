//! Time-bucketed and dimension-grouped averages over log rows.
//!
//! All routines group purely by timestamp value or device/room identity, so
//! the arrival order of the input rows never affects the output. Buckets are
//! cut in the configured time zone; only buckets holding at least one sample
//! are emitted.

use crate::model::{DeviceAverage, HeatCell, LogRow, RoomAverage, SeriesPoint, TopDevice};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};

/// Label used for devices without a room.
pub const UNASSIGNED_ROOM: &str = "Unassigned";

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
    /// ISO weeks, starting Monday.
    Week,
    Month,
}

/// Start of a bucket in local time. `hour` is only set for hourly buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub date: NaiveDate,
    pub hour: Option<u32>,
}

impl BucketKey {
    pub fn label(&self) -> String {
        match self.hour {
            Some(hour) => format!("{}T{:02}:00", self.date.format("%Y-%m-%d"), hour),
            None => self.date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl Granularity {
    pub fn bucket(self, ts: DateTime<Utc>, tz: Tz) -> BucketKey {
        let local = ts.with_timezone(&tz);
        let date = local.date_naive();
        match self {
            Granularity::Hour => BucketKey {
                date,
                hour: Some(local.hour()),
            },
            Granularity::Day => BucketKey { date, hour: None },
            Granularity::Week => BucketKey {
                date: date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
                hour: None,
            },
            Granularity::Month => BucketKey {
                date: date.with_day(1).unwrap_or(date),
                hour: None,
            },
        }
    }
}

/// Mean watts per bucket, ascending by bucket start, rounded to 2 decimals.
pub fn bucket_series<'a, I>(rows: I, granularity: Granularity, tz: Tz) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    let mut buckets: BTreeMap<BucketKey, Mean> = BTreeMap::new();
    for row in rows {
        buckets
            .entry(granularity.bucket(row.timestamp, tz))
            .or_default()
            .push(row.power_watts);
    }

    buckets
        .into_iter()
        .map(|(key, mean)| SeriesPoint {
            date: key.label(),
            value: round_to(mean.value(), 2),
        })
        .collect()
}

/// Mean watts per (local date, hour of day), sorted by date then hour.
pub fn heatmap<'a, I>(rows: I, tz: Tz) -> Vec<HeatCell>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    let mut buckets: BTreeMap<BucketKey, Mean> = BTreeMap::new();
    for row in rows {
        buckets
            .entry(Granularity::Hour.bucket(row.timestamp, tz))
            .or_default()
            .push(row.power_watts);
    }

    buckets
        .into_iter()
        .map(|(key, mean)| HeatCell {
            date: key.date.format("%Y-%m-%d").to_string(),
            hour: key.hour.unwrap_or(0),
            value: round_to(mean.value(), 2),
        })
        .collect()
}

/// Unrounded per-device average.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsage {
    pub id: i64,
    pub name: String,
    pub room: Option<String>,
    pub mean_watts: f64,
}

impl DeviceUsage {
    pub fn to_average(&self) -> DeviceAverage {
        DeviceAverage {
            id: self.id,
            name: self.name.clone(),
            room: self.room.clone().unwrap_or_default(),
            avg_power: round_to(self.mean_watts, 2),
        }
    }

    pub fn to_top_device(&self) -> TopDevice {
        TopDevice {
            id: self.id,
            name: self.name.clone(),
            avg_power: round_to(self.mean_watts, 2),
        }
    }
}

/// Mean watts per device, in ascending device id order.
pub fn group_by_device<'a, I>(rows: I) -> Vec<DeviceUsage>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    let mut groups: BTreeMap<i64, (&'a LogRow, Mean)> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.device_id)
            .or_insert_with(|| (row, Mean::default()))
            .1
            .push(row.power_watts);
    }

    groups
        .into_values()
        .map(|(row, mean)| DeviceUsage {
            id: row.device_id,
            name: row.device_name.clone(),
            room: row.room.clone(),
            mean_watts: mean.value(),
        })
        .collect()
}

/// Room key for grouping: exact label, with blank or missing rooms collapsed
/// into one unassigned group.
fn room_key(room: Option<&str>) -> Option<&str> {
    room.filter(|r| !r.trim().is_empty())
}

/// Mean watts per room, descending by mean; equal means order by room label.
/// Room labels group by exact value.
pub fn group_by_room<'a, I>(rows: I) -> Vec<RoomAverage>
where
    I: IntoIterator<Item = &'a LogRow>,
{
    let mut groups: HashMap<Option<&'a str>, Mean> = HashMap::new();
    for row in rows {
        groups
            .entry(room_key(row.room.as_deref()))
            .or_default()
            .push(row.power_watts);
    }

    let mut rooms: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(room, mean)| (room.unwrap_or(UNASSIGNED_ROOM).to_string(), mean.value()))
        .collect();
    rooms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    rooms
        .into_iter()
        .map(|(room, mean)| RoomAverage {
            room,
            avg_power: round_to(mean, 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(device_id: i64, room: Option<&str>, ts: DateTime<Utc>, watts: f64) -> LogRow {
        LogRow {
            sample_id: ts.timestamp(),
            device_id,
            device_name: format!("dev-{device_id}"),
            room: room.map(str::to_string),
            timestamp: ts,
            power_watts: watts,
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(10.0, 2), 10.0);
    }

    #[test]
    fn test_daily_series_ignores_arrival_order() {
        let rows = vec![
            row(1, None, at(3, 10), 30.0),
            row(1, None, at(1, 10), 10.0),
            row(2, None, at(1, 23), 20.0),
            row(1, None, at(3, 1), 50.0),
        ];
        let series = bucket_series(&rows, Granularity::Day, Tz::UTC);
        assert_eq!(
            series,
            vec![
                SeriesPoint {
                    date: "2024-05-01".to_string(),
                    value: 15.0,
                },
                SeriesPoint {
                    date: "2024-05-03".to_string(),
                    value: 40.0,
                },
            ]
        );
    }

    #[test]
    fn test_day_bucket_uses_configured_zone() {
        // 20:00 UTC on the 1st is already the 2nd in Kolkata (+05:30).
        let rows = vec![row(1, None, at(1, 20), 10.0)];
        let series = bucket_series(&rows, Granularity::Day, chrono_tz::Asia::Kolkata);
        assert_eq!(series[0].date, "2024-05-02");
    }

    #[test]
    fn test_week_and_month_buckets() {
        // 2024-05-01 is a Wednesday, 2024-05-06 a Monday.
        assert_eq!(
            Granularity::Week.bucket(at(1, 12), Tz::UTC).label(),
            "2024-04-29"
        );
        assert_eq!(
            Granularity::Week.bucket(at(6, 0), Tz::UTC).label(),
            "2024-05-06"
        );
        assert_eq!(
            Granularity::Month.bucket(at(17, 8), Tz::UTC).label(),
            "2024-05-01"
        );
        assert_eq!(
            Granularity::Hour.bucket(at(17, 8), Tz::UTC).label(),
            "2024-05-17T08:00"
        );
    }

    #[test]
    fn test_bucket_values_stay_within_sample_bounds() {
        let rows: Vec<LogRow> = (0..48)
            .map(|i| row(1, None, at(1, 0) + Duration::hours(i), (i * 7 % 31) as f64))
            .collect();
        let max = rows.iter().map(|r| r.power_watts).fold(0.0, f64::max);
        for granularity in [
            Granularity::Hour,
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
        ] {
            for point in bucket_series(&rows, granularity, Tz::UTC) {
                assert!(point.value >= 0.0 && point.value <= max);
            }
        }
    }

    #[test]
    fn test_empty_input_yields_no_buckets() {
        let rows: Vec<LogRow> = Vec::new();
        assert!(bucket_series(&rows, Granularity::Day, Tz::UTC).is_empty());
        assert!(heatmap(&rows, Tz::UTC).is_empty());
        assert!(group_by_device(&rows).is_empty());
        assert!(group_by_room(&rows).is_empty());
    }

    #[test]
    fn test_heatmap_sorted_by_date_then_hour() {
        let rows = vec![
            row(1, None, at(2, 5), 10.0),
            row(1, None, at(1, 23), 20.0),
            row(2, None, at(1, 23), 40.0),
            row(1, None, at(1, 4), 5.0),
        ];
        let cells = heatmap(&rows, Tz::UTC);
        let keys: Vec<(String, u32)> = cells.iter().map(|c| (c.date.clone(), c.hour)).collect();
        assert_eq!(
            keys,
            vec![
                ("2024-05-01".to_string(), 4),
                ("2024-05-01".to_string(), 23),
                ("2024-05-02".to_string(), 5),
            ]
        );
        assert_eq!(cells[1].value, 30.0);
    }

    #[test]
    fn test_group_by_device() {
        let rows = vec![
            row(2, Some("Kitchen"), at(1, 1), 10.0),
            row(1, None, at(1, 1), 3.0),
            row(2, Some("Kitchen"), at(1, 2), 20.0),
        ];
        let groups = group_by_device(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, 1);
        assert_eq!(groups[1].mean_watts, 15.0);
        assert_eq!(groups[0].to_average().room, "");
    }

    #[test]
    fn test_room_grouping_is_exact_and_blank_is_unassigned() {
        let rows = vec![
            row(1, Some("Kitchen"), at(1, 1), 100.0),
            row(2, Some("kitchen "), at(1, 1), 80.0),
            row(3, Some(""), at(1, 1), 50.0),
            row(4, None, at(1, 1), 30.0),
        ];
        let rooms = group_by_room(&rows);
        assert_eq!(
            rooms,
            vec![
                RoomAverage {
                    room: "Kitchen".to_string(),
                    avg_power: 100.0,
                },
                RoomAverage {
                    room: "kitchen ".to_string(),
                    avg_power: 80.0,
                },
                RoomAverage {
                    room: UNASSIGNED_ROOM.to_string(),
                    avg_power: 40.0,
                },
            ]
        );
    }
}
