use crate::errors::Result;
use crate::filter::LogFilter;
use crate::model::{Device, DeviceSnapshot, LogPoint, LogRow, Reading, Sample};
use crate::range::TimeRange;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Number of samples attached to each device in a registry listing.
pub const DEVICE_RECENT_LOGS: usize = 10;
/// Number of samples returned by a per-device log lookup.
pub const DEVICE_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    NewestFirst,
}

/// A bounded scan over the power log.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
    pub filter: LogFilter,
    pub min_watts: Option<f64>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl LogQuery {
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            from: Some(range.start),
            until: Some(range.end),
            ..Self::default()
        }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn matches(&self, row: &LogRow) -> bool {
        self.from.map_or(true, |from| row.timestamp >= from)
            && self.until.map_or(true, |until| row.timestamp < until)
            && self.min_watts.map_or(true, |min| row.power_watts >= min)
            && self.filter.matches(row)
    }
}

/// Append-only power log plus the slice of the device registry the dashboard
/// needs. Implementations must allow concurrent appends and scans.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRow>>;

    /// Appends a sample and marks the device on (power above 1 W) or off,
    /// stamping `last_seen` with `at`.
    async fn record(&self, device_id: i64, power_watts: f64, at: DateTime<Utc>) -> Result<Sample>;

    /// Appends a batch of readings; readings for unknown devices are skipped.
    /// Returns the number of samples appended.
    async fn record_batch(&self, readings: &[Reading], received_at: DateTime<Utc>) -> Result<usize>;

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>>;

    async fn toggle_device(&self, device_id: i64, at: DateTime<Utc>) -> Result<Device>;

    /// The device and its newest `limit` samples, newest first.
    async fn device_logs(&self, device_id: i64, limit: usize) -> Result<(Device, Vec<LogPoint>)>;
}

/// On/off state implied by a reading.
pub fn is_on_for(power_watts: f64) -> bool {
    power_watts > 1.0
}
