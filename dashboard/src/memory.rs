use crate::errors::{Error, Result};
use crate::model::{Device, DeviceSnapshot, LogPoint, LogRow, Reading, Sample};
use crate::store::{is_on_for, LogQuery, ReadingStore, SortOrder, DEVICE_RECENT_LOGS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    devices: BTreeMap<i64, Device>,
    logs: Vec<Sample>,
    next_device_id: i64,
    next_sample_id: i64,
}

impl Inner {
    fn append(
        &mut self,
        device_id: i64,
        power_watts: f64,
        ts: DateTime<Utc>,
        seen_at: DateTime<Utc>,
    ) -> Option<Sample> {
        let device = self.devices.get_mut(&device_id)?;
        device.is_on = is_on_for(power_watts);
        device.last_seen = Some(seen_at);

        self.next_sample_id += 1;
        let sample = Sample {
            id: self.next_sample_id,
            device_id,
            timestamp: ts,
            power_watts,
        };
        self.logs.push(sample.clone());
        Some(sample)
    }

    /// Samples of one device, newest first.
    fn newest_for(&self, device_id: i64, limit: usize) -> Vec<&Sample> {
        let mut samples: Vec<&Sample> = self
            .logs
            .iter()
            .filter(|s| s.device_id == device_id)
            .collect();
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        samples.truncate(limit);
        samples
    }
}

/// Process-local store. One lock guards the registry and the log; readers
/// share it, appends take it exclusively.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_device(&self, name: &str, room: Option<&str>) -> Device {
        let mut inner = self.inner.write().await;
        inner.next_device_id += 1;
        let device = Device {
            id: inner.next_device_id,
            name: name.to_string(),
            room: room.map(str::to_string),
            is_on: false,
            last_seen: None,
        };
        inner.devices.insert(device.id, device.clone());
        debug!(device_id = device.id, name, "registered device");
        device
    }
}

fn point(sample: &Sample) -> LogPoint {
    LogPoint {
        timestamp: sample.timestamp,
        power_watts: sample.power_watts,
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRow>> {
        let inner = self.inner.read().await;

        let mut rows: Vec<LogRow> = inner
            .logs
            .iter()
            .filter_map(|sample| {
                let device = inner.devices.get(&sample.device_id)?;
                Some(LogRow {
                    sample_id: sample.id,
                    device_id: device.id,
                    device_name: device.name.clone(),
                    room: device.room.clone(),
                    timestamp: sample.timestamp,
                    power_watts: sample.power_watts,
                })
            })
            .filter(|row| query.matches(row))
            .collect();

        match query.order {
            SortOrder::Ascending => rows.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.sample_id.cmp(&b.sample_id))
            }),
            SortOrder::NewestFirst => rows.sort_by(|a, b| {
                b.timestamp
                    .cmp(&a.timestamp)
                    .then_with(|| b.sample_id.cmp(&a.sample_id))
            }),
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn record(&self, device_id: i64, power_watts: f64, at: DateTime<Utc>) -> Result<Sample> {
        let mut inner = self.inner.write().await;
        inner
            .append(device_id, power_watts, at, at)
            .ok_or(Error::DeviceNotFound(device_id))
    }

    async fn record_batch(
        &self,
        readings: &[Reading],
        received_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut appended = 0;
        for reading in readings {
            let ts = reading.timestamp.unwrap_or(received_at);
            if inner
                .append(reading.device_id, reading.power_watts, ts, received_at)
                .is_some()
            {
                appended += 1;
            }
        }
        Ok(appended)
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .devices
            .values()
            .map(|device| {
                let mut recent_logs: Vec<LogPoint> = inner
                    .newest_for(device.id, DEVICE_RECENT_LOGS)
                    .into_iter()
                    .map(point)
                    .collect();
                recent_logs.reverse();
                DeviceSnapshot {
                    id: device.id,
                    name: device.name.clone(),
                    room: device.room.clone().unwrap_or_default(),
                    is_on: device.is_on,
                    last_seen: device.last_seen,
                    recent_logs,
                }
            })
            .collect())
    }

    async fn toggle_device(&self, device_id: i64, at: DateTime<Utc>) -> Result<Device> {
        let mut inner = self.inner.write().await;
        let device = inner
            .devices
            .get_mut(&device_id)
            .ok_or(Error::DeviceNotFound(device_id))?;
        device.is_on = !device.is_on;
        device.last_seen = Some(at);
        Ok(device.clone())
    }

    async fn device_logs(&self, device_id: i64, limit: usize) -> Result<(Device, Vec<LogPoint>)> {
        let inner = self.inner.read().await;
        let device = inner
            .devices
            .get(&device_id)
            .cloned()
            .ok_or(Error::DeviceNotFound(device_id))?;
        let logs = inner
            .newest_for(device_id, limit)
            .into_iter()
            .map(point)
            .collect();
        Ok((device, logs))
    }
}
