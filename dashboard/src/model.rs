use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Household device as held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub room: Option<String>,
    pub is_on: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

/// One stored power reading. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Sample {
    pub id: i64,
    pub device_id: i64,
    pub timestamp: DateTime<Utc>,
    pub power_watts: f64,
}

/// A sample joined with the owning device's identity, as consumed by the
/// aggregation routines.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LogRow {
    pub sample_id: i64,
    pub device_id: i64,
    pub device_name: String,
    pub room: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub power_watts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LogPoint {
    pub timestamp: DateTime<Utc>,
    pub power_watts: f64,
}

/// Incoming reading, from `POST /api/reading/` or an MQTT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: i64,
    pub power_watts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DeviceSnapshot {
    pub id: i64,
    pub name: String,
    pub room: String,
    pub is_on: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub recent_logs: Vec<LogPoint>,
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct DeviceLogsResponse {
    pub device: String,
    pub logs: Vec<LogPoint>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub id: i64,
    pub is_on: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// A point of a time-bucketed series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDevice {
    pub id: i64,
    pub name: String,
    pub avg_power: f64,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub daily: Vec<SeriesPoint>,
    pub weekly: Vec<SeriesPoint>,
    pub monthly: Vec<SeriesPoint>,
    pub top_devices: Vec<TopDevice>,
    pub units: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAverage {
    pub id: i64,
    pub name: String,
    pub room: String,
    pub avg_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomAverage {
    pub room: String,
    pub avg_power: f64,
}

#[derive(Debug, Serialize)]
pub struct CompareSummary {
    pub by_device: Vec<DeviceAverage>,
    pub by_room: Vec<RoomAverage>,
    pub ranking: Vec<DeviceAverage>,
    pub units: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub date: String,
    pub hour: u32,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub heatmap: Vec<HeatCell>,
    pub units: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub device_id: i64,
    pub device: String,
    pub room: String,
    pub power_watts: f64,
    pub timestamp: DateTime<Utc>,
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub device_id: i64,
    pub device: String,
    pub room: String,
    pub avg_power: f64,
    pub suggestion: &'static str,
    pub expected_savings_rs: f64,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}
