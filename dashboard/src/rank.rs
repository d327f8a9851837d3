use crate::aggregate::DeviceUsage;
use std::cmp::Ordering;

/// Top devices listed in the usage summary.
pub const USAGE_TOP_DEVICES: usize = 5;
/// Devices listed in the compare ranking.
pub const COMPARE_RANKING: usize = 10;

fn by_mean_desc(a: &DeviceUsage, b: &DeviceUsage) -> Ordering {
    b.mean_watts
        .total_cmp(&a.mean_watts)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts devices by descending mean power; equal means fall back to ascending
/// device id.
pub fn rank(mut devices: Vec<DeviceUsage>) -> Vec<DeviceUsage> {
    devices.sort_by(by_mean_desc);
    devices
}

/// The `n` highest-consuming devices.
pub fn top_n(devices: Vec<DeviceUsage>, n: usize) -> Vec<DeviceUsage> {
    let mut ranked = rank(devices);
    ranked.truncate(n);
    ranked
}
