use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: i64,
    pub power_watts: f64,
    pub timestamp: DateTime<Utc>,
}

/// Load shape of a simulated appliance.
#[derive(Debug, Clone, Copy)]
pub struct Appliance {
    pub device_id: i64,
    /// Draw while running, in watts.
    pub rated_watts: f64,
    /// Standby draw.
    pub idle_watts: f64,
}

impl Appliance {
    pub fn for_device(rng: &mut impl Rng, device_id: i64) -> Self {
        Self {
            device_id,
            rated_watts: rng.gen_range(40.0..2000.0),
            idle_watts: rng.gen_range(0.0..5.0),
        }
    }

    /// Samples one reading at `now`. Appliances are more likely to run in the
    /// evening; a small share of readings are spikes above the rated draw.
    pub fn sample(&self, rng: &mut impl Rng, now: DateTime<Utc>) -> Reading {
        let running = rng.gen_bool(duty_cycle(now.hour()));

        let power_watts = if !running {
            self.idle_watts
        } else if rng.gen_bool(0.02) {
            self.rated_watts * rng.gen_range(1.5..3.0)
        } else {
            self.rated_watts * rng.gen_range(0.8..1.1)
        };

        Reading {
            device_id: self.device_id,
            power_watts: (power_watts * 100.0).round() / 100.0,
            timestamp: now,
        }
    }
}

fn duty_cycle(hour: u32) -> f64 {
    match hour {
        0..=5 => 0.1,
        6..=8 => 0.5,
        9..=16 => 0.3,
        17..=22 => 0.7,
        _ => 0.2,
    }
}
