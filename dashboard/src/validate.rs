use crate::errors::{Error, Result};
use crate::model::Reading;

const POWER_MIN: f64 = 0.0;
const POWER_MAX: f64 = 100_000.0;

/// Validates an incoming power reading
pub fn validate(reading: &Reading) -> Result<()> {
    if reading.device_id <= 0 {
        return Err(Error::Validation(format!(
            "Device ID {} is not a valid identifier",
            reading.device_id
        )));
    }

    if !reading.power_watts.is_finite() {
        return Err(Error::Validation("Power must be a finite number".to_string()));
    }

    if reading.power_watts < POWER_MIN || reading.power_watts > POWER_MAX {
        return Err(Error::Validation(format!(
            "Power {} W out of range [{}, {}]",
            reading.power_watts, POWER_MIN, POWER_MAX
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device_id: i64, power_watts: f64) -> Reading {
        Reading {
            device_id,
            power_watts,
            timestamp: None,
        }
    }

    #[test]
    fn test_valid_reading() {
        assert!(validate(&reading(1, 60.0)).is_ok());
        assert!(validate(&reading(1, 0.0)).is_ok());
        assert!(validate(&reading(1, POWER_MAX)).is_ok());
    }

    #[test]
    fn test_invalid_device_id() {
        assert!(validate(&reading(0, 60.0)).is_err());
        assert!(validate(&reading(-3, 60.0)).is_err());
    }

    #[test]
    fn test_negative_power() {
        assert!(validate(&reading(1, -0.5)).is_err());
    }

    #[test]
    fn test_power_too_high() {
        assert!(validate(&reading(1, 250_000.0)).is_err());
    }

    #[test]
    fn test_non_finite_power() {
        assert!(validate(&reading(1, f64::NAN)).is_err());
        assert!(validate(&reading(1, f64::INFINITY)).is_err());
    }
}
