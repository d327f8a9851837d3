use crate::alerts::{DEFAULT_ALERT_SINCE_HOURS, DEFAULT_ALERT_THRESHOLD_WATTS};
use crate::filter::LogFilter;
use tracing::debug;
use url::form_urlencoded;

/// Query parameters shared by the report endpoints, parsed once from the raw
/// query string. Malformed values are replaced by their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportParams {
    /// Raw `start`/`end`; resolved per endpoint since default windows differ.
    pub start: Option<String>,
    pub end: Option<String>,
    pub filter: LogFilter,
    pub threshold: f64,
    pub since_hours: i64,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            filter: LogFilter::default(),
            threshold: DEFAULT_ALERT_THRESHOLD_WATTS,
            since_hours: DEFAULT_ALERT_SINCE_HOURS,
        }
    }
}

impl ReportParams {
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(raw) = raw else {
            return params;
        };

        for (key, raw_value) in form_urlencoded::parse(raw.as_bytes()) {
            // Room labels compare exactly, so surrounding whitespace is kept.
            let value = raw_value.trim();
            match key.as_ref() {
                "start" => params.start = non_empty(value),
                "end" => params.end = non_empty(value),
                "room" => params.filter.room = non_empty(&raw_value),
                "device" => match value.parse::<i64>() {
                    Ok(id) => params.filter.device_ids.push(id),
                    Err(_) => debug!(value, "ignoring non-numeric device id"),
                },
                "threshold" => {
                    params.threshold = match value.parse::<f64>() {
                        Ok(v) if v.is_finite() => v,
                        _ => {
                            debug!(value, "invalid threshold, using default");
                            DEFAULT_ALERT_THRESHOLD_WATTS
                        }
                    }
                }
                "since" => {
                    params.since_hours = value.parse::<i64>().unwrap_or_else(|_| {
                        debug!(value, "invalid since, using default");
                        DEFAULT_ALERT_SINCE_HOURS
                    })
                }
                _ => {}
            }
        }

        params
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_query_uses_defaults() {
        let params = ReportParams::from_query(None);
        assert_eq!(params, ReportParams::default());
        assert_eq!(params.threshold, 250.0);
        assert_eq!(params.since_hours, 24);
        assert_eq!(params.filter, LogFilter::default());
    }

    #[test]
    fn test_repeated_device_keys() {
        let params = ReportParams::from_query(Some("device=3&device=7&device=x&room=Kitchen"));
        assert_eq!(params.filter.device_ids, vec![3, 7]);
        assert_eq!(params.filter.room.as_deref(), Some("Kitchen"));
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let params = ReportParams::from_query(Some("threshold=lots&since=1.5"));
        assert_eq!(params.threshold, DEFAULT_ALERT_THRESHOLD_WATTS);
        assert_eq!(params.since_hours, DEFAULT_ALERT_SINCE_HOURS);

        let params = ReportParams::from_query(Some("threshold=NaN&since="));
        assert_eq!(params.threshold, DEFAULT_ALERT_THRESHOLD_WATTS);
        assert_eq!(params.since_hours, DEFAULT_ALERT_SINCE_HOURS);
    }

    #[test]
    fn test_values_are_decoded() {
        let params = ReportParams::from_query(Some(
            "start=2024-06-01T00%3A00%3A00%2B05%3A30&end=&room=Living+Room&threshold=99.5&since=48",
        ));
        assert_eq!(params.start.as_deref(), Some("2024-06-01T00:00:00+05:30"));
        assert_eq!(params.end, None);
        assert_eq!(params.filter.room.as_deref(), Some("Living Room"));
        assert_eq!(params.threshold, 99.5);
        assert_eq!(params.since_hours, 48);
    }

    #[test]
    fn test_room_keeps_surrounding_whitespace() {
        let params = ReportParams::from_query(Some("room=kitchen%20&device=%203%20"));
        assert_eq!(params.filter.room.as_deref(), Some("kitchen "));
        assert_eq!(params.filter.device_ids, vec![3]);

        let params = ReportParams::from_query(Some("room="));
        assert_eq!(params.filter.room, None);
    }
}
