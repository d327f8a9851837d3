//! Resolution of the optional `start`/`end` query parameters into a concrete
//! UTC interval.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Length of the `YYYY-MM-DD` prefix.
const DATE_LEN: usize = 10;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Per-endpoint default window, always ending at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultWindow {
    UsageSummary,
    CompareSummary,
    Heatmap,
}

impl DefaultWindow {
    pub fn lookback(self) -> Duration {
        match self {
            DefaultWindow::UsageSummary | DefaultWindow::CompareSummary => Duration::days(30),
            DefaultWindow::Heatmap => Duration::days(7),
        }
    }
}

/// Half-open interval `[start, end)`. An inverted interval is legal and
/// simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolves the requested interval. A missing endpoint takes its default; if
/// either supplied endpoint is malformed, both fall back to the default window.
pub fn resolve(
    start: Option<&str>,
    end: Option<&str>,
    window: DefaultWindow,
    now: DateTime<Utc>,
    tz: Tz,
) -> TimeRange {
    let default = TimeRange {
        start: now - window.lookback(),
        end: now,
    };

    let start = present(start);
    let end = present(end);

    let parsed_start = match start {
        Some(raw) => parse_datetime(raw, tz),
        None => Some(default.start),
    };
    let parsed_end = match end {
        Some(raw) => parse_datetime(raw, tz),
        None => Some(default.end),
    };

    match (parsed_start, parsed_end) {
        (Some(start), Some(end)) => TimeRange { start, end },
        _ => {
            debug!(?start, ?end, ?window, "unparsable range, using default window");
            default
        }
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses an ISO-8601 date or date-time. Values without an offset are read as
/// wall-clock time in `tz`.
pub fn parse_datetime(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some((local, offset)) = split_offset(raw) {
        return offset
            .from_local_datetime(&parse_naive(local)?)
            .single()
            .map(|dt| dt.with_timezone(&Utc));
    }

    // Ambiguous wall times (DST fold) take the earlier instant; times inside a
    // DST gap do not exist and are treated as unparsable.
    tz.from_local_datetime(&parse_naive(raw)?)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Splits a trailing `Z`, `±HH:MM`, `±HHMM` or `±HH` designator off the time
/// part of `raw`.
fn split_offset(raw: &str) -> Option<(&str, FixedOffset)> {
    if let Some(local) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        return Some((local, FixedOffset::east_opt(0)?));
    }

    let time = raw.get(DATE_LEN..)?;
    let sign_at = time.rfind(|c| c == '+' || c == '-')?;
    let digits: String = time[sign_at + 1..].chars().filter(|&c| c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    let seconds = hours * 3600 + minutes * 60;
    let offset = if time[sign_at..].starts_with('-') {
        FixedOffset::west_opt(seconds)?
    } else {
        FixedOffset::east_opt(seconds)?
    };
    Some((&raw[..DATE_LEN + sign_at], offset))
}
