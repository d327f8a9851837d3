//! Report entry points. Each one resolves its interval, pulls the filtered
//! log rows once and hands them to the aggregation routines.

use crate::aggregate::{bucket_series, group_by_device, group_by_room, heatmap, Granularity};
use crate::alerts::{alert_cutoff, scan, ALERT_LIMIT};
use crate::config::ReportConfig;
use crate::errors::Result;
use crate::model::{
    AlertsResponse, CompareSummary, HeatmapResponse, LogRow, SuggestionsResponse, UsageSummary,
};
use crate::params::ReportParams;
use crate::rank::{rank, top_n, COMPARE_RANKING, USAGE_TOP_DEVICES};
use crate::range::{resolve, DefaultWindow};
use crate::store::{LogQuery, ReadingStore, SortOrder};
use crate::suggest::{suggest, suggestion_window};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub const WEEKLY_LOOKBACK_WEEKS: i64 = 12;
pub const MONTHLY_LOOKBACK_DAYS: i64 = 365;
pub const AVERAGE_UNITS: &str = "W (average)";
pub const HEATMAP_UNITS: &str = "W (avg)";

async fn fetch_window(
    store: &dyn ReadingStore,
    config: &ReportConfig,
    params: &ReportParams,
    window: DefaultWindow,
    now: DateTime<Utc>,
) -> Result<Vec<LogRow>> {
    let range = resolve(
        params.start.as_deref(),
        params.end.as_deref(),
        window,
        now,
        config.timezone,
    );
    debug!(start = %range.start, end = %range.end, ?window, "resolved report range");
    store
        .fetch_logs(&LogQuery::in_range(range).with_filter(params.filter.clone()))
        .await
}

/// Daily, weekly and monthly averages plus the top devices. The weekly and
/// monthly series are further clipped to fixed lookbacks from `now`,
/// independent of the requested range.
pub async fn usage_summary(
    store: &dyn ReadingStore,
    config: &ReportConfig,
    params: &ReportParams,
    now: DateTime<Utc>,
) -> Result<UsageSummary> {
    let rows = fetch_window(store, config, params, DefaultWindow::UsageSummary, now).await?;
    let tz = config.timezone;

    let week_start = now - Duration::weeks(WEEKLY_LOOKBACK_WEEKS);
    let month_start = now - Duration::days(MONTHLY_LOOKBACK_DAYS);

    Ok(UsageSummary {
        daily: bucket_series(&rows, Granularity::Day, tz),
        weekly: bucket_series(
            rows.iter().filter(|r| r.timestamp >= week_start),
            Granularity::Week,
            tz,
        ),
        monthly: bucket_series(
            rows.iter().filter(|r| r.timestamp >= month_start),
            Granularity::Month,
            tz,
        ),
        top_devices: top_n(group_by_device(&rows), USAGE_TOP_DEVICES)
            .iter()
            .map(|d| d.to_top_device())
            .collect(),
        units: AVERAGE_UNITS,
    })
}

pub async fn compare_summary(
    store: &dyn ReadingStore,
    config: &ReportConfig,
    params: &ReportParams,
    now: DateTime<Utc>,
) -> Result<CompareSummary> {
    let rows = fetch_window(store, config, params, DefaultWindow::CompareSummary, now).await?;

    let by_device: Vec<_> = rank(group_by_device(&rows))
        .iter()
        .map(|d| d.to_average())
        .collect();
    let ranking = by_device.iter().take(COMPARE_RANKING).cloned().collect();

    Ok(CompareSummary {
        by_room: group_by_room(&rows),
        by_device,
        ranking,
        units: AVERAGE_UNITS,
    })
}

pub async fn heatmap_report(
    store: &dyn ReadingStore,
    config: &ReportConfig,
    params: &ReportParams,
    now: DateTime<Utc>,
) -> Result<HeatmapResponse> {
    let rows = fetch_window(store, config, params, DefaultWindow::Heatmap, now).await?;
    Ok(HeatmapResponse {
        heatmap: heatmap(&rows, config.timezone),
        units: HEATMAP_UNITS,
    })
}

/// Recent samples at or above the alert threshold. Room/device filters do not
/// apply here.
pub async fn alerts_report(
    store: &dyn ReadingStore,
    params: &ReportParams,
    now: DateTime<Utc>,
) -> Result<AlertsResponse> {
    let cutoff = alert_cutoff(now, params.since_hours);
    let query = LogQuery {
        min_watts: Some(params.threshold),
        order: SortOrder::NewestFirst,
        limit: Some(ALERT_LIMIT),
        ..LogQuery::since(cutoff)
    };
    let rows = store.fetch_logs(&query).await?;
    Ok(AlertsResponse {
        alerts: scan(&rows, params.threshold, cutoff),
    })
}

pub async fn suggestions_report(
    store: &dyn ReadingStore,
    now: DateTime<Utc>,
) -> Result<SuggestionsResponse> {
    let rows = store
        .fetch_logs(&LogQuery::since(now - suggestion_window()))
        .await?;
    Ok(SuggestionsResponse {
        suggestions: suggest(&rows),
    })
}
