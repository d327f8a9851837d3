use crate::config::ReportConfig;
use crate::errors::Error;
use crate::metrics::{observe_report, INVALID_READINGS_TOTAL, READINGS_TOTAL, VALID_READINGS_TOTAL};
use crate::model::{
    AlertsResponse, CompareSummary, DeviceLogsResponse, DevicesResponse, HeatmapResponse, Reading,
    StatusResponse, SuggestionsResponse, ToggleResponse, UsageSummary,
};
use crate::params::ReportParams;
use crate::report;
use crate::store::{ReadingStore, DEVICE_LOG_LIMIT};
use crate::validate::validate;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub config: ReportConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/usage/summary/", get(usage_summary))
        .route("/api/compare/summary/", get(compare_summary))
        .route("/api/heatmap/", get(heatmap))
        .route("/api/notifications/", get(notifications))
        .route("/api/suggestions/", get(suggestions))
        .route("/api/devices/", get(list_devices))
        .route("/api/toggle/:device_id/", post(toggle_device))
        .route("/api/reading/", post(post_reading))
        .route("/api/logs/:device_id/", get(device_logs))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn usage_summary(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<UsageSummary>, AppError> {
    let _timer = observe_report("usage_summary");
    let params = ReportParams::from_query(query.as_deref());
    let summary =
        report::usage_summary(state.store.as_ref(), &state.config, &params, Utc::now()).await?;
    Ok(Json(summary))
}

async fn compare_summary(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<CompareSummary>, AppError> {
    let _timer = observe_report("compare_summary");
    let params = ReportParams::from_query(query.as_deref());
    let summary =
        report::compare_summary(state.store.as_ref(), &state.config, &params, Utc::now()).await?;
    Ok(Json(summary))
}

async fn heatmap(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<HeatmapResponse>, AppError> {
    let _timer = observe_report("heatmap");
    let params = ReportParams::from_query(query.as_deref());
    let heatmap =
        report::heatmap_report(state.store.as_ref(), &state.config, &params, Utc::now()).await?;
    Ok(Json(heatmap))
}

async fn notifications(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<AlertsResponse>, AppError> {
    let _timer = observe_report("notifications");
    let params = ReportParams::from_query(query.as_deref());
    let alerts = report::alerts_report(state.store.as_ref(), &params, Utc::now()).await?;
    Ok(Json(alerts))
}

async fn suggestions(State(state): State<AppState>) -> Result<Json<SuggestionsResponse>, AppError> {
    let _timer = observe_report("suggestions");
    let suggestions = report::suggestions_report(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(suggestions))
}

async fn list_devices(State(state): State<AppState>) -> Result<Json<DevicesResponse>, AppError> {
    let devices = state.store.list_devices().await?;
    Ok(Json(DevicesResponse { devices }))
}

async fn toggle_device(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
) -> Result<Json<ToggleResponse>, AppError> {
    let device = state.store.toggle_device(device_id, Utc::now()).await?;
    debug!(device_id, is_on = device.is_on, "toggled device");
    Ok(Json(ToggleResponse {
        id: device.id,
        is_on: device.is_on,
    }))
}

async fn post_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, AppError> {
    READINGS_TOTAL.inc();

    let reading = serde_json::from_slice::<Reading>(&body)
        .map_err(|_| AppError::bad_request("Invalid JSON"))
        .and_then(|reading| {
            validate(&reading).map_err(AppError::from)?;
            Ok(reading)
        })
        .inspect_err(|_| INVALID_READINGS_TOTAL.inc())?;

    state
        .store
        .record(reading.device_id, reading.power_watts, Utc::now())
        .await?;
    VALID_READINGS_TOTAL.inc();

    Ok(Json(StatusResponse { status: "ok" }))
}

async fn device_logs(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
) -> Result<Json<DeviceLogsResponse>, AppError> {
    let (device, logs) = state.store.device_logs(device_id, DEVICE_LOG_LIMIT).await?;
    Ok(Json(DeviceLogsResponse {
        device: device.name,
        logs,
    }))
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::DeviceNotFound(id) => {
                warn!(device_id = id, "device not found");
                Self {
                    status: StatusCode::NOT_FOUND,
                    message: "Device not found".to_string(),
                }
            }
            Error::Validation(message) => Self::bad_request(message),
            Error::Json(_) => Self::bad_request("Invalid JSON"),
            other => {
                error!(error = %other, "API error");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn create_test_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
            config: ReportConfig::default(),
        };
        (create_router(state), store)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post(app: Router, uri: &str, body: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_post_reading_updates_device() {
        let (app, store) = create_test_app().await;
        let device = store.add_device("Fridge", Some("Kitchen")).await;

        let body = format!(r#"{{"device_id": {}, "power_watts": 150.0}}"#, device.id);
        assert_eq!(post(app.clone(), "/api/reading/", &body).await, StatusCode::OK);

        let (status, json) = get_json(app, "/api/devices/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["devices"][0]["is_on"], true);
        assert_eq!(json["devices"][0]["recent_logs"][0]["power_watts"], 150.0);
    }

    #[tokio::test]
    async fn test_post_reading_rejects_bad_input() {
        let (app, store) = create_test_app().await;
        let device = store.add_device("Fridge", None).await;

        assert_eq!(post(app.clone(), "/api/reading/", "not json").await, StatusCode::BAD_REQUEST);
        assert_eq!(
            post(app.clone(), "/api/reading/", r#"{"device_id": 1}"#).await,
            StatusCode::BAD_REQUEST
        );
        let negative = format!(r#"{{"device_id": {}, "power_watts": -4}}"#, device.id);
        assert_eq!(post(app.clone(), "/api/reading/", &negative).await, StatusCode::BAD_REQUEST);
        assert_eq!(
            post(app, "/api/reading/", r#"{"device_id": 404, "power_watts": 3}"#).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_toggle_and_logs() {
        let (app, store) = create_test_app().await;
        let device = store.add_device("Lamp", Some("Bedroom")).await;
        store.record(device.id, 40.0, Utc::now()).await.unwrap();

        assert_eq!(
            post(app.clone(), &format!("/api/toggle/{}/", device.id), "").await,
            StatusCode::OK
        );
        assert_eq!(post(app.clone(), "/api/toggle/999/", "").await, StatusCode::NOT_FOUND);

        let (status, json) = get_json(app, &format!("/api/logs/{}/", device.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["device"], "Lamp");
        assert_eq!(json["logs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_summary_end_to_end() {
        let (app, store) = create_test_app().await;
        let a = store.add_device("A", Some("Kitchen")).await;
        let b = store.add_device("B", Some("")).await;
        let t0 = Utc::now() - Duration::hours(3);
        store.record(a.id, 100.0, t0).await.unwrap();
        store.record(b.id, 50.0, t0).await.unwrap();

        let (status, json) = get_json(app, "/api/compare/summary/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["by_room"][0]["room"], "Kitchen");
        assert_eq!(json["by_room"][0]["avg_power"], 100.0);
        assert_eq!(json["by_room"][1]["room"], "Unassigned");
        assert_eq!(json["by_room"][1]["avg_power"], 50.0);
        assert_eq!(json["units"], "W (average)");
    }

    #[tokio::test]
    async fn test_usage_summary_filters_by_device() {
        let (app, store) = create_test_app().await;
        let a = store.add_device("A", Some("Kitchen")).await;
        let b = store.add_device("B", Some("Garage")).await;
        let t0 = Utc::now() - Duration::hours(3);
        store.record(a.id, 100.0, t0).await.unwrap();
        store.record(b.id, 50.0, t0).await.unwrap();

        let uri = format!("/api/usage/summary/?device={}&start=bogus", b.id);
        let (status, json) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        let top = json["top_devices"].as_array().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0]["name"], "B");
        assert_eq!(json["daily"][0]["value"], 50.0);
    }

    #[tokio::test]
    async fn test_notifications_and_suggestions() {
        let (app, store) = create_test_app().await;
        let heater = store.add_device("Heater", Some("Bedroom")).await;
        store
            .record(heater.id, 300.0, Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let (status, json) = get_json(app.clone(), "/api/notifications/?threshold=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["alerts"][0]["device"], "Heater");
        assert_eq!(json["alerts"][0]["action"], "Consider turning off or reducing usage");

        let (status, json) = get_json(app, "/api/suggestions/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["suggestions"][0]["expected_savings_rs"], 432.0);
    }

    #[tokio::test]
    async fn test_heatmap_empty() {
        let (app, _store) = create_test_app().await;
        let (status, json) = get_json(app, "/api/heatmap/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["heatmap"].as_array().unwrap().len(), 0);
        assert_eq!(json["units"], "W (avg)");
    }
}
