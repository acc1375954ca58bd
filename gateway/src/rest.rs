use crate::connectivity::HostProbe;
use crate::db::{self, PgLinkStore};
use crate::metrics::{
    LINK_CANCELLED_TOTAL, LINK_EXHAUSTED_TOTAL, LINK_INVALID_TOTAL, LINK_LATENCY_SECONDS,
    LINK_REJECTED_TOTAL, LINK_REQUESTS_TOTAL, LINK_SUCCESS_TOTAL, SERIES_CACHE_HITS_TOTAL,
    SERIES_CACHE_MISSES_TOTAL,
};
use crate::model::{DeviceLink, LinkResponse, Metric, SensorReading, SeriesResponse};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use telemetry::{
    downsample, CancelSignal, DeviceLinkRequest, DeviceLinker, LinkError, SeriesCache,
    TimeSeriesPoint,
};
use tracing::{debug, error, warn};

const DEFAULT_THRESHOLD: usize = 500;

pub type Linker = DeviceLinker<HostProbe, PgLinkStore>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    device_id: String,
    metric: Metric,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

pub type ReadingsCache = SeriesCache<SeriesKey, Arc<Vec<SensorReading>>>;

#[derive(Clone)]
pub struct AppState {
    pub linker: Arc<Linker>,
    pub series_cache: Arc<ReadingsCache>,
    /// Fires on shutdown so pending link retries stop
    pub shutdown: CancelSignal,
    pub max_threshold: usize,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    device_id: String,
    metric: Metric,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    threshold: Option<usize>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/devices/link", post(link_device))
        .route("/api/v1/users/:user_id/devices", get(list_devices))
        .route("/api/v1/telemetry/series", get(get_series))
        .with_state(state)
}

async fn link_device(
    State(state): State<AppState>,
    body: Result<Json<DeviceLinkRequest>, JsonRejection>,
) -> (StatusCode, Json<LinkResponse<DeviceLink>>) {
    LINK_REQUESTS_TOTAL.inc();
    let start = Instant::now();

    // Undecodable bodies get the same answer as failed validation
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Malformed link request: {}", rejection.body_text());
            LINK_INVALID_TOTAL.inc();
            return (
                StatusCode::BAD_REQUEST,
                Json(LinkResponse::from(Err::<DeviceLink, _>(LinkError::InvalidInput))),
            );
        }
    };

    let result = state
        .linker
        .link_device_with_cancel(&request, &state.shutdown)
        .await;

    LINK_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

    let status = match &result {
        Ok(_) => {
            LINK_SUCCESS_TOTAL.inc();
            StatusCode::OK
        }
        Err(LinkError::InvalidInput) => {
            LINK_INVALID_TOTAL.inc();
            StatusCode::BAD_REQUEST
        }
        Err(LinkError::Rejected(_)) => {
            LINK_REJECTED_TOTAL.inc();
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Err(LinkError::Exhausted) => {
            LINK_EXHAUSTED_TOTAL.inc();
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(LinkError::Cancelled) => {
            LINK_CANCELLED_TOTAL.inc();
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(result.into()))
}

async fn list_devices(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DeviceLink>>, AppError> {
    let links = state.linker.store().links_for_user(&user_id).await?;
    Ok(Json(links))
}

async fn get_series(
    State(state): State<AppState>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, AppError> {
    let threshold = params
        .threshold
        .unwrap_or(DEFAULT_THRESHOLD)
        .min(state.max_threshold);
    let metric = params.metric;

    let key = SeriesKey {
        device_id: params.device_id.clone(),
        metric,
        start: params.start,
        end: params.end,
    };

    let readings = match state.series_cache.get(&key) {
        Some(cached) => {
            SERIES_CACHE_HITS_TOTAL.inc();
            cached
        }
        None => {
            SERIES_CACHE_MISSES_TOTAL.inc();
            let fetched = db::fetch_readings(
                state.linker.store().pool(),
                &params.device_id,
                params.start,
                params.end,
            )
            .await
            .map_err(|e| {
                error!("Database error: {}", e);
                AppError(anyhow::anyhow!("Database query failed: {}", e))
            })?;
            let fetched = Arc::new(fetched);
            state.series_cache.insert(key, fetched.clone());
            fetched
        }
    };

    let points = series_points(&readings, metric, threshold);
    let total = readings.iter().filter(|r| metric.value(r).is_some()).count();
    debug!(
        "Serving {} of {} {:?} points for device {}",
        points.len(),
        total,
        metric,
        params.device_id
    );

    Ok(Json(SeriesResponse {
        device_id: params.device_id,
        metric,
        threshold,
        total,
        points,
    }))
}

/// Readings carrying `metric`, reduced to `threshold` points
fn series_points(readings: &[SensorReading], metric: Metric, threshold: usize) -> Vec<TimeSeriesPoint> {
    let present: Vec<SensorReading> = readings
        .iter()
        .filter(|r| metric.value(r).is_some())
        .cloned()
        .collect();

    downsample(&present, threshold, |r| metric.value(r).unwrap_or_default())
        .into_iter()
        .filter_map(|r| {
            metric.value(&r).map(|value| TimeSeriesPoint {
                timestamp: r.timestamp,
                value,
            })
        })
        .collect()
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
