//! Thin HTTP surface over the collector and store.
//!
//! Handlers decode requests, call into [`Collector`]/[`StorageBackend`], and
//! encode the result. No business logic lives here.

pub mod metrics_text;

use crate::collector::Collector;
use crate::core::{ServiceName, Span, Trace, UrpoError};
use crate::storage::{Query, StorageBackend};
use axum::{
    extract::{Path, Query as AxumQuery, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::CorsLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub collector: Arc<Collector>,
    pub storage: Arc<dyn StorageBackend>,
}

/// Builds the router for the full HTTP surface, with permissive CORS applied.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/spans", post(submit_span))
        .route("/api/v1/spans/batch", post(submit_batch))
        .route("/api/v1/traces/:id", get(get_trace))
        .route("/api/v1/traces", get(find_traces))
        .route("/api/v1/services", get(list_services))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for UrpoError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            UrpoError::DecodeError(_) | UrpoError::InvalidSpan(_) | UrpoError::Parse { .. } => {
                StatusCode::BAD_REQUEST
            }
            UrpoError::TraceNotFound(_) | UrpoError::NotFound(_) => StatusCode::NOT_FOUND,
            UrpoError::Backpressure => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct AcceptedBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchResultBody {
    accepted: usize,
    failed: usize,
    total: usize,
}

/// POST /api/v1/spans
async fn submit_span(
    State(state): State<ApiState>,
    Json(span): Json<Span>,
) -> std::result::Result<impl IntoResponse, UrpoError> {
    state.collector.submit(span)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedBody { status: "accepted" })))
}

/// POST /api/v1/spans/batch
async fn submit_batch(
    State(state): State<ApiState>,
    Json(spans): Json<Vec<Span>>,
) -> impl IntoResponse {
    let total = spans.len();
    let mut accepted = 0usize;
    let mut failed = 0usize;
    for span in spans {
        match state.collector.submit(span) {
            Ok(()) => accepted += 1,
            Err(_) => failed += 1,
        }
    }

    let status = if failed == 0 {
        StatusCode::ACCEPTED
    } else {
        StatusCode::PARTIAL_CONTENT
    };
    (
        status,
        Json(BatchResultBody {
            accepted,
            failed,
            total,
        }),
    )
}

/// GET /api/v1/traces/{id}
async fn get_trace(
    State(state): State<ApiState>,
    Path(trace_id): Path<String>,
) -> std::result::Result<Json<Trace>, UrpoError> {
    if trace_id.is_empty() {
        return Err(UrpoError::decode("trace id is required"));
    }
    match state.storage.get_trace(&trace_id).await? {
        Some(trace) => Ok(Json(trace)),
        None => Err(UrpoError::TraceNotFound(trace_id)),
    }
}

/// Raw query-string parameters accepted by `GET /api/v1/traces`.
#[derive(Debug, Deserialize, Default)]
struct TraceFilters {
    service: Option<String>,
    min_duration: Option<String>,
    max_duration: Option<String>,
    min_cost: Option<f64>,
    max_cost: Option<f64>,
    start_time: Option<String>,
    end_time: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// Builds a [`Query`] from raw filters. Unparseable values are silently
/// dropped rather than rejected, per the documented query-param contract.
fn query_from_filters(filters: &TraceFilters) -> Query {
    let mut query = Query::new();
    if let Some(service) = filters
        .service
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| ServiceName::new(s.to_string()).ok())
    {
        query.service = Some(service);
    }
    query.min_duration = filters
        .min_duration
        .as_deref()
        .and_then(|s| humantime::parse_duration(s).ok());
    query.max_duration = filters
        .max_duration
        .as_deref()
        .and_then(|s| humantime::parse_duration(s).ok());
    query.min_cost = filters.min_cost;
    query.max_cost = filters.max_cost;
    if let Some(start) = filters.start_time.as_deref().and_then(parse_rfc3339) {
        query.start_time = Some(start);
    }
    if let Some(end) = filters.end_time.as_deref().and_then(parse_rfc3339) {
        query.end_time = Some(end);
    }
    if let Some(limit) = filters.limit {
        query.limit = limit;
    }
    if let Some(offset) = filters.offset {
        query.offset = offset;
    }
    query
}

fn parse_rfc3339(s: &str) -> Option<SystemTime> {
    humantime::parse_rfc3339(s).ok()
}

#[derive(Debug, Serialize)]
struct FindTracesBody {
    traces: Vec<Trace>,
    total: usize,
    query: HashMap<String, String>,
}

/// GET /api/v1/traces
async fn find_traces(
    State(state): State<ApiState>,
    AxumQuery(filters): AxumQuery<TraceFilters>,
) -> std::result::Result<Json<FindTracesBody>, UrpoError> {
    let mut echoed = HashMap::new();
    if let Some(s) = &filters.service {
        echoed.insert("service".to_string(), s.clone());
    }
    if let Some(s) = &filters.min_duration {
        echoed.insert("min_duration".to_string(), s.clone());
    }
    if let Some(s) = &filters.max_duration {
        echoed.insert("max_duration".to_string(), s.clone());
    }

    let query = query_from_filters(&filters);
    let traces = state.storage.find(&query).await?;
    let total = traces.len();
    Ok(Json(FindTracesBody {
        traces,
        total,
        query: echoed,
    }))
}

#[derive(Debug, Serialize)]
struct ServicesBody {
    services: Vec<String>,
    total: usize,
}

/// GET /api/v1/services
async fn list_services(
    State(state): State<ApiState>,
) -> std::result::Result<Json<ServicesBody>, UrpoError> {
    let services = state.storage.get_services().await?;
    let total = services.len();
    Ok(Json(ServicesBody { services, total }))
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    spans_received: u64,
    spans_stored: u64,
    span_errors: u64,
}

/// GET /health
async fn health(State(state): State<ApiState>) -> Json<HealthBody> {
    let m = state.collector.metrics();
    Json(HealthBody {
        status: "healthy",
        spans_received: m.received,
        spans_stored: m.stored,
        span_errors: m.errors,
    })
}

/// GET /metrics
async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let m = state.collector.metrics();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics_text::render(m),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_filters_parses_duration_literals() {
        let filters = TraceFilters {
            min_duration: Some("50ms".to_string()),
            max_duration: Some("1s".to_string()),
            ..Default::default()
        };
        let query = query_from_filters(&filters);
        assert_eq!(query.min_duration, Some(std::time::Duration::from_millis(50)));
        assert_eq!(query.max_duration, Some(std::time::Duration::from_secs(1)));
    }

    #[test]
    fn test_query_from_filters_ignores_unparseable_values() {
        let filters = TraceFilters {
            min_duration: Some("not-a-duration".to_string()),
            ..Default::default()
        };
        let query = query_from_filters(&filters);
        assert!(query.min_duration.is_none());
    }

    #[test]
    fn test_query_from_filters_empty_service_is_unset() {
        let filters = TraceFilters {
            service: Some(String::new()),
            ..Default::default()
        };
        let query = query_from_filters(&filters);
        assert!(query.service.is_none());
    }

    #[test]
    fn test_error_into_response_status_codes() {
        assert_eq!(
            UrpoError::Backpressure.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            UrpoError::TraceNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UrpoError::decode("bad json").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
