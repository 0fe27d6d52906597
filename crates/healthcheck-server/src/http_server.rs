//! HTTP API: health-check CRUD, snapshots and the Prometheus endpoint.

use crate::metrics::MetricsRegistry;
use crate::registry::CheckRegistry;
use crate::snapshot::SnapshotPublisher;
use crate::types::{CheckView, StatusSummary};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use healthcheck::{CheckId, CheckSpec};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// State shared by all handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<CheckRegistry>,
    pub publisher: Arc<SnapshotPublisher>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

/// Response body for the check list
#[derive(Debug, Serialize)]
pub struct CheckList {
    pub checks: Vec<CheckView>,
    pub summary: StatusSummary,
}

/// Error body returned for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Maps domain errors onto HTTP responses
pub struct ApiError(common::Error);

impl From<common::Error> for ApiError {
    fn from(e: common::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let (status, message) = match kind {
            "invalid_definition" => (StatusCode::BAD_REQUEST, Some(self.0.to_string())),
            "not_found" => (StatusCode::NOT_FOUND, None),
            _ => {
                error!(error = %self.0, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}

/// Build the API router
pub fn router(state: ApiState) -> Router {
    let mut app = Router::new()
        .route("/api/health-checks", get(list_checks).post(create_check))
        .route(
            "/api/health-checks/:id",
            get(get_check).put(update_check).delete(delete_check),
        )
        .route("/api/metrics", get(system_metrics))
        .route("/api/snapshot", get(snapshot));

    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// HTTP server for the API
pub struct ApiServer {
    state: ApiState,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(state: ApiState, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Serve until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> common::Result<()> {
        let app = router(self.state);

        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Decode a check body; shape errors are invalid definitions, not 422s
fn parse_spec(body: serde_json::Value) -> Result<CheckSpec, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError(common::Error::invalid(e.to_string())))
}

async fn list_checks(State(state): State<ApiState>) -> Json<CheckList> {
    let checks = state.publisher.views().await;
    let summary = StatusSummary::from_views(&checks);
    Json(CheckList { checks, summary })
}

async fn create_check(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<CheckView>), ApiError> {
    let id = state.registry.create(parse_spec(body)?).await?;
    let view = state.publisher.check(id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_check(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Result<Json<CheckView>, ApiError> {
    Ok(Json(state.publisher.check(CheckId(id)).await?))
}

async fn update_check(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<CheckView>, ApiError> {
    state.registry.update(CheckId(id), parse_spec(body)?).await?;
    Ok(Json(state.publisher.check(CheckId(id)).await?))
}

async fn delete_check(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(CheckId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn system_metrics(State(state): State<ApiState>) -> Response {
    match state.publisher.system_metrics().await {
        Some(metrics) => Json(metrics).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn snapshot(State(state): State<ApiState>) -> Response {
    Json(state.publisher.snapshot().await).into_response()
}

/// Handler for /metrics endpoint
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let Some(registry) = state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    registry.update_checks_by_status(&state.publisher.summary().await);

    match registry.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
