//! HTTP routes for the scheduler

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rainbow_core::{HashMethod, Query, QueryId};
use serde::{Deserialize, Serialize};

use crate::dispatcher::StatusSnapshot;
use crate::error::{Result, ServerError};
use crate::event::DispatcherHandle;
use crate::transport::worker_socket;

/// State shared by every route
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: DispatcherHandle,
    /// Present when a Prometheus recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    /// Lowercase hex digest to search for
    pub target: String,
    #[serde(default)]
    pub method: HashMethod,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub query_id: QueryId,
    pub target: String,
    pub method: HashMethod,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusSnapshot>> {
    Ok(Json(state.dispatcher.status().await?))
}

/// Start a query; the search runs in the background
async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<(StatusCode, Json<QueryResponse>)> {
    Query::validate_target(&req.target, req.method)?;
    let query = state.dispatcher.request_query(req.target, req.method).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(QueryResponse {
            query_id: query.id,
            target: query.target,
            method: query.method,
        }),
    ))
}

async fn stop(State(state): State<AppState>) -> Result<StatusCode> {
    state.dispatcher.stop_query().await?;
    Ok(StatusCode::ACCEPTED)
}

async fn render_metrics(State(state): State<AppState>) -> Result<String> {
    let handle = state.metrics.as_ref().ok_or(ServerError::MetricsDisabled)?;
    Ok(handle.render())
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/query", post(query))
        .route("/stop", post(stop))
        .route("/metrics", get(render_metrics))
        .route("/worker", get(worker_socket))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults_to_md5() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"target":"098f6bcd4621d373cade4e832627b4f6"}"#).unwrap();
        assert_eq!(req.method, HashMethod::Md5);

        let req: QueryRequest = serde_json::from_str(r#"{"target":"ab","method":"sha1"}"#).unwrap();
        assert_eq!(req.method, HashMethod::Sha1);
    }
}
