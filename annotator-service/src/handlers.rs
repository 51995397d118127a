//! HTTP request handlers for the annotation service.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

use annotator::{query, AnnotatorError};

use crate::AppState;

/// Body of `POST /nodelist`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct NodeListRequest {
    /// Ordered node ids of the route.
    pub nodes: Vec<i64>,
}

/// Body of `POST /coordlist`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CoordListRequest {
    /// Ordered `[lon, lat]` pairs of the route.
    pub coordinates: Vec<Vec<f64>>,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Whether the extract has finished loading.
    pub ready: bool,
}

/// Service statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Annotation requests that reached the engine.
    pub requests: u64,
    /// Requests rejected because the route could not be resolved.
    pub resolution_failures: u64,
    /// Distinct way lookups performed.
    pub ways_fetched: u64,
    /// Way lookups that failed and were returned as `null`.
    pub fetch_failures: u64,
    /// Fraction of way lookups that failed (0.0 to 1.0).
    pub fetch_failure_rate: f64,
}

/// Annotate a route given as a JSON node id list.
///
/// # Returns
///
/// - `200 OK` with the configured node response shape
/// - `400 Bad Request` (empty body) if the list is invalid or the route
///   cannot be resolved
#[utoipa::path(
    post,
    path = "/nodelist",
    tag = "annotation",
    request_body = NodeListRequest,
    responses(
        (status = 200, description = "Way tags for every position of the route"),
        (status = 400, description = "Invalid node list or unresolvable route")
    )
)]
pub async fn post_nodelist(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let nodes = match query::from_body(&body, query::NODES_KEY)
        .and_then(|payload| query::validate_nodes(&payload))
    {
        Ok(nodes) => nodes,
        Err(e) => return reject("/nodelist", e),
    };
    annotate_nodes(&state, "/nodelist", nodes).await
}

/// Annotate a route given as comma-separated node ids in the path.
#[utoipa::path(
    get,
    path = "/nodelist/{nodelist}",
    tag = "annotation",
    params(("nodelist" = String, Path, description = "Comma-separated node ids, e.g. `1,2,3`")),
    responses(
        (status = 200, description = "Way tags for every position of the route"),
        (status = 400, description = "Invalid node list or unresolvable route")
    )
)]
pub async fn get_nodelist(
    State(state): State<Arc<AppState>>,
    Path(nodelist): Path<String>,
) -> Response {
    match query::parse_node_path(&nodelist) {
        Ok(nodes) => annotate_nodes(&state, "/nodelist/:nodelist", nodes).await,
        Err(e) => reject("/nodelist/:nodelist", e),
    }
}

/// Annotate a route given as a JSON coordinate list.
///
/// Always answers with the full-tags shape.
#[utoipa::path(
    post,
    path = "/coordlist",
    tag = "annotation",
    request_body = CoordListRequest,
    responses(
        (status = 200, description = "Deduplicated way tags for the route"),
        (status = 400, description = "Invalid coordinate list or unresolvable route")
    )
)]
pub async fn post_coordlist(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let coords = match query::from_body(&body, query::COORDINATES_KEY)
        .and_then(|payload| query::validate_coordinates(&payload))
    {
        Ok(coords) => coords,
        Err(e) => return reject("/coordlist", e),
    };
    annotate_coordinates(&state, "/coordlist", coords).await
}

/// Annotate a route given as `lon,lat;lon,lat` in the path.
#[utoipa::path(
    get,
    path = "/coordlist/{coordlist}",
    tag = "annotation",
    params(("coordlist" = String, Path, description = "Semicolon-separated `lon,lat` pairs")),
    responses(
        (status = 200, description = "Deduplicated way tags for the route"),
        (status = 400, description = "Invalid coordinate list or unresolvable route")
    )
)]
pub async fn get_coordlist(
    State(state): State<Arc<AppState>>,
    Path(coordlist): Path<String>,
) -> Response {
    match query::parse_coordinate_path(&coordlist) {
        Ok(coords) => annotate_coordinates(&state, "/coordlist/:coordlist", coords).await,
        Err(e) => reject("/coordlist/:coordlist", e),
    }
}

async fn annotate_nodes(state: &AppState, route: &'static str, nodes: Vec<i64>) -> Response {
    let start = Instant::now();
    let elements = nodes.len();

    match state.annotator.annotate_nodes(nodes).await {
        Ok(annotation) => {
            tracing::info!(
                route = route,
                elements = elements,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Route annotated"
            );
            (StatusCode::OK, Json(annotation)).into_response()
        }
        Err(e) => reject(route, e),
    }
}

async fn annotate_coordinates(
    state: &AppState,
    route: &'static str,
    coords: Vec<(f64, f64)>,
) -> Response {
    let start = Instant::now();
    let elements = coords.len();

    match state.annotator.annotate_coordinates(coords).await {
        Ok(response) => {
            tracing::info!(
                route = route,
                elements = elements,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Route annotated"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => reject(route, e),
    }
}

/// Reject a request with an empty `400`; the detail only goes to the log.
fn reject(route: &'static str, e: AnnotatorError) -> Response {
    if e.is_client_error() {
        tracing::warn!(route = route, error = %e, "Annotation request rejected");
    } else {
        tracing::error!(route = route, error = %e, "Annotation request failed");
    }
    StatusCode::BAD_REQUEST.into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: state.annotator.is_ready(),
    })
}

/// Get service statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Request and lookup counters", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.annotator.stats();

    Json(StatsResponse {
        requests: stats.requests,
        resolution_failures: stats.resolution_failures,
        ways_fetched: stats.ways_fetched,
        fetch_failures: stats.fetch_failures,
        fetch_failure_rate: stats.fetch_failure_rate(),
    })
}
