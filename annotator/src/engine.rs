//! Boundary to the routing/annotation engine.
//!
//! The engine owns the loaded extract and answers two kinds of questions:
//! which ways a route passes through, and which tags a way carries. Its
//! calls are blocking, so the async layers above run them on the blocking
//! pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{AnnotatorError, Result};
use crate::query::RouteQuery;
use crate::way::{LonLat, NodeId, TagRecord, WayId};

/// A loaded extract that can resolve routes and look up way tags.
///
/// Implementations must be safe for concurrent reads once
/// [`is_ready`](RouteEngine::is_ready) returns `true`.
pub trait RouteEngine: Send + Sync {
    /// Whether the extract has finished loading.
    fn is_ready(&self) -> bool;

    /// Resolve a node id route into one way id per node.
    ///
    /// The result has the same length as `nodes`; `None` marks positions
    /// that did not resolve to a way.
    fn resolve_node_ids(&self, nodes: &[NodeId]) -> Result<Vec<Option<WayId>>>;

    /// Resolve a coordinate route into one way id per coordinate.
    fn resolve_coordinates(&self, coords: &[LonLat]) -> Result<Vec<Option<WayId>>>;

    /// Look up the tags of a single way.
    fn tags_for_way(&self, way_id: WayId) -> Result<TagRecord>;
}

/// Resolve a validated route with one engine call.
///
/// The call holds a permit from `permits` until the engine returns, so it
/// counts against the same bound as the tag lookups. The deadline covers the
/// wait for a permit.
///
/// Every failure, including an unloaded extract, a timeout or a result of
/// the wrong length, is reported as [`AnnotatorError::ResolutionFailed`].
/// There are no partial results.
pub async fn resolve_route(
    engine: Arc<dyn RouteEngine>,
    query: RouteQuery,
    permits: Arc<Semaphore>,
    timeout: Duration,
) -> Result<Vec<Option<WayId>>> {
    if !engine.is_ready() {
        return Err(AnnotatorError::resolution("extract not loaded"));
    }

    let expected = query.len();
    if expected == 0 {
        return Ok(Vec::new());
    }

    let ways = match tokio::time::timeout(timeout, run_resolve(engine, permits, query)).await {
        Err(_) => {
            return Err(AnnotatorError::resolution(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )))
        }
        Ok(Err(e @ AnnotatorError::ResolutionFailed { .. })) => return Err(e),
        Ok(Err(e)) => return Err(AnnotatorError::resolution(e.to_string())),
        Ok(Ok(ways)) => ways,
    };

    if ways.len() != expected {
        return Err(AnnotatorError::resolution(format!(
            "engine returned {} way ids for {} route elements",
            ways.len(),
            expected
        )));
    }

    Ok(ways)
}

async fn run_resolve(
    engine: Arc<dyn RouteEngine>,
    permits: Arc<Semaphore>,
    query: RouteQuery,
) -> Result<Vec<Option<WayId>>> {
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|e| AnnotatorError::resolution(e.to_string()))?;

    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        match &query {
            RouteQuery::Nodes(nodes) => engine.resolve_node_ids(nodes),
            RouteQuery::Coordinates(coords) => engine.resolve_coordinates(coords),
        }
    });

    task.await.map_err(|join_error| {
        AnnotatorError::resolution(format!("engine task failed: {join_error}"))
    })?
}
