//! Integration tests for the HTTP API.

use std::collections::BTreeMap;
use std::sync::Arc;

use annotator::snapshot::{SnapshotNode, SnapshotWay};
use annotator::{
    AnnotatorError, AnnotatorServiceBuilder, IndexMode, LonLat, NodeId, NodeShape, RouteEngine,
    SnapshotEngine, TagRecord, TagValue, WayId,
};
use annotator_service::{router, AppState};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A small street grid:
///
/// ```text
/// 1 --10-- 2 --10-- 3 --11-- 4
///                   |
///                  12
///                   |
///                   5
/// ```
fn test_nodes() -> Vec<SnapshotNode> {
    [
        (1, 13.0, 52.0),
        (2, 13.1, 52.0),
        (3, 13.2, 52.0),
        (4, 13.3, 52.0),
        (5, 13.2, 51.9),
    ]
    .into_iter()
    .map(|(id, lon, lat)| SnapshotNode { id, lon, lat })
    .collect()
}

fn way(id: u64, nodes: &[NodeId], tags: &[(&str, TagValue)]) -> SnapshotWay {
    SnapshotWay {
        id,
        nodes: nodes.to_vec(),
        tags: tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn test_ways() -> Vec<SnapshotWay> {
    vec![
        way(10, &[1, 2, 3], &[("name", "Main St".into()), ("maxspeed", "50".into())]),
        way(11, &[3, 4], &[("name", "Oak Ave".into()), ("tunnel", true.into())]),
        way(
            12,
            &[3, 5],
            &[
                ("name", "Bridge Rd".into()),
                ("bridge", "yes".into()),
                ("maxspeed:conditional", "30 @ (22:00-06:00)".into()),
            ],
        ),
    ]
}

fn test_engine() -> SnapshotEngine {
    SnapshotEngine::from_parts(test_nodes(), test_ways(), None)
}

fn create_test_server_with(
    engine: Arc<dyn RouteEngine>,
    mode: IndexMode,
    shape: NodeShape,
) -> TestServer {
    let annotator = AnnotatorServiceBuilder::new("unused")
        .index_mode(mode)
        .node_shape(shape)
        .build_with_engine(engine);
    let state = Arc::new(AppState { annotator });

    TestServer::new(router(state)).unwrap()
}

fn create_test_server() -> TestServer {
    create_test_server_with(Arc::new(test_engine()), IndexMode::Skip, NodeShape::Tags)
}

/// Engine that fails tag lookups for one way.
struct FlakyEngine {
    inner: SnapshotEngine,
    broken: WayId,
}

impl RouteEngine for FlakyEngine {
    fn is_ready(&self) -> bool {
        true
    }

    fn resolve_node_ids(&self, nodes: &[NodeId]) -> annotator::Result<Vec<Option<WayId>>> {
        self.inner.resolve_node_ids(nodes)
    }

    fn resolve_coordinates(&self, coords: &[LonLat]) -> annotator::Result<Vec<Option<WayId>>> {
        self.inner.resolve_coordinates(coords)
    }

    fn tags_for_way(&self, way_id: WayId) -> annotator::Result<TagRecord> {
        if way_id == self.broken {
            return Err(AnnotatorError::TagFetchFailed {
                way_id,
                reason: "broken".to_string(),
            });
        }
        self.inner.tags_for_way(way_id)
    }
}

/// Engine whose extract never finishes loading.
struct LoadingEngine;

impl RouteEngine for LoadingEngine {
    fn is_ready(&self) -> bool {
        false
    }

    fn resolve_node_ids(&self, _nodes: &[NodeId]) -> annotator::Result<Vec<Option<WayId>>> {
        Err(AnnotatorError::NotReady)
    }

    fn resolve_coordinates(&self, _coords: &[LonLat]) -> annotator::Result<Vec<Option<WayId>>> {
        Err(AnnotatorError::NotReady)
    }

    fn tags_for_way(&self, _way_id: WayId) -> annotator::Result<TagRecord> {
        Err(AnnotatorError::NotReady)
    }
}

#[tokio::test]
async fn test_post_nodelist_dedups_ways() {
    let server = create_test_server();

    let response = server
        .post("/nodelist")
        .json(&json!({"nodes": [1, 2, 3, 4]}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0, 0, 1]));
    assert_eq!(json["ways_seen"][0]["_way_id"], 10);
    assert_eq!(json["ways_seen"][0]["name"], "Main St");
    assert_eq!(json["ways_seen"][1]["_way_id"], 11);
    assert_eq!(json["ways_seen"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_nodelist_revisited_way_keeps_first_index() {
    let server = create_test_server();

    // 1-2-3 on way 10, 3-4 on way 11, back 4-3 on 11, then 3-2 on 10 again.
    let response = server
        .post("/nodelist")
        .json(&json!({"nodes": [1, 2, 3, 4, 3, 2]}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0, 0, 1, 1, 0]));
    assert_eq!(json["ways_seen"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_nodelist() {
    let server = create_test_server();

    let response = server.get("/nodelist/1,2,3").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0, 0]));
    assert_eq!(json["ways_seen"][0]["maxspeed"], "50");
}

#[tokio::test]
async fn test_positional_mode_keeps_route_length() {
    let server = create_test_server_with(
        Arc::new(test_engine()),
        IndexMode::Positional,
        NodeShape::Tags,
    );

    let response = server
        .post("/nodelist")
        .json(&json!({"nodes": [1, 2, 99, 3, 4]}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([null, 0, null, null, 1]));
}

#[tokio::test]
async fn test_projected_shape() {
    let server = create_test_server_with(
        Arc::new(test_engine()),
        IndexMode::Skip,
        NodeShape::Projected,
    );

    let response = server.get("/nodelist/2,3,4,3,5").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json,
        json!({"tags": [
            null,
            ["50", null, 0, 0],
            [null, null, 1, 0],
            [null, null, 1, 0],
            [null, "30 @ (22:00-06:00)", 0, 1]
        ]})
    );
}

#[tokio::test]
async fn test_empty_node_list() {
    let server = create_test_server();

    let response = server.post("/nodelist").json(&json!({"nodes": []})).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json, json!({"way_indexes": [], "ways_seen": []}));
}

#[tokio::test]
async fn test_nodelist_validation_errors() {
    let server = create_test_server();

    for body in [
        json!({"nodes": [1, null, 3]}),
        json!({"nodes": [1, "two"]}),
        json!({"nodes": [1.5]}),
        json!({"nodes": "1,2"}),
        json!({"coordinates": [[13.0, 52.0]]}),
    ] {
        let response = server.post("/nodelist").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().is_empty());
    }

    let response = server.post("/nodelist").text(r#"{"nodes": [1, NaN]}"#).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.post("/nodelist").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/nodelist/1,abc,3").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_failure_does_not_reach_engine() {
    let server = create_test_server();

    server
        .post("/nodelist")
        .json(&json!({"nodes": [1, null]}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let json: Value = server.get("/stats").await.json();
    assert_eq!(json["requests"], 0);
}

#[tokio::test]
async fn test_post_coordlist() {
    let server = create_test_server();

    let response = server
        .post("/coordlist")
        .json(&json!({"coordinates": [[13.0, 52.0], [13.1, 52.0], [13.2, 52.0], [13.2, 51.9]]}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0, 0, 1]));
    assert_eq!(json["ways_seen"][1]["_way_id"], 12);
    assert_eq!(json["ways_seen"][1]["bridge"], "yes");
}

#[tokio::test]
async fn test_get_coordlist() {
    let server = create_test_server();

    let response = server.get("/coordlist/13.2,52.0;13.3,52.0").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0]));
    assert_eq!(json["ways_seen"][0]["tunnel"], true);
}

#[tokio::test]
async fn test_coordlist_validation_errors() {
    let server = create_test_server();

    for body in [
        json!({"coordinates": [[13.0]]}),
        json!({"coordinates": [[13.0, 52.0, 1.0]]}),
        json!({"coordinates": [[13.0, null]]}),
        json!({"coordinates": [13.0, 52.0]}),
        json!({"nodes": [1, 2]}),
    ] {
        let response = server.post("/coordlist").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    let response = server.get("/coordlist/13.0;13.1,52.0").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/coordlist/NaN,52.0").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_tag_fetch_degrades_to_null() {
    let engine = FlakyEngine {
        inner: test_engine(),
        broken: WayId(11),
    };
    let server = create_test_server_with(Arc::new(engine), IndexMode::Skip, NodeShape::Tags);

    let response = server
        .post("/nodelist")
        .json(&json!({"nodes": [1, 2, 3, 4, 3, 5]}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["way_indexes"], json!([0, 0, 1, 1, 2]));
    assert_eq!(json["ways_seen"][0]["_way_id"], 10);
    assert!(json["ways_seen"][1].is_null());
    assert_eq!(json["ways_seen"][2]["_way_id"], 12);

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["fetch_failures"], 1);
    assert_eq!(stats["ways_fetched"], 3);
}

#[tokio::test]
async fn test_unloaded_extract_is_rejected() {
    let server = create_test_server_with(Arc::new(LoadingEngine), IndexMode::Skip, NodeShape::Tags);

    let response = server.post("/nodelist").json(&json!({"nodes": [1, 2]})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().is_empty());

    let json: Value = server.get("/health").await.json();
    assert_eq!(json["ready"], false);

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["resolution_failures"], 1);
}

#[tokio::test]
async fn test_identical_requests_identical_bytes() {
    let server = create_test_server();
    let body = json!({"nodes": [5, 3, 2, 1, 2, 3, 4]});

    let first = server.post("/nodelist").json(&body).await.text();
    let second = server.post("/nodelist").json(&body).await.text();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["ready"], true);
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let server = create_test_server();

    let json: Value = server.get("/stats").await.json();
    assert_eq!(json["requests"], 0);
    assert_eq!(json["ways_fetched"], 0);

    server.get("/nodelist/1,2,3,4").await.assert_status_ok();

    let json: Value = server.get("/stats").await.json();
    assert_eq!(json["requests"], 1);
    assert_eq!(json["ways_fetched"], 2);
    assert_eq!(json["fetch_failure_rate"], 0.0);
}

#[tokio::test]
async fn test_service_from_snapshot_file() {
    let temp_dir = TempDir::new().unwrap();
    let extract = temp_dir.path().join("extract.json");
    let tags = temp_dir.path().join("tags.txt");
    std::fs::write(
        &extract,
        json!({
            "nodes": [{"id": 1, "lon": 0.0, "lat": 0.0}, {"id": 2, "lon": 0.1, "lat": 0.0}],
            "ways": [{"id": 7, "nodes": [1, 2], "tags": {"maxspeed": "50", "name": "Elm"}}]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(&tags, "maxspeed\n").unwrap();

    let annotator = AnnotatorServiceBuilder::new(&extract)
        .tag_file(&tags)
        .build()
        .unwrap();
    let server = TestServer::new(router(Arc::new(AppState { annotator }))).unwrap();

    let response = server.get("/nodelist/1,2").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json,
        json!({"way_indexes": [0], "ways_seen": [{"_way_id": 7, "maxspeed": "50"}]})
    );
}
