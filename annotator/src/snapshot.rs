//! In-memory engine backed by a JSON extract snapshot.
//!
//! The snapshot lists nodes and ways of an already-prepared extract:
//!
//! ```json
//! {
//!   "nodes": [{"id": 1, "lon": 13.3777, "lat": 52.5163}, ...],
//!   "ways":  [{"id": 10, "nodes": [1, 2, 3], "tags": {"name": "Main St", "maxspeed": "50"}}, ...]
//! }
//! ```
//!
//! Resolution is a plain table lookup. A node route resolves position `i`
//! to the way containing the segment between nodes `i - 1` and `i`, in
//! either direction; position 0 is the route start and never resolves.
//! Coordinates are mapped to nodes by exact position at OSM precision
//! (1e-7 degrees) and then resolved the same way.
//!
//! An optional tag file restricts which tags are kept: one key per line,
//! blank lines and `#` comments ignored.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use serde::Deserialize;

use crate::engine::RouteEngine;
use crate::error::{AnnotatorError, Result};
use crate::way::{LonLat, NodeId, TagRecord, TagValue, WayId};

/// Fixed-point scale of stored coordinates.
const COORDINATE_SCALE: f64 = 1e7;

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    nodes: Vec<SnapshotNode>,
    #[serde(default)]
    ways: Vec<SnapshotWay>,
}

/// A node of the snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub lon: f64,
    pub lat: f64,
}

/// A way of the snapshot with its ordered node list and tags.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotWay {
    pub id: u64,
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub tags: BTreeMap<String, TagValue>,
}

/// Size of a loaded snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub nodes: usize,
    pub ways: usize,
    pub segments: usize,
}

/// Engine answering from an in-memory snapshot.
#[derive(Debug)]
pub struct SnapshotEngine {
    /// Way of each directed node pair; both directions are stored.
    segments: HashMap<(NodeId, NodeId), WayId>,
    /// Node at each fixed-point position.
    positions: HashMap<(i64, i64), NodeId>,
    records: HashMap<WayId, TagRecord>,
    node_count: usize,
}

impl SnapshotEngine {
    /// Load a snapshot file, keeping only the tags listed in `tag_file`.
    ///
    /// `tag_file` may be `None` or an empty path, in which case all tags are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or the snapshot is not
    /// valid JSON. Callers should treat this as fatal at startup.
    pub fn load_extract<P: AsRef<Path>>(path: P, tag_file: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();

        if !path.exists() {
            return Err(AnnotatorError::ExtractNotFound {
                path: path.to_path_buf(),
            });
        }

        let keep = match tag_file {
            Some(p) if !p.as_os_str().is_empty() => Some(load_tag_filter(p)?),
            _ => None,
        };

        let file = std::fs::File::open(path)?;
        let snapshot: SnapshotFile = serde_json::from_reader(std::io::BufReader::new(file))?;

        let engine = Self::from_parts(snapshot.nodes, snapshot.ways, keep.as_ref());
        let stats = engine.stats();

        tracing::info!(
            extract = %path.display(),
            nodes = stats.nodes,
            ways = stats.ways,
            segments = stats.segments,
            tag_filter = keep.as_ref().map(HashSet::len),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extract loaded"
        );

        Ok(engine)
    }

    /// Build an engine from nodes and ways already in memory.
    ///
    /// When two ways share a segment, the one listed first wins.
    pub fn from_parts(
        nodes: Vec<SnapshotNode>,
        ways: Vec<SnapshotWay>,
        keep: Option<&HashSet<String>>,
    ) -> Self {
        let node_count = nodes.len();
        let positions = nodes
            .into_iter()
            .map(|n| (fixed_point((n.lon, n.lat)), n.id))
            .collect();

        let mut segments = HashMap::new();
        let mut records = HashMap::with_capacity(ways.len());

        for way in ways {
            let way_id = WayId(way.id);
            for pair in way.nodes.windows(2) {
                segments.entry((pair[0], pair[1])).or_insert(way_id);
                segments.entry((pair[1], pair[0])).or_insert(way_id);
            }

            let mut record = TagRecord::new(way_id);
            for (key, value) in way.tags {
                record.insert(key, value);
            }
            if let Some(keep) = keep {
                record.retain(|k| keep.contains(k));
            }
            records.entry(way_id).or_insert(record);
        }

        Self {
            segments,
            positions,
            records,
            node_count,
        }
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            nodes: self.node_count,
            ways: self.records.len(),
            segments: self.segments.len() / 2,
        }
    }

    fn segment(&self, from: NodeId, to: NodeId) -> Option<WayId> {
        self.segments.get(&(from, to)).copied()
    }

    fn resolve_optional_nodes(&self, nodes: &[Option<NodeId>]) -> Vec<Option<WayId>> {
        let mut ways = Vec::with_capacity(nodes.len());
        if nodes.is_empty() {
            return ways;
        }
        ways.push(None);
        for pair in nodes.windows(2) {
            ways.push(match (pair[0], pair[1]) {
                (Some(a), Some(b)) => self.segment(a, b),
                _ => None,
            });
        }
        ways
    }
}

impl RouteEngine for SnapshotEngine {
    fn is_ready(&self) -> bool {
        true
    }

    fn resolve_node_ids(&self, nodes: &[NodeId]) -> Result<Vec<Option<WayId>>> {
        let nodes: Vec<Option<NodeId>> = nodes.iter().copied().map(Some).collect();
        Ok(self.resolve_optional_nodes(&nodes))
    }

    fn resolve_coordinates(&self, coords: &[LonLat]) -> Result<Vec<Option<WayId>>> {
        let nodes: Vec<Option<NodeId>> = coords
            .iter()
            .map(|c| self.positions.get(&fixed_point(*c)).copied())
            .collect();
        Ok(self.resolve_optional_nodes(&nodes))
    }

    fn tags_for_way(&self, way_id: WayId) -> Result<TagRecord> {
        self.records
            .get(&way_id)
            .cloned()
            .ok_or_else(|| AnnotatorError::TagFetchFailed {
                way_id,
                reason: "way not in extract".to_string(),
            })
    }
}

/// Read a tag filter file: one tag key per line.
pub fn load_tag_filter(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn fixed_point((lon, lat): LonLat) -> (i64, i64) {
    (
        (lon * COORDINATE_SCALE).round() as i64,
        (lat * COORDINATE_SCALE).round() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "nodes": [
            {"id": 1, "lon": 13.0, "lat": 52.0},
            {"id": 2, "lon": 13.1, "lat": 52.0},
            {"id": 3, "lon": 13.2, "lat": 52.0},
            {"id": 4, "lon": 13.2, "lat": 52.1}
        ],
        "ways": [
            {"id": 10, "nodes": [1, 2, 3], "tags": {"name": "Main St", "maxspeed": "50", "highway": "primary"}},
            {"id": 11, "nodes": [3, 4], "tags": {"name": "Oak Ave", "tunnel": "yes"}}
        ]
    }"#;

    fn write_snapshot(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("extract.json");
        fs::write(&path, SNAPSHOT).unwrap();
        path
    }

    #[test]
    fn test_load_and_resolve_nodes() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::load_extract(write_snapshot(temp_dir.path()), None).unwrap();

        let ways = engine.resolve_node_ids(&[1, 2, 3, 4]).unwrap();
        assert_eq!(ways, vec![None, Some(WayId(10)), Some(WayId(10)), Some(WayId(11))]);

        // Reverse direction resolves to the same ways.
        let ways = engine.resolve_node_ids(&[4, 3, 2]).unwrap();
        assert_eq!(ways, vec![None, Some(WayId(11)), Some(WayId(10))]);
    }

    #[test]
    fn test_unknown_segments_are_gaps() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::load_extract(write_snapshot(temp_dir.path()), None).unwrap();

        let ways = engine.resolve_node_ids(&[1, 3, 4, 99]).unwrap();
        assert_eq!(ways, vec![None, None, Some(WayId(11)), None]);
        assert!(engine.resolve_node_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_coordinates() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::load_extract(write_snapshot(temp_dir.path()), None).unwrap();

        let ways = engine
            .resolve_coordinates(&[(13.0, 52.0), (13.1, 52.0), (0.0, 0.0)])
            .unwrap();
        assert_eq!(ways, vec![None, Some(WayId(10)), None]);
    }

    #[test]
    fn test_tags_for_way() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::load_extract(write_snapshot(temp_dir.path()), None).unwrap();

        let record = engine.tags_for_way(WayId(11)).unwrap();
        assert_eq!(record.way_id, WayId(11));
        assert!(record.is_tunnel());

        assert!(matches!(
            engine.tags_for_way(WayId(12)),
            Err(AnnotatorError::TagFetchFailed { .. })
        ));
    }

    #[test]
    fn test_tag_filter() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(temp_dir.path());
        let filter = temp_dir.path().join("tags.txt");
        fs::write(&filter, "# speed related\nmaxspeed\n\nname\n").unwrap();

        let engine = SnapshotEngine::load_extract(&snapshot, Some(&filter)).unwrap();
        let record = engine.tags_for_way(WayId(10)).unwrap();

        assert_eq!(record.max_speed(), Some("50"));
        assert!(record.get("name").is_some());
        assert!(record.get("highway").is_none());
    }

    #[test]
    fn test_empty_tag_file_path_keeps_all() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(temp_dir.path());

        let engine = SnapshotEngine::load_extract(&snapshot, Some(Path::new(""))).unwrap();
        assert!(engine.tags_for_way(WayId(10)).unwrap().get("highway").is_some());
    }

    #[test]
    fn test_missing_extract() {
        let temp_dir = TempDir::new().unwrap();
        let err = SnapshotEngine::load_extract(temp_dir.path().join("nope.json"), None).unwrap_err();
        assert!(matches!(err, AnnotatorError::ExtractNotFound { .. }));
    }

    #[test]
    fn test_invalid_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{\"ways\": 5}").unwrap();

        let err = SnapshotEngine::load_extract(&path, None).unwrap_err();
        assert!(matches!(err, AnnotatorError::Snapshot(_)));
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::load_extract(write_snapshot(temp_dir.path()), None).unwrap();

        assert_eq!(
            engine.stats(),
            SnapshotStats {
                nodes: 4,
                ways: 2,
                segments: 3
            }
        );
    }

    #[test]
    fn test_shared_segment_first_way_wins() {
        let nodes = vec![
            SnapshotNode { id: 1, lon: 0.0, lat: 0.0 },
            SnapshotNode { id: 2, lon: 0.1, lat: 0.0 },
        ];
        let ways = vec![
            SnapshotWay { id: 5, nodes: vec![1, 2], tags: BTreeMap::new() },
            SnapshotWay { id: 6, nodes: vec![2, 1], tags: BTreeMap::new() },
        ];
        let engine = SnapshotEngine::from_parts(nodes, ways, None);
        assert_eq!(engine.resolve_node_ids(&[2, 1]).unwrap()[1], Some(WayId(5)));
    }
}
