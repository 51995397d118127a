//! Response assembly.
//!
//! Turns a resolved route plus its [`FetchOutcome`] into one of three JSON
//! shapes:
//!
//! | Shape | Type | Absent positions |
//! |-------|------|------------------|
//! | full tags, skipping | [`WayTagsResponse`] with [`IndexMode::Skip`] | no entry |
//! | full tags, positional | [`WayTagsResponse`] with [`IndexMode::Positional`] | `null` |
//! | projected fields | [`ProjectedResponse`] | `null` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnnotatorError;
use crate::fetch::FetchOutcome;
use crate::way::{ProjectedTags, TagRecord, WayId};

/// How absent positions appear in `way_indexes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Absent positions are dropped, so `way_indexes` may be shorter than the route.
    #[default]
    Skip,
    /// Every position has an entry; absent ones are `null`.
    Positional,
}

impl FromStr for IndexMode {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "skipping" => Ok(IndexMode::Skip),
            "positional" => Ok(IndexMode::Positional),
            other => Err(AnnotatorError::Config {
                reason: format!("unknown index mode `{other}`, expected skip or positional"),
            }),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Skip => f.write_str("skip"),
            IndexMode::Positional => f.write_str("positional"),
        }
    }
}

/// Response shape used by the node-list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    /// Deduplicated full tag records.
    #[default]
    Tags,
    /// Fixed `(maxspeed, maxspeed:conditional, tunnel, bridge)` tuple per position.
    Projected,
}

impl FromStr for NodeShape {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tags" | "full" => Ok(NodeShape::Tags),
            "projected" => Ok(NodeShape::Projected),
            other => Err(AnnotatorError::Config {
                reason: format!("unknown node shape `{other}`, expected tags or projected"),
            }),
        }
    }
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeShape::Tags => f.write_str("tags"),
            NodeShape::Projected => f.write_str("projected"),
        }
    }
}

/// Deduplicated full-tags response.
///
/// `ways_seen[k]` is the record of the k-th distinct way of the route, and
/// `way_indexes` points each route position into `ways_seen`. A way whose
/// lookup failed keeps its index and has a `null` record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WayTagsResponse {
    pub way_indexes: Vec<Option<usize>>,
    pub ways_seen: Vec<Option<TagRecord>>,
}

/// Projected-fields response, one entry per route position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectedResponse {
    pub tags: Vec<Option<ProjectedTags>>,
}

/// Either response of a node-list request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Annotation {
    Tags(WayTagsResponse),
    Projected(ProjectedResponse),
}

/// Build the full-tags response for a resolved route.
pub fn assemble_way_tags(
    ways: &[Option<WayId>],
    outcome: FetchOutcome,
    mode: IndexMode,
) -> WayTagsResponse {
    let way_indexes = ways
        .iter()
        .filter_map(|way| match (way, mode) {
            (Some(id), _) => Some(outcome.index.slot(*id)),
            (None, IndexMode::Positional) => Some(None),
            (None, IndexMode::Skip) => None,
        })
        .collect();

    WayTagsResponse {
        way_indexes,
        ways_seen: outcome.records,
    }
}

/// Build the projected-fields response for a resolved route.
pub fn assemble_projected(ways: &[Option<WayId>], outcome: &FetchOutcome) -> ProjectedResponse {
    let tags = ways
        .iter()
        .map(|way| {
            way.and_then(|id| outcome.record_for(id))
                .map(TagRecord::project)
        })
        .collect();

    ProjectedResponse { tags }
}

/// Build the node-list response in the requested shape.
pub fn assemble(
    ways: &[Option<WayId>],
    outcome: FetchOutcome,
    shape: NodeShape,
    mode: IndexMode,
) -> Annotation {
    match shape {
        NodeShape::Tags => Annotation::Tags(assemble_way_tags(ways, outcome, mode)),
        NodeShape::Projected => Annotation::Projected(assemble_projected(ways, &outcome)),
    }
}
