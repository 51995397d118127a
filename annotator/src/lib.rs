//! # Annotator - Route Way Tag Library
//!
//! Turns a travelled route, given as map node ids or as `(lon, lat)` pairs,
//! into the tags of the road segments ("ways") it passes through.
//!
//! ## Features
//!
//! - **Deduplicated**: each distinct way is looked up once per request, no
//!   matter how often the route revisits it
//! - **Deterministic**: way indexes follow first appearance in the route,
//!   never the completion order of concurrent lookups
//! - **Fault tolerant**: a failed lookup becomes a `null` record instead of
//!   failing the request
//! - **Bounded**: lookups fan out with a configurable concurrency limit and
//!   per-lookup deadline
//!
//! ## Quick Start
//!
//! ```ignore
//! use annotator::AnnotatorServiceBuilder;
//!
//! let service = AnnotatorServiceBuilder::new("/data/berlin.json").build()?;
//! let annotation = service.annotate_nodes(vec![1, 2, 3]).await?;
//! println!("{}", serde_json::to_string(&annotation)?);
//! ```
//!
//! ## Response Shapes
//!
//! Node ids `[1, 2, 3]` resolving to ways `[-, 10, 11]`:
//!
//! - **skip**: `{"way_indexes": [0, 1], "ways_seen": [{..}, {..}]}`
//! - **positional**: `{"way_indexes": [null, 0, 1], "ways_seen": [{..}, {..}]}`
//! - **projected**: `{"tags": [null, ["50", null, 0, 0], [null, null, 1, 0]]}`

pub mod engine;
pub mod error;
pub mod fetch;
pub mod query;
pub mod response;
pub mod service;
pub mod snapshot;
pub mod way;

// Re-export main types at crate root for convenience
pub use engine::RouteEngine;
pub use error::{AnnotatorError, Result};
pub use fetch::{DedupIndex, FetchOutcome, TagFetcher};
pub use query::RouteQuery;
pub use response::{Annotation, IndexMode, NodeShape, ProjectedResponse, WayTagsResponse};
pub use service::{AnnotatorService, AnnotatorServiceBuilder, ServiceStats};
pub use snapshot::{SnapshotEngine, SnapshotStats};
pub use way::{LonLat, NodeId, ProjectedTags, TagRecord, TagValue, WayId};
