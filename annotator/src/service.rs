//! Route annotation service.
//!
//! This module provides [`AnnotatorService`], a high-level interface that
//! runs the whole request pipeline: resolve the route with the engine, fetch
//! the tags of each distinct way once, and assemble the response.
//!
//! ```ignore
//! use annotator::AnnotatorServiceBuilder;
//!
//! let service = AnnotatorServiceBuilder::new("/data/berlin.json")
//!     .tag_file("/data/tags.txt")
//!     .concurrency(32)
//!     .build()?;
//!
//! let annotation = service.annotate_nodes(vec![1, 2, 3]).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::{resolve_route, RouteEngine};
use crate::error::{AnnotatorError, Result};
use crate::fetch::{TagFetcher, DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT};
use crate::query::RouteQuery;
use crate::response::{
    assemble, assemble_way_tags, Annotation, IndexMode, NodeShape, WayTagsResponse,
};
use crate::snapshot::SnapshotEngine;
use crate::way::{LonLat, NodeId, WayId};

/// Default deadline for resolving one route.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters describing the work done by the service.
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    /// Number of annotation requests that reached the engine.
    pub requests: u64,
    /// Number of requests rejected because the route could not be resolved.
    pub resolution_failures: u64,
    /// Number of distinct way lookups performed.
    pub ways_fetched: u64,
    /// Number of way lookups that failed and were replaced by `null`.
    pub fetch_failures: u64,
}

impl ServiceStats {
    /// Fraction of way lookups that failed (0.0 to 1.0).
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn fetch_failure_rate(&self) -> f64 {
        if self.ways_fetched == 0 {
            0.0
        } else {
            self.fetch_failures as f64 / self.ways_fetched as f64
        }
    }
}

/// High-level annotation service over a shared [`RouteEngine`].
///
/// All per-request state (the dedup table, fetched records) lives inside a
/// single call; the service itself only holds configuration and counters.
pub struct AnnotatorService {
    engine: Arc<dyn RouteEngine>,
    fetcher: TagFetcher,
    resolve_timeout: Duration,
    index_mode: IndexMode,
    node_shape: NodeShape,
    requests: AtomicU64,
    resolution_failures: AtomicU64,
    ways_fetched: AtomicU64,
    fetch_failures: AtomicU64,
}

impl AnnotatorService {
    /// Create a service over an engine with default settings.
    pub fn new(engine: Arc<dyn RouteEngine>) -> Self {
        Self {
            engine,
            fetcher: TagFetcher::default(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            index_mode: IndexMode::default(),
            node_shape: NodeShape::default(),
            requests: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            ways_fetched: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
        }
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(extract: P) -> AnnotatorServiceBuilder {
        AnnotatorServiceBuilder::new(extract)
    }

    /// Annotate a node id route in the configured node shape.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotatorError::ResolutionFailed`] if the engine cannot
    /// resolve the route. Failed tag lookups do not produce an error; they
    /// appear as `null` entries in the response.
    pub async fn annotate_nodes(&self, nodes: Vec<NodeId>) -> Result<Annotation> {
        let query = RouteQuery::Nodes(nodes);
        let ways = self.resolve(query).await?;
        let outcome = self.fetcher.fetch(&self.engine, &ways).await;
        self.record_fetch(outcome.index.len(), outcome.failed);
        Ok(assemble(&ways, outcome, self.node_shape, self.index_mode))
    }

    /// Annotate a coordinate route.
    ///
    /// Coordinate routes always produce the full-tags shape, using the
    /// configured [`IndexMode`].
    pub async fn annotate_coordinates(&self, coords: Vec<LonLat>) -> Result<WayTagsResponse> {
        let query = RouteQuery::Coordinates(coords);
        let ways = self.resolve(query).await?;
        let outcome = self.fetcher.fetch(&self.engine, &ways).await;
        self.record_fetch(outcome.index.len(), outcome.failed);
        Ok(assemble_way_tags(&ways, outcome, self.index_mode))
    }

    async fn resolve(&self, query: RouteQuery) -> Result<Vec<Option<WayId>>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let elements = query.len();

        let engine = Arc::clone(&self.engine);
        let permits = self.fetcher.permits();

        match resolve_route(engine, query, permits, self.resolve_timeout).await {
            Ok(ways) => {
                tracing::debug!(
                    elements = elements,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Route resolved"
                );
                Ok(ways)
            }
            Err(e) => {
                self.resolution_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(elements = elements, error = %e, "Route resolution failed");
                Err(e)
            }
        }
    }

    fn record_fetch(&self, distinct: usize, failed: usize) {
        self.ways_fetched.fetch_add(distinct as u64, Ordering::Relaxed);
        self.fetch_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Whether the engine has finished loading its extract.
    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Get service statistics.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            requests: self.requests.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            ways_fetched: self.ways_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }

    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    pub fn node_shape(&self) -> NodeShape {
        self.node_shape
    }

    pub fn fetcher(&self) -> &TagFetcher {
        &self.fetcher
    }
}

/// Builder for creating [`AnnotatorService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use annotator::{AnnotatorServiceBuilder, IndexMode};
///
/// let service = AnnotatorServiceBuilder::new("/data/berlin.json")
///     .index_mode(IndexMode::Positional)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct AnnotatorServiceBuilder {
    extract: PathBuf,
    tag_file: Option<PathBuf>,
    concurrency: usize,
    fetch_timeout: Duration,
    resolve_timeout: Duration,
    index_mode: IndexMode,
    node_shape: NodeShape,
}

impl AnnotatorServiceBuilder {
    /// Create a new builder for the given extract snapshot.
    pub fn new<P: AsRef<Path>>(extract: P) -> Self {
        Self {
            extract: extract.as_ref().to_path_buf(),
            tag_file: None,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            index_mode: IndexMode::default(),
            node_shape: NodeShape::default(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ANNOTATOR_EXTRACT` | Extract snapshot path | Required |
    /// | `ANNOTATOR_TAG_FILE` | Tag filter file | None (keep all tags) |
    /// | `ANNOTATOR_CONCURRENCY` | Tag lookups in flight per request | 16 |
    /// | `ANNOTATOR_FETCH_TIMEOUT_MS` | Deadline per tag lookup | 2000 |
    /// | `ANNOTATOR_RESOLVE_TIMEOUT_MS` | Deadline per route resolution | 10000 |
    /// | `ANNOTATOR_INDEX_MODE` | `skip` or `positional` | skip |
    /// | `ANNOTATOR_NODE_SHAPE` | `tags` or `projected` | tags |
    ///
    /// # Errors
    ///
    /// Returns an error if `ANNOTATOR_EXTRACT` is not set or a mode variable
    /// holds an unknown value.
    pub fn from_env() -> Result<Self> {
        let extract = std::env::var("ANNOTATOR_EXTRACT").map_err(|_| AnnotatorError::Config {
            reason: "ANNOTATOR_EXTRACT environment variable not set".to_string(),
        })?;

        Self::new(extract).with_env()
    }

    /// Apply the optional environment variables listed in [`Self::from_env`]
    /// on top of this builder, leaving the extract path untouched.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(tag_file) = std::env::var("ANNOTATOR_TAG_FILE") {
            self = self.tag_file(tag_file);
        }
        if let Some(n) = env_parse::<usize>("ANNOTATOR_CONCURRENCY") {
            self = self.concurrency(n);
        }
        if let Some(ms) = env_parse::<u64>("ANNOTATOR_FETCH_TIMEOUT_MS") {
            self = self.fetch_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64>("ANNOTATOR_RESOLVE_TIMEOUT_MS") {
            self = self.resolve_timeout(Duration::from_millis(ms));
        }
        if let Ok(mode) = std::env::var("ANNOTATOR_INDEX_MODE") {
            self = self.index_mode(mode.parse()?);
        }
        if let Ok(shape) = std::env::var("ANNOTATOR_NODE_SHAPE") {
            self = self.node_shape(shape.parse()?);
        }

        Ok(self)
    }

    /// Set the extract snapshot path.
    ///
    /// Overrides the path set in the constructor or from environment.
    pub fn extract<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.extract = path.as_ref().to_path_buf();
        self
    }

    /// Set the tag filter file. An empty path keeps all tags.
    pub fn tag_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.tag_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the number of tag lookups in flight per request.
    ///
    /// Default is 16.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn index_mode(mut self, mode: IndexMode) -> Self {
        self.index_mode = mode;
        self
    }

    pub fn node_shape(mut self, shape: NodeShape) -> Self {
        self.node_shape = shape;
        self
    }

    pub fn extract_path(&self) -> &Path {
        &self.extract
    }

    pub fn tag_file_path(&self) -> Option<&Path> {
        self.tag_file.as_deref()
    }

    /// Load the extract snapshot and build the [`AnnotatorService`].
    ///
    /// This blocks until the extract is fully loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the extract or tag file cannot be loaded.
    pub fn build(self) -> Result<AnnotatorService> {
        let engine = SnapshotEngine::load_extract(&self.extract, self.tag_file.as_deref())?;
        Ok(self.build_with_engine(Arc::new(engine)))
    }

    /// Build the [`AnnotatorService`] over an already loaded engine.
    pub fn build_with_engine(self, engine: Arc<dyn RouteEngine>) -> AnnotatorService {
        AnnotatorService {
            fetcher: TagFetcher::new(self.concurrency, self.fetch_timeout),
            resolve_timeout: self.resolve_timeout,
            index_mode: self.index_mode,
            node_shape: self.node_shape,
            ..AnnotatorService::new(engine)
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
