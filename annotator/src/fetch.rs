//! Deduplicated, bounded fan-out of way tag lookups.
//!
//! A resolved route usually visits the same way many times in a row. The
//! [`DedupIndex`] collapses the sequence to its distinct way ids, numbered in
//! order of first appearance, and [`TagFetcher`] looks each of them up
//! exactly once.
//!
//! The numbering is fixed before any lookup starts. Lookups run concurrently
//! and finish in any order, but every result is written to the slot its way
//! id was given up front, so the output never depends on completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::engine::RouteEngine;
use crate::error::{AnnotatorError, Result};
use crate::way::{TagRecord, WayId};

/// Default number of tag lookups in flight per request.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Default deadline for a single tag lookup.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Distinct way ids of a route, numbered by first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupIndex {
    distinct: Vec<WayId>,
    slots: HashMap<WayId, usize>,
}

impl DedupIndex {
    /// Build the index for a resolved route. Absent positions are skipped.
    ///
    /// # Example
    ///
    /// ```
    /// use annotator::{DedupIndex, WayId};
    ///
    /// let route = [Some(WayId(10)), Some(WayId(10)), None, Some(WayId(11))];
    /// let index = DedupIndex::from_sequence(&route);
    ///
    /// assert_eq!(index.distinct(), &[WayId(10), WayId(11)]);
    /// assert_eq!(index.slot(WayId(11)), Some(1));
    /// ```
    pub fn from_sequence(ways: &[Option<WayId>]) -> Self {
        let mut index = Self::default();
        for way_id in ways.iter().flatten() {
            if !index.slots.contains_key(way_id) {
                index.slots.insert(*way_id, index.distinct.len());
                index.distinct.push(*way_id);
            }
        }
        index
    }

    /// Zero-based slot of a way id, if it occurs in the route.
    pub fn slot(&self, way_id: WayId) -> Option<usize> {
        self.slots.get(&way_id).copied()
    }

    /// Distinct way ids in first-appearance order.
    pub fn distinct(&self) -> &[WayId] {
        &self.distinct
    }

    pub fn len(&self) -> usize {
        self.distinct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distinct.is_empty()
    }
}

/// Result of fetching the tags of every distinct way in a route.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Slot assignment for the route's way ids.
    pub index: DedupIndex,
    /// One entry per slot; `None` where the lookup failed.
    pub records: Vec<Option<TagRecord>>,
    /// Number of lookups that failed or timed out.
    pub failed: usize,
}

impl FetchOutcome {
    /// Record for a way id, if it was fetched successfully.
    pub fn record_for(&self, way_id: WayId) -> Option<&TagRecord> {
        self.index
            .slot(way_id)
            .and_then(|slot| self.records.get(slot))
            .and_then(Option::as_ref)
    }
}

/// Fetches way tags with bounded concurrency and per-item deadlines.
///
/// Every engine call holds a permit from a pool of `concurrency` permits
/// until the call returns, even after its deadline has passed. Clones share
/// the pool, so the bound holds across all requests served by one fetcher.
#[derive(Debug, Clone)]
pub struct TagFetcher {
    concurrency: usize,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Default for TagFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT)
    }
}

impl TagFetcher {
    /// Create a fetcher. A concurrency of zero is treated as one.
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            concurrency,
            timeout,
            permits: Arc::new(Semaphore::new(concurrency)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Permit pool bounding the engine calls in flight.
    pub(crate) fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    /// Fetch the tags of every distinct way id in `ways`.
    ///
    /// Each distinct id is looked up exactly once; absent positions are never
    /// looked up. A failed lookup leaves its slot empty and the batch carries
    /// on with the remaining ids.
    pub async fn fetch(
        &self,
        engine: &Arc<dyn RouteEngine>,
        ways: &[Option<WayId>],
    ) -> FetchOutcome {
        let index = DedupIndex::from_sequence(ways);
        let mut records: Vec<Option<TagRecord>> = vec![None; index.len()];
        let mut failed = 0;

        if index.is_empty() {
            return FetchOutcome {
                index,
                records,
                failed,
            };
        }

        let start = Instant::now();
        let timeout = self.timeout;

        let results: Vec<(usize, Result<TagRecord>)> =
            stream::iter(index.distinct().iter().copied().enumerate())
                .map(|(slot, way_id)| {
                    let engine = Arc::clone(engine);
                    let permits = self.permits();
                    async move { (slot, fetch_one(engine, permits, way_id, timeout).await) }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Completion order is irrelevant: each result goes to its own slot.
        for (slot, result) in results {
            match result {
                Ok(record) => records[slot] = Some(record),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        way_id = %index.distinct()[slot],
                        error = %e,
                        "Tag fetch failed, substituting null record"
                    );
                }
            }
        }

        tracing::debug!(
            distinct = index.len(),
            failed = failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched way tags"
        );

        FetchOutcome {
            index,
            records,
            failed,
        }
    }
}

async fn fetch_one(
    engine: Arc<dyn RouteEngine>,
    permits: Arc<Semaphore>,
    way_id: WayId,
    timeout: Duration,
) -> Result<TagRecord> {
    // The deadline covers waiting for a permit as well as the lookup itself.
    let record = match tokio::time::timeout(timeout, lookup(engine, permits, way_id)).await {
        Err(_) => {
            return Err(AnnotatorError::Timeout {
                operation: "tag fetch",
                millis: timeout.as_millis() as u64,
            })
        }
        Ok(result) => result?,
    };

    if record.way_id != way_id {
        return Err(AnnotatorError::TagFetchFailed {
            way_id,
            reason: format!("engine returned record for way {}", record.way_id),
        });
    }

    Ok(record)
}

async fn lookup(
    engine: Arc<dyn RouteEngine>,
    permits: Arc<Semaphore>,
    way_id: WayId,
) -> Result<TagRecord> {
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|e| AnnotatorError::TagFetchFailed {
            way_id,
            reason: e.to_string(),
        })?;

    let task = tokio::task::spawn_blocking(move || {
        // Released when the engine returns, not when the caller gives up.
        let _permit = permit;
        engine.tags_for_way(way_id)
    });

    task.await.map_err(|join_error| AnnotatorError::TagFetchFailed {
        way_id,
        reason: join_error.to_string(),
    })?
}
