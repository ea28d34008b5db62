//! Cacheable entity trait and cache statistics.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use nuvex_core::{CatalogResult, EntityIdType, EntityKind, Project, Review};

use super::entity_cache::{EntityCache, PartitionTable};
use crate::query::CollectionQuery;
use crate::remote::RemoteCollectionClient;

/// Types the [`EntityCache`] can hold.
///
/// # Implementation Requirements
///
/// - `entity_kind()` must return the same value for every instance
/// - `select()` must issue exactly one remote round trip
/// - `partitions()` must return the table dedicated to this type
pub trait CacheableEntity: Clone + Send + Sync + 'static {
    /// Entity kind held by this type.
    fn entity_kind() -> EntityKind;

    /// Identifier of this row, used for logging.
    fn entity_id(&self) -> &str;

    /// Fetch the rows selected by `query`.
    fn select(
        remote: Arc<dyn RemoteCollectionClient>,
        query: CollectionQuery,
    ) -> BoxFuture<'static, CatalogResult<Vec<Self>>>;

    /// Partition table holding this type inside `cache`.
    fn partitions(cache: &EntityCache) -> &PartitionTable<Self>;
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a fresh partition.
    pub hits: u64,
    /// Reads that had to wait for a fetch.
    pub misses: u64,
    /// Reads answered with a stale snapshot while a refresh ran.
    pub stale_reads: u64,
    /// Remote fetches started.
    pub fetches: u64,
    /// Remote fetches that failed.
    pub fetch_failures: u64,
    /// Partitions marked stale.
    pub invalidations: u64,
    /// Partitions currently tracked.
    pub partition_count: u64,
}

impl CacheStats {
    /// Fraction of reads answered without waiting (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.stale_reads;
        let total = answered + self.misses;
        if total == 0 {
            0.0
        } else {
            answered as f64 / total as f64
        }
    }
}

// ============================================================================
// IMPLEMENTATIONS FOR CATALOG ENTITIES
// ============================================================================

impl CacheableEntity for Project {
    fn entity_kind() -> EntityKind {
        EntityKind::Project
    }

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn select(
        remote: Arc<dyn RemoteCollectionClient>,
        query: CollectionQuery,
    ) -> BoxFuture<'static, CatalogResult<Vec<Self>>> {
        async move { remote.project_select(&query).await }.boxed()
    }

    fn partitions(cache: &EntityCache) -> &PartitionTable<Self> {
        cache.project_partitions()
    }
}

impl CacheableEntity for Review {
    fn entity_kind() -> EntityKind {
        EntityKind::Review
    }

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn select(
        remote: Arc<dyn RemoteCollectionClient>,
        query: CollectionQuery,
    ) -> BoxFuture<'static, CatalogResult<Vec<Self>>> {
        async move { remote.review_select(&query).await }.boxed()
    }

    fn partitions(cache: &EntityCache) -> &PartitionTable<Self> {
        cache.review_partitions()
    }
}
