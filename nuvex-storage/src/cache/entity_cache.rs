//! Process-wide entity cache with single-flight refresh.
//!
//! One partition per `(entity kind, query)` pair. Each partition holds its
//! last good snapshot, a freshness flag, a generation counter bumped on every
//! invalidation, and at most one in-flight fetch. Fetches run in detached
//! tasks so a caller that goes away never cancels a refresh other readers
//! are waiting on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use nuvex_core::{
    CatalogError, CatalogResult, EntityKind, Project, ProjectId, RemoteError, Review, Timestamp,
    ValidationError,
};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::freshness::{CacheRead, Freshness};
use super::traits::{CacheStats, CacheableEntity};
use crate::query::{CollectionQuery, PartitionKey};
use crate::remote::RemoteCollectionClient;

/// Configuration for the entity cache.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Age after which a fresh partition is refetched on the next read.
    /// `None` keeps snapshots fresh until invalidated.
    pub entry_ttl: Option<Duration>,
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }
}

struct Snapshot<T> {
    rows: Arc<Vec<T>>,
    fetched_at: Timestamp,
    loaded: Instant,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            fetched_at: self.fetched_at,
            loaded: self.loaded,
        }
    }
}

impl<T> Snapshot<T> {
    fn new(rows: Vec<T>) -> Self {
        Self {
            rows: Arc::new(rows),
            fetched_at: Utc::now(),
            loaded: Instant::now(),
        }
    }
}

type FetchOutcome<T> = Result<Snapshot<T>, CatalogError>;
type SharedFetch<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

struct InFlight<T> {
    generation: u64,
    fetch: SharedFetch<T>,
}

struct PartitionState<T> {
    snapshot: Option<Snapshot<T>>,
    fresh: bool,
    generation: u64,
    in_flight: Option<InFlight<T>>,
}

impl<T> Default for PartitionState<T> {
    fn default() -> Self {
        Self {
            snapshot: None,
            fresh: false,
            generation: 0,
            in_flight: None,
        }
    }
}

type PartitionMap<T> = HashMap<CollectionQuery, PartitionState<T>>;

/// All partitions of one entity type.
pub struct PartitionTable<T> {
    partitions: Arc<Mutex<PartitionMap<T>>>,
}

impl<T> PartitionTable<T> {
    fn new() -> Self {
        Self {
            partitions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PartitionMap<T>> {
        lock(&self.partitions)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Mark one partition stale. Returns false when it was never read.
    fn invalidate(&self, query: &CollectionQuery) -> bool {
        match self.lock().get_mut(query) {
            Some(state) => {
                state.fresh = false;
                state.generation += 1;
                true
            }
            None => false,
        }
    }

    fn invalidate_all(&self) -> u64 {
        let mut partitions = self.lock();
        for state in partitions.values_mut() {
            state.fresh = false;
            state.generation += 1;
        }
        partitions.len() as u64
    }
}

impl<T> fmt::Debug for PartitionTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionTable")
            .field("partitions", &self.len())
            .finish()
    }
}

fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_reads: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    invalidations: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-memory store of fetched collections, shared by every reader in the
/// process.
///
/// # Guarantees
///
/// - Concurrent reads of one partition collapse into one remote fetch.
/// - A failed fetch never replaces the previous snapshot; its error is
///   delivered to every caller waiting on that fetch.
/// - A fetch that started before an invalidation may store its rows but
///   never marks the partition fresh.
///
/// Snapshots are handed out as `Arc<Vec<T>>` and never mutated in place.
pub struct EntityCache {
    remote: Arc<dyn RemoteCollectionClient>,
    projects: PartitionTable<Project>,
    reviews: PartitionTable<Review>,
    config: CacheConfig,
    stats: Arc<StatsCounters>,
}

impl fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache")
            .field("projects", &self.projects)
            .field("reviews", &self.reviews)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EntityCache {
    /// Create an empty cache reading through `remote`.
    pub fn new(remote: Arc<dyn RemoteCollectionClient>, config: CacheConfig) -> Self {
        Self {
            remote,
            projects: PartitionTable::new(),
            reviews: PartitionTable::new(),
            config,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn project_partitions(&self) -> &PartitionTable<Project> {
        &self.projects
    }

    pub(crate) fn review_partitions(&self) -> &PartitionTable<Review> {
        &self.reviews
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Read the partition named by `key`.
    ///
    /// A fresh partition is served from memory. Otherwise a fetch is started
    /// (or joined, when one for the current generation is already running)
    /// and, depending on `freshness`, the caller either waits for it or gets
    /// the previous snapshot back at once.
    pub async fn get<T: CacheableEntity>(
        &self,
        key: &PartitionKey,
        freshness: Freshness,
    ) -> CatalogResult<CacheRead<T>> {
        if key.kind() != T::entity_kind() {
            return Err(ValidationError::InvalidValue {
                field: "partition_key".to_string(),
                reason: format!("{} partition read as {}", key.kind(), T::entity_kind()),
            }
            .into());
        }

        let fetch = {
            let table = T::partitions(self);
            let mut partitions = table.lock();
            let state = partitions.entry(key.query().clone()).or_default();

            if let Some(snapshot) = state.snapshot.as_ref() {
                if state.fresh && !self.is_expired(snapshot) {
                    StatsCounters::bump(&self.stats.hits);
                    return Ok(CacheRead::from_cache(
                        Arc::clone(&snapshot.rows),
                        snapshot.fetched_at,
                    ));
                }
            }

            let fetch = self.ensure_fetch(table, key.query(), state);

            if let (Some(snapshot), Freshness::StaleWhileRevalidate) =
                (state.snapshot.as_ref(), freshness)
            {
                StatsCounters::bump(&self.stats.stale_reads);
                return Ok(CacheRead::stale(
                    Arc::clone(&snapshot.rows),
                    snapshot.fetched_at,
                ));
            }

            StatsCounters::bump(&self.stats.misses);
            fetch
        };

        let snapshot = fetch.await?;
        Ok(CacheRead::from_fetch(snapshot.rows, snapshot.fetched_at))
    }

    /// Every project, newest first.
    pub async fn projects(&self, freshness: Freshness) -> CatalogResult<CacheRead<Project>> {
        self.get(&PartitionKey::all_projects(), freshness).await
    }

    /// Every review, newest first.
    pub async fn reviews(&self, freshness: Freshness) -> CatalogResult<CacheRead<Review>> {
        self.get(&PartitionKey::all_reviews(), freshness).await
    }

    /// Reviews of one project, newest first.
    pub async fn reviews_for_project(
        &self,
        project_id: &ProjectId,
        freshness: Freshness,
    ) -> CatalogResult<CacheRead<Review>> {
        self.get(&PartitionKey::reviews_for_project(project_id), freshness)
            .await
    }

    /// Current snapshot of a partition without fetching, fresh or not.
    pub fn peek<T: CacheableEntity>(&self, key: &PartitionKey) -> Option<Arc<Vec<T>>> {
        if key.kind() != T::entity_kind() {
            return None;
        }
        T::partitions(self)
            .lock()
            .get(key.query())
            .and_then(|state| state.snapshot.as_ref())
            .map(|snapshot| Arc::clone(&snapshot.rows))
    }

    /// Whether a read of `key` would be served from memory right now.
    pub fn is_fresh(&self, key: &PartitionKey) -> bool {
        match key.kind() {
            EntityKind::Project => self.partition_is_fresh(&self.projects, key.query()),
            EntityKind::Review => self.partition_is_fresh(&self.reviews, key.query()),
            EntityKind::UserRole => false,
        }
    }

    fn partition_is_fresh<T>(&self, table: &PartitionTable<T>, query: &CollectionQuery) -> bool {
        table.lock().get(query).is_some_and(|state| {
            state.fresh
                && state
                    .snapshot
                    .as_ref()
                    .is_some_and(|snapshot| !self.is_expired(snapshot))
        })
    }

    fn is_expired<T>(&self, snapshot: &Snapshot<T>) -> bool {
        self.config
            .entry_ttl
            .is_some_and(|ttl| snapshot.loaded.elapsed() >= ttl)
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Mark one partition stale. Does not fetch; the next read does.
    pub fn invalidate(&self, key: &PartitionKey) {
        let tracked = match key.kind() {
            EntityKind::Project => self.projects.invalidate(key.query()),
            EntityKind::Review => self.reviews.invalidate(key.query()),
            EntityKind::UserRole => false,
        };
        if tracked {
            StatsCounters::bump(&self.stats.invalidations);
            debug!(partition = %key, "Partition invalidated");
        }
    }

    /// Mark every partition of `kind` stale. Returns how many were touched.
    pub fn invalidate_kind(&self, kind: EntityKind) -> u64 {
        let count = match kind {
            EntityKind::Project => self.projects.invalidate_all(),
            EntityKind::Review => self.reviews.invalidate_all(),
            EntityKind::UserRole => 0,
        };
        self.stats.invalidations.fetch_add(count, Ordering::Relaxed);
        debug!(kind = %kind, partitions = count, "Entity kind invalidated");
        count
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            stale_reads: self.stats.stale_reads.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            fetch_failures: self.stats.fetch_failures.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            partition_count: (self.projects.len() + self.reviews.len()) as u64,
        }
    }

    // ========================================================================
    // FETCHING
    // ========================================================================

    /// Join the fetch for the current generation, or start one.
    ///
    /// A fetch left over from an older generation is not joined: its rows may
    /// predate the invalidation. The new fetch waits for it first so that at
    /// most one request per partition is on the wire and snapshots are
    /// stored in request order.
    fn ensure_fetch<T: CacheableEntity>(
        &self,
        table: &PartitionTable<T>,
        query: &CollectionQuery,
        state: &mut PartitionState<T>,
    ) -> SharedFetch<T> {
        if let Some(in_flight) = state.in_flight.as_ref() {
            if in_flight.generation == state.generation {
                return in_flight.fetch.clone();
            }
        }
        let previous = state.in_flight.take().map(|in_flight| in_flight.fetch);
        let generation = state.generation;
        let fetch = self.spawn_fetch(table, query.clone(), generation, previous);
        state.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        fetch
    }

    fn spawn_fetch<T: CacheableEntity>(
        &self,
        table: &PartitionTable<T>,
        query: CollectionQuery,
        generation: u64,
        previous: Option<SharedFetch<T>>,
    ) -> SharedFetch<T> {
        let kind = T::entity_kind();
        let remote = Arc::clone(&self.remote);
        let partitions = Arc::clone(&table.partitions);
        let stats = Arc::clone(&self.stats);
        StatsCounters::bump(&stats.fetches);

        let task_query = query.clone();
        let task_partitions = Arc::clone(&partitions);
        let task_stats = Arc::clone(&stats);
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            debug!(kind = %kind, query = %task_query, generation, "Fetching partition");
            let result = T::select(remote, task_query.clone()).await;

            let mut partitions = lock(&task_partitions);
            let state = partitions.entry(task_query.clone()).or_default();
            clear_in_flight(state, generation);
            match result {
                Ok(rows) => {
                    let snapshot = Snapshot::new(rows);
                    let current = state.generation == generation;
                    state.snapshot = Some(snapshot.clone());
                    if current {
                        state.fresh = true;
                    }
                    drop(partitions);
                    debug!(
                        kind = %kind,
                        query = %task_query,
                        rows = snapshot.rows.len(),
                        current,
                        "Partition refreshed"
                    );
                    Ok(snapshot)
                }
                Err(err) => {
                    drop(partitions);
                    StatsCounters::bump(&task_stats.fetch_failures);
                    warn!(kind = %kind, query = %task_query, error = %err, "Partition fetch failed");
                    Err(err)
                }
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    clear_in_flight(
                        lock(&partitions).entry(query.clone()).or_default(),
                        generation,
                    );
                    StatsCounters::bump(&stats.fetch_failures);
                    warn!(kind = %kind, query = %query, error = %join_error, "Partition fetch aborted");
                    Err(RemoteError::Unreachable {
                        reason: format!("partition fetch aborted: {join_error}"),
                    }
                    .into())
                }
            }
        }
        .boxed()
        .shared()
    }
}

fn clear_in_flight<T>(state: &mut PartitionState<T>, generation: u64) {
    if state
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.generation == generation)
    {
        state.in_flight = None;
    }
}
