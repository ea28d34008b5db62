//! Freshness contracts for cache reads.
//!
//! Callers state how they tolerate a stale partition, and every read comes
//! back wrapped in a [`CacheRead`] that says where the snapshot came from.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nuvex_core::Timestamp;

/// Staleness tolerance for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Wait for a stale or unseen partition to be refetched.
    ///
    /// Guarantees read-after-write: once a mutation has resolved, a
    /// consistent read never returns data from before it.
    #[default]
    Consistent,

    /// Return the previous snapshot at once when one exists, tagged stale,
    /// and let the refresh finish in the background.
    ///
    /// Unseen partitions still wait for their first fetch.
    StaleWhileRevalidate,
}

impl Freshness {
    pub fn consistent() -> Self {
        Self::Consistent
    }

    pub fn stale_while_revalidate() -> Self {
        Self::StaleWhileRevalidate
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// Result of a cache read, carrying the snapshot and its provenance.
///
/// The snapshot is shared and immutable; callers that need to edit rows
/// must clone them.
#[derive(Debug)]
pub struct CacheRead<T> {
    snapshot: Arc<Vec<T>>,
    fetched_at: Timestamp,
    was_cache_hit: bool,
    is_stale: bool,
}

impl<T> Clone for CacheRead<T> {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
            is_stale: self.is_stale,
        }
    }
}

impl<T> CacheRead<T> {
    /// A fresh snapshot served from memory.
    pub fn from_cache(snapshot: Arc<Vec<T>>, fetched_at: Timestamp) -> Self {
        Self {
            snapshot,
            fetched_at,
            was_cache_hit: true,
            is_stale: false,
        }
    }

    /// A snapshot produced by a fetch the caller waited for.
    pub fn from_fetch(snapshot: Arc<Vec<T>>, fetched_at: Timestamp) -> Self {
        Self {
            snapshot,
            fetched_at,
            was_cache_hit: false,
            is_stale: false,
        }
    }

    /// A stale snapshot returned while a refresh is in flight.
    pub fn stale(snapshot: Arc<Vec<T>>, fetched_at: Timestamp) -> Self {
        Self {
            snapshot,
            fetched_at,
            was_cache_hit: true,
            is_stale: true,
        }
    }

    pub fn rows(&self) -> &[T] {
        &self.snapshot
    }

    /// Shared handle to the snapshot.
    pub fn snapshot(&self) -> &Arc<Vec<T>> {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> Arc<Vec<T>> {
        self.snapshot
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// True when a newer snapshot may already be on its way.
    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    /// Time since the snapshot was fetched.
    pub fn staleness(&self) -> Duration {
        (Utc::now() - self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl<T> AsRef<[T]> for CacheRead<T> {
    fn as_ref(&self) -> &[T] {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_consistent() {
        assert_eq!(Freshness::default(), Freshness::Consistent);
        assert!(Freshness::consistent().is_consistent());
        assert!(!Freshness::stale_while_revalidate().is_consistent());
    }

    #[test]
    fn test_read_provenance() {
        let rows = Arc::new(vec![1, 2, 3]);
        let hit = CacheRead::from_cache(Arc::clone(&rows), Utc::now());
        assert!(hit.was_cache_hit());
        assert!(!hit.is_stale());

        let miss = CacheRead::from_fetch(Arc::clone(&rows), Utc::now());
        assert!(miss.was_cache_miss());

        let stale = CacheRead::stale(rows, Utc::now());
        assert!(stale.is_stale());
        assert_eq!(stale.rows(), &[1, 2, 3]);
        assert!(stale.staleness() < Duration::from_secs(5));
    }
}
