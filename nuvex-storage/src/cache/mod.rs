//! Entity cache with explicit freshness contracts.
//!
//! Reads name their staleness tolerance via [`Freshness`] and get back a
//! [`CacheRead<T>`] that says whether the snapshot was a hit, a fresh fetch,
//! or a stale copy served while a refresh runs.
//!
//! # Example
//!
//! ```ignore
//! // Wait for any pending refresh (read-after-write)
//! let projects = cache.projects(Freshness::Consistent).await?;
//!
//! // Render the previous snapshot immediately while refetching
//! let reviews = cache.reviews(Freshness::StaleWhileRevalidate).await?;
//! if reviews.is_stale() {
//!     tracing::debug!("showing previous reviews while refreshing");
//! }
//! ```

pub mod entity_cache;
pub mod freshness;
pub mod traits;

pub use entity_cache::{CacheConfig, EntityCache, PartitionTable};
pub use freshness::{CacheRead, Freshness};
pub use traits::{CacheStats, CacheableEntity};
