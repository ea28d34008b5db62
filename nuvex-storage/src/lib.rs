//! Nuvex Storage - Client-Side Consistency Core
//!
//! Holds fetched collections in memory, performs writes against the remote
//! collection store, and guarantees that once a write resolves every reader
//! in the process observes it.
//!
//! - [`RemoteCollectionClient`]: the boundary to the remote store
//! - [`EntityCache`]: single-flight, generation-guarded partition cache
//! - [`AuthorizationGate`]: advisory admin gate, resolved once per identity
//! - [`MutationCoordinator`]: confirm-then-invalidate write path with
//!   per-target serialization
//! - [`MockRemote`]: in-memory remote store for tests

pub mod auth;
pub mod cache;
pub mod mock;
pub mod mutation;
pub mod query;
pub mod remote;

pub use auth::{AuthorizationGate, GateState};
pub use cache::{
    CacheConfig, CacheRead, CacheStats, CacheableEntity, EntityCache, Freshness, PartitionTable,
};
pub use mock::{CallCounts, MockRemote, WriteEvent};
pub use mutation::{Mutation, MutationCoordinator, MutationOutcome};
pub use query::{CollectionQuery, Filter, Order, PartitionKey};
pub use remote::RemoteCollectionClient;
