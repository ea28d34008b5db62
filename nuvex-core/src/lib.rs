//! Nuvex Core - Entity Types
//!
//! Catalog entities, write payloads, the error taxonomy, and rating
//! aggregation. Every other crate depends on this one.
//! Nothing here touches the network or the cache.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod rating;

pub use entities::{
    NewProject, NewReview, Project, ProjectPatch, Review, ReviewPatch, UserIdentity, MAX_RATING,
    MIN_RATING,
};
pub use enums::{EntityKind, MutationOp, Role};
pub use error::{AuthorizationError, CatalogError, CatalogResult, RemoteError, ValidationError};
pub use identity::{EntityIdType, ProjectId, ReviewId, Timestamp, UserId};
pub use rating::{
    aggregate_rating, catalog_stats, overall_rating, reviews_for, CatalogStats, RatingSummary,
};
