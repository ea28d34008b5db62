//! Boundary trait for the remote collection store.
//!
//! The store exposes table-like collections (`projects`, `reviews`,
//! `user_roles`) and an identity endpoint. Implementations must report a
//! missing update/delete target as [`CatalogError::NotFound`] so the
//! coordinator can tell it apart from transport failures.
//!
//! [`CatalogError::NotFound`]: nuvex_core::CatalogError::NotFound

use async_trait::async_trait;
use nuvex_core::{
    CatalogResult, NewProject, NewReview, Project, ProjectId, ProjectPatch, Review, ReviewId,
    ReviewPatch, Role, UserId, UserIdentity,
};

use crate::query::CollectionQuery;

/// Request/response access to the remote collection store.
///
/// Every method is one network round trip. Implementations perform no
/// retries and no caching.
///
/// A store that filters rows per caller (PostgREST with row-level security)
/// answers a refused update or delete the same way it answers a missing row:
/// an empty representation. Such implementations report both as `NotFound`,
/// so a delete the caller was not allowed to perform surfaces from the
/// coordinator as `AlreadyDeleted`. Deployments that need to tell the two
/// apart must grant delete to every role allowed to read the row.
#[async_trait]
pub trait RemoteCollectionClient: Send + Sync {
    // ========================================================================
    // PROJECT OPERATIONS
    // ========================================================================

    /// Select projects matching the query.
    async fn project_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Project>>;

    /// Insert a project and return the stored row.
    async fn project_insert(&self, project: &NewProject) -> CatalogResult<Project>;

    /// Apply a patch to one project.
    async fn project_update(&self, id: &ProjectId, patch: &ProjectPatch) -> CatalogResult<()>;

    /// Delete one project. A row hidden from the caller counts as missing.
    async fn project_delete(&self, id: &ProjectId) -> CatalogResult<()>;

    // ========================================================================
    // REVIEW OPERATIONS
    // ========================================================================

    /// Select reviews matching the query.
    async fn review_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Review>>;

    /// Insert a review and return the stored row.
    async fn review_insert(&self, review: &NewReview) -> CatalogResult<Review>;

    /// Apply a patch to one review.
    async fn review_update(&self, id: &ReviewId, patch: &ReviewPatch) -> CatalogResult<()>;

    /// Delete one review. A row hidden from the caller counts as missing.
    async fn review_delete(&self, id: &ReviewId) -> CatalogResult<()>;

    // ========================================================================
    // IDENTITY OPERATIONS
    // ========================================================================

    /// Identity of the signed-in actor, or `None` when anonymous.
    async fn current_user(&self) -> CatalogResult<Option<UserIdentity>>;

    /// Whether `user_roles` holds a row binding `role` to `user_id`.
    async fn user_role_exists(&self, user_id: &UserId, role: Role) -> CatalogResult<bool>;
}
