//! Catalog facade.
//!
//! Composes one [`EntityCache`], one [`AuthorizationGate`] and one
//! [`MutationCoordinator`] over a shared remote store, and exposes the read
//! models the UI renders. Every view built from the same client sees the
//! same snapshots.

use std::sync::Arc;

use nuvex_core::{
    aggregate_rating, CatalogResult, NewProject, NewReview, Project, ProjectId, ProjectPatch,
    RatingSummary, Review, ReviewId, ReviewPatch,
};
use nuvex_storage::{
    AuthorizationGate, CacheConfig, CacheRead, CacheStats, EntityCache, Freshness, GateState,
    MutationCoordinator, MutationOutcome, RemoteCollectionClient,
};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::rest::PostgrestClient;
use crate::views::{project_cards, AdminDashboard, ProjectCard};

const ADMIN_DASHBOARD: &str = "read admin dashboard";

#[derive(Debug)]
pub struct CatalogClient {
    cache: Arc<EntityCache>,
    gate: Arc<AuthorizationGate>,
    mutations: MutationCoordinator,
}

impl CatalogClient {
    pub fn new(remote: Arc<dyn RemoteCollectionClient>, config: CacheConfig) -> Self {
        let cache = Arc::new(EntityCache::new(Arc::clone(&remote), config));
        let gate = Arc::new(AuthorizationGate::new(Arc::clone(&remote)));
        let mutations = MutationCoordinator::new(remote, Arc::clone(&cache), Arc::clone(&gate));
        Self {
            cache,
            gate,
            mutations,
        }
    }

    /// Build a client talking HTTP to the store named in `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let remote = PostgrestClient::new(config)?;
        debug!(base_url = remote.base_url(), "Catalog client configured");
        Ok(Self::new(Arc::new(remote), config.cache_config()))
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.mutations
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Public listing: one card per project, newest project first.
    pub async fn list_projects(&self, freshness: Freshness) -> CatalogResult<Vec<ProjectCard>> {
        let (projects, reviews) = tokio::try_join!(
            self.cache.projects(freshness),
            self.cache.reviews(freshness)
        )?;
        Ok(project_cards(projects.rows(), reviews.rows()))
    }

    /// Reviews of one project, newest first.
    pub async fn project_reviews(
        &self,
        project_id: &ProjectId,
        freshness: Freshness,
    ) -> CatalogResult<CacheRead<Review>> {
        self.cache.reviews_for_project(project_id, freshness).await
    }

    /// Rating of one project, computed from the current review snapshot.
    pub async fn project_rating(
        &self,
        project_id: &ProjectId,
        freshness: Freshness,
    ) -> CatalogResult<RatingSummary> {
        let reviews = self.project_reviews(project_id, freshness).await?;
        Ok(aggregate_rating(reviews.rows(), project_id))
    }

    /// Administrator dashboard. Resolves the gate on first use and fetches
    /// nothing unless it is `Granted`.
    pub async fn admin_dashboard(&self, freshness: Freshness) -> CatalogResult<AdminDashboard> {
        self.gate.resolve().await;
        self.gate.admit(ADMIN_DASHBOARD)?;
        let (projects, reviews) = tokio::try_join!(
            self.cache.projects(freshness),
            self.cache.reviews(freshness)
        )?;
        Ok(AdminDashboard::build(projects.rows(), reviews.rows()))
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Resolve the actor's admin role if not yet known.
    pub async fn resolve_permissions(&self) -> GateState {
        self.gate.resolve().await
    }

    /// Call on sign-in or sign-out. Admin writes are refused until the next
    /// [`resolve_permissions`](Self::resolve_permissions).
    pub fn identity_changed(&self) {
        self.gate.reset();
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Post a review. Open to every visitor.
    pub async fn submit_review(&self, review: NewReview) -> CatalogResult<Review> {
        self.mutations.create_review(review).await
    }

    pub async fn update_review(
        &self,
        id: ReviewId,
        patch: ReviewPatch,
    ) -> CatalogResult<MutationOutcome> {
        self.mutations.update_review(id, patch).await
    }

    pub async fn delete_review(&self, id: ReviewId) -> CatalogResult<MutationOutcome> {
        self.mutations.delete_review(id).await
    }

    pub async fn create_project(&self, project: NewProject) -> CatalogResult<Project> {
        self.mutations.create_project(project).await
    }

    pub async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> CatalogResult<MutationOutcome> {
        self.mutations.update_project(id, patch).await
    }

    pub async fn delete_project(&self, id: ProjectId) -> CatalogResult<MutationOutcome> {
        self.mutations.delete_project(id).await
    }
}
