//! In-memory remote store for tests.
//!
//! `MockRemote` behaves like the hosted store closely enough for the
//! consistency tests: it assigns identifiers and timestamps, enforces the
//! review foreign key, cascades review deletion, and reports missing
//! update/delete targets as not found. Every call is counted so tests can
//! assert how many round trips an operation cost.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nuvex_core::{
    CatalogError, CatalogResult, EntityIdType, EntityKind, NewProject, NewReview, Project,
    ProjectId, ProjectPatch, RemoteError, Review, ReviewId, ReviewPatch, Role, Timestamp, UserId,
    UserIdentity,
};

use crate::query::CollectionQuery;
use crate::remote::RemoteCollectionClient;

/// Round trips recorded against one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub selects: u64,
    pub writes: u64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        self.selects + self.writes
    }
}

/// Progress of one insert/update/delete, in the order the store saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent {
    Started(EntityKind),
    Finished(EntityKind),
}

/// In-memory implementation of [`RemoteCollectionClient`].
///
/// Clones share state, so a test can keep a handle while the cache owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    projects: Arc<RwLock<Vec<Project>>>,
    reviews: Arc<RwLock<Vec<Review>>>,
    roles: Arc<RwLock<HashSet<(UserId, Role)>>>,
    signed_in: Arc<RwLock<Option<UserIdentity>>>,
    calls: Arc<Mutex<HashMap<EntityKind, CallCounts>>>,
    identity_calls: Arc<Mutex<u64>>,
    fail_next_select: Arc<Mutex<Option<RemoteError>>>,
    fail_next_write: Arc<Mutex<Option<RemoteError>>>,
    fail_next_identity: Arc<Mutex<Option<RemoteError>>>,
    select_delay: Arc<Mutex<Duration>>,
    write_delays: Arc<Mutex<VecDeque<Duration>>>,
    write_ack_delay: Arc<Mutex<Duration>>,
    write_log: Arc<Mutex<Vec<WriteEvent>>>,
    hidden: Arc<RwLock<HashSet<String>>>,
    clock: Arc<Mutex<Option<Timestamp>>>,
}

impl MockRemote {
    /// Create an empty store with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Store a project directly, without counting a call.
    pub fn seed_project(&self, id: impl Into<String>, name: impl Into<String>) -> Project {
        let project = Project {
            id: ProjectId::new(id),
            name: name.into(),
            description: None,
            url: None,
            image_url: None,
            created_at: self.next_timestamp(),
        };
        write(&self.projects).push(project.clone());
        project
    }

    /// Store a review directly, without counting a call.
    pub fn seed_review(&self, project_id: &ProjectId, user_name: &str, rating: u8) -> Review {
        let review = Review {
            id: ReviewId::generate(),
            project_id: project_id.clone(),
            user_name: user_name.to_string(),
            rating,
            comment: None,
            created_at: self.next_timestamp(),
        };
        write(&self.reviews).push(review.clone());
        review
    }

    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        read(&self.projects).iter().find(|p| &p.id == id).cloned()
    }

    pub fn project_count(&self) -> usize {
        read(&self.projects).len()
    }

    pub fn review_count(&self) -> usize {
        read(&self.reviews).len()
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    pub fn sign_in(&self, identity: UserIdentity) {
        *write(&self.signed_in) = Some(identity);
    }

    pub fn sign_out(&self) {
        *write(&self.signed_in) = None;
    }

    pub fn grant_role(&self, user_id: UserId, role: Role) {
        write(&self.roles).insert((user_id, role));
    }

    pub fn revoke_role(&self, user_id: &UserId, role: Role) {
        write(&self.roles).remove(&(user_id.clone(), role));
    }

    /// Hide a row from writes the way a row-level security policy does:
    /// it still selects, but updates and deletes match nothing.
    pub fn hide_from_writes(&self, id: &str) {
        write(&self.hidden).insert(id.to_string());
    }

    // ========================================================================
    // FAULT INJECTION
    // ========================================================================

    /// Fail the next select on any collection with `error`.
    pub fn fail_next_select(&self, error: RemoteError) {
        *lock(&self.fail_next_select) = Some(error);
    }

    /// Fail the next insert/update/delete on any collection with `error`.
    pub fn fail_next_write(&self, error: RemoteError) {
        *lock(&self.fail_next_write) = Some(error);
    }

    /// Fail the next identity lookup with `error`.
    pub fn fail_next_identity(&self, error: RemoteError) {
        *lock(&self.fail_next_identity) = Some(error);
    }

    /// Delay every select by `delay` before answering.
    pub fn set_select_delay(&self, delay: Duration) {
        *lock(&self.select_delay) = delay;
    }

    /// Delay the next not-yet-delayed write by `delay` before it applies.
    /// Queued delays are consumed one per write, in call order.
    pub fn push_write_delay(&self, delay: Duration) {
        lock(&self.write_delays).push_back(delay);
    }

    /// Hold every write response for `delay` after the write has applied.
    pub fn set_write_ack_delay(&self, delay: Duration) {
        *lock(&self.write_ack_delay) = delay;
    }

    /// Start and finish of every write so far.
    pub fn write_log(&self) -> Vec<WriteEvent> {
        lock(&self.write_log).clone()
    }

    // ========================================================================
    // CALL ACCOUNTING
    // ========================================================================

    pub fn calls(&self, kind: EntityKind) -> CallCounts {
        lock(&self.calls).get(&kind).copied().unwrap_or_default()
    }

    pub fn select_calls(&self, kind: EntityKind) -> u64 {
        self.calls(kind).selects
    }

    pub fn write_calls(&self, kind: EntityKind) -> u64 {
        self.calls(kind).writes
    }

    /// Every round trip made so far, identity lookups included.
    pub fn total_calls(&self) -> u64 {
        let collections: u64 = lock(&self.calls).values().map(CallCounts::total).sum();
        collections + *lock(&self.identity_calls)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Strictly increasing timestamps so newest-first ordering is stable.
    fn next_timestamp(&self) -> Timestamp {
        let mut clock = lock(&self.clock);
        let now = Utc::now();
        let next = match *clock {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        *clock = Some(next);
        next
    }

    async fn before_select(&self, kind: EntityKind) -> Result<(), RemoteError> {
        lock(&self.calls).entry(kind).or_default().selects += 1;
        let delay = *lock(&self.select_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.fail_next_select).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn before_write(&self, kind: EntityKind) -> Result<(), RemoteError> {
        lock(&self.calls).entry(kind).or_default().writes += 1;
        lock(&self.write_log).push(WriteEvent::Started(kind));
        let delay = lock(&self.write_delays).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.fail_next_write).take() {
            Some(err) => {
                lock(&self.write_log).push(WriteEvent::Finished(kind));
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Record the end of a write, then hold the response if configured.
    async fn after_write<T>(&self, kind: EntityKind, result: CatalogResult<T>) -> CatalogResult<T> {
        lock(&self.write_log).push(WriteEvent::Finished(kind));
        let delay = *lock(&self.write_ack_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn writable(&self, id: &str) -> bool {
        !read(&self.hidden).contains(id)
    }

    fn before_identity(&self) -> Result<(), RemoteError> {
        *lock(&self.identity_calls) += 1;
        match lock(&self.fail_next_identity).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RemoteCollectionClient for MockRemote {
    // === Project Operations ===

    async fn project_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Project>> {
        self.before_select(EntityKind::Project).await?;
        let rows = read(&self.projects).clone();
        Ok(query.apply(rows))
    }

    async fn project_insert(&self, project: &NewProject) -> CatalogResult<Project> {
        self.before_write(EntityKind::Project).await?;
        let stored = Project {
            id: ProjectId::generate(),
            name: project.name.clone(),
            description: project.description.clone(),
            url: project.url.clone(),
            image_url: project.image_url.clone(),
            created_at: self.next_timestamp(),
        };
        write(&self.projects).push(stored.clone());
        self.after_write(EntityKind::Project, Ok(stored)).await
    }

    async fn project_update(&self, id: &ProjectId, patch: &ProjectPatch) -> CatalogResult<()> {
        self.before_write(EntityKind::Project).await?;
        let result = match write(&self.projects)
            .iter_mut()
            .find(|p| &p.id == id && self.writable(id.as_str()))
        {
            Some(project) => {
                patch.apply_to(project);
                Ok(())
            }
            None => Err(CatalogError::not_found(EntityKind::Project, id.as_str())),
        };
        self.after_write(EntityKind::Project, result).await
    }

    async fn project_delete(&self, id: &ProjectId) -> CatalogResult<()> {
        self.before_write(EntityKind::Project).await?;
        let removed = {
            let mut projects = write(&self.projects);
            let before = projects.len();
            projects.retain(|p| &p.id != id || !self.writable(id.as_str()));
            projects.len() != before
        };
        let result = if removed {
            // The hosted schema declares ON DELETE CASCADE on reviews.project_id.
            write(&self.reviews).retain(|r| &r.project_id != id);
            Ok(())
        } else {
            Err(CatalogError::not_found(EntityKind::Project, id.as_str()))
        };
        self.after_write(EntityKind::Project, result).await
    }

    // === Review Operations ===

    async fn review_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Review>> {
        self.before_select(EntityKind::Review).await?;
        let rows = read(&self.reviews).clone();
        Ok(query.apply(rows))
    }

    async fn review_insert(&self, review: &NewReview) -> CatalogResult<Review> {
        self.before_write(EntityKind::Review).await?;
        let result = if self.project(&review.project_id).is_none() {
            Err(RemoteError::Rejected {
                status: 409,
                code: Some("23503".to_string()),
                message: "insert or update on table \"reviews\" violates foreign key constraint"
                    .to_string(),
            }
            .into())
        } else {
            let stored = Review {
                id: ReviewId::generate(),
                project_id: review.project_id.clone(),
                user_name: review.user_name.clone(),
                rating: review.rating,
                comment: review.comment.clone(),
                created_at: self.next_timestamp(),
            };
            write(&self.reviews).push(stored.clone());
            Ok(stored)
        };
        self.after_write(EntityKind::Review, result).await
    }

    async fn review_update(&self, id: &ReviewId, patch: &ReviewPatch) -> CatalogResult<()> {
        self.before_write(EntityKind::Review).await?;
        let result = match write(&self.reviews)
            .iter_mut()
            .find(|r| &r.id == id && self.writable(id.as_str()))
        {
            Some(review) => {
                patch.apply_to(review);
                Ok(())
            }
            None => Err(CatalogError::not_found(EntityKind::Review, id.as_str())),
        };
        self.after_write(EntityKind::Review, result).await
    }

    async fn review_delete(&self, id: &ReviewId) -> CatalogResult<()> {
        self.before_write(EntityKind::Review).await?;
        let removed = {
            let mut reviews = write(&self.reviews);
            let before = reviews.len();
            reviews.retain(|r| &r.id != id || !self.writable(id.as_str()));
            reviews.len() != before
        };
        let result = if removed {
            Ok(())
        } else {
            Err(CatalogError::not_found(EntityKind::Review, id.as_str()))
        };
        self.after_write(EntityKind::Review, result).await
    }

    // === Identity Operations ===

    async fn current_user(&self) -> CatalogResult<Option<UserIdentity>> {
        self.before_identity()?;
        Ok(read(&self.signed_in).clone())
    }

    async fn user_role_exists(&self, user_id: &UserId, role: Role) -> CatalogResult<bool> {
        self.before_select(EntityKind::UserRole).await?;
        Ok(read(&self.roles).contains(&(user_id.clone(), role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_counts_and_orders() {
        let remote = MockRemote::new();
        let first = remote.seed_project("p1", "First");
        let second = remote.seed_project("p2", "Second");

        let query = CollectionQuery::new().order_by("created_at", false);
        let rows = remote.project_select(&query).await.unwrap();
        assert_eq!(rows, vec![second, first]);
        assert_eq!(remote.select_calls(EntityKind::Project), 1);
        assert_eq!(remote.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_targets_are_not_found() {
        let remote = MockRemote::new();
        let err = remote
            .project_delete(&ProjectId::new("missing-id"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = remote
            .review_update(&ReviewId::new("missing-id"), &ReviewPatch::new().rating(3))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(remote.write_calls(EntityKind::Review), 1);
    }

    #[tokio::test]
    async fn test_review_insert_enforces_foreign_key() {
        let remote = MockRemote::new();
        let err = remote
            .review_insert(&NewReview::new(ProjectId::new("nope"), "Ada", 4))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Remote(RemoteError::Rejected { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_project_delete_cascades_reviews() {
        let remote = MockRemote::new();
        let project = remote.seed_project("p1", "Demo");
        remote.seed_review(&project.id, "Ada", 5);
        remote.project_delete(&project.id).await.unwrap();
        assert_eq!(remote.review_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_fire_once() {
        let remote = MockRemote::new();
        remote.fail_next_select(RemoteError::Unreachable {
            reason: "offline".to_string(),
        });
        let query = CollectionQuery::new();
        assert!(remote.project_select(&query).await.is_err());
        assert!(remote.project_select(&query).await.is_ok());
    }

    #[tokio::test]
    async fn test_role_lookup() {
        let remote = MockRemote::new();
        let user = UserId::new("u1");
        assert!(!remote.user_role_exists(&user, Role::Admin).await.unwrap());
        remote.grant_role(user.clone(), Role::Admin);
        assert!(remote.user_role_exists(&user, Role::Admin).await.unwrap());
        assert_eq!(remote.select_calls(EntityKind::UserRole), 2);
    }
}
