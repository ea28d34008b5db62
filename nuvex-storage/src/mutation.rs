//! Write path: admission, validation, one remote write, invalidation.
//!
//! Writes are confirm-then-invalidate. Nothing in the cache changes until
//! the remote store has accepted the write, and a rejected write leaves
//! every snapshot exactly as it was.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nuvex_core::{
    CatalogError, CatalogResult, EntityIdType, EntityKind, MutationOp, NewProject, NewReview,
    Project, ProjectId, ProjectPatch, RemoteError, Review, ReviewId, ReviewPatch, ValidationError,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::auth::AuthorizationGate;
use crate::cache::EntityCache;
use crate::remote::RemoteCollectionClient;

/// A single write against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateProject(NewProject),
    UpdateProject { id: ProjectId, patch: ProjectPatch },
    DeleteProject(ProjectId),
    CreateReview(NewReview),
    UpdateReview { id: ReviewId, patch: ReviewPatch },
    DeleteReview(ReviewId),
}

impl Mutation {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::CreateProject(_) | Self::UpdateProject { .. } | Self::DeleteProject(_) => {
                EntityKind::Project
            }
            Self::CreateReview(_) | Self::UpdateReview { .. } | Self::DeleteReview(_) => {
                EntityKind::Review
            }
        }
    }

    pub fn op(&self) -> MutationOp {
        match self {
            Self::CreateProject(_) | Self::CreateReview(_) => MutationOp::Create,
            Self::UpdateProject { .. } | Self::UpdateReview { .. } => MutationOp::Update,
            Self::DeleteProject(_) | Self::DeleteReview(_) => MutationOp::Delete,
        }
    }

    /// Identifier of the targeted row; `None` for inserts.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::UpdateProject { id, .. } | Self::DeleteProject(id) => Some(id.as_str()),
            Self::UpdateReview { id, .. } | Self::DeleteReview(id) => Some(id.as_str()),
            Self::CreateProject(_) | Self::CreateReview(_) => None,
        }
    }

    /// Entity kinds whose partitions a successful write makes stale.
    ///
    /// Deleting a project also covers reviews: the store may cascade.
    pub fn affected_kinds(&self) -> &'static [EntityKind] {
        match self {
            Self::DeleteProject(_) => &[EntityKind::Project, EntityKind::Review],
            _ if self.kind() == EntityKind::Project => &[EntityKind::Project],
            _ => &[EntityKind::Review],
        }
    }

    /// Normalized copy of the payload, or the first validation failure.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(match self {
            Self::CreateProject(project) => Self::CreateProject(project.validated()?),
            Self::UpdateProject { id, patch } => {
                require_id("id", id.as_str())?;
                Self::UpdateProject {
                    id,
                    patch: patch.validated()?,
                }
            }
            Self::DeleteProject(id) => {
                require_id("id", id.as_str())?;
                Self::DeleteProject(id)
            }
            Self::CreateReview(review) => Self::CreateReview(review.validated()?),
            Self::UpdateReview { id, patch } => {
                require_id("id", id.as_str())?;
                Self::UpdateReview {
                    id,
                    patch: patch.validated()?,
                }
            }
            Self::DeleteReview(id) => {
                require_id("id", id.as_str())?;
                Self::DeleteReview(id)
            }
        })
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op(), self.kind())
    }
}

fn require_id(field: &str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Terminal result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    ProjectCreated(Project),
    ReviewCreated(Review),
    Updated,
    Deleted,
    /// The delete target was already gone. Treated as success.
    AlreadyDeleted,
}

type TargetKey = (EntityKind, String);
type TargetLocks = Arc<Mutex<HashMap<TargetKey, Arc<Mutex<()>>>>>;

/// Executes writes and keeps the cache consistent with them.
///
/// Writes targeting the same `(kind, id)` are queued in arrival order and
/// never interleave. Writes to different targets run concurrently.
///
/// Once a write has left the queue it runs to completion in its own task:
/// dropping the caller's future does not skip the invalidation that follows
/// a committed write.
pub struct MutationCoordinator {
    remote: Arc<dyn RemoteCollectionClient>,
    cache: Arc<EntityCache>,
    gate: Arc<AuthorizationGate>,
    target_locks: TargetLocks,
}

impl fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("cache", &self.cache)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Everything the detached write task owns.
struct WriteTask {
    remote: Arc<dyn RemoteCollectionClient>,
    cache: Arc<EntityCache>,
    target_locks: TargetLocks,
    mutation: Mutation,
    queued: Option<OwnedMutexGuard<()>>,
}

impl MutationCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteCollectionClient>,
        cache: Arc<EntityCache>,
        gate: Arc<AuthorizationGate>,
    ) -> Self {
        Self {
            remote,
            cache,
            gate,
            target_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run one mutation to completion.
    ///
    /// Resolves exactly once:
    /// - admin-gated writes outside `Granted` fail with an authorization
    ///   error before any network call
    /// - invalid payloads fail with a validation error before any network
    ///   call
    /// - on remote success every affected partition is invalidated before
    ///   this returns
    /// - on remote failure the error is returned and the cache is untouched
    pub async fn execute(&self, mutation: Mutation) -> CatalogResult<MutationOutcome> {
        let kind = mutation.kind();
        if kind.requires_admin(mutation.op()) {
            self.gate.admit(&mutation.to_string())?;
        }
        let mutation = mutation.validated()?;

        let queued = match mutation.target() {
            Some(id) => Some(self.target_lock(kind, id).await.lock_owned().await),
            None => None,
        };

        let task = WriteTask {
            remote: Arc::clone(&self.remote),
            cache: Arc::clone(&self.cache),
            target_locks: Arc::clone(&self.target_locks),
            mutation,
            queued,
        };
        match tokio::spawn(task.run()).await {
            Ok(result) => result,
            Err(join_error) => {
                warn!(kind = %kind, error = %join_error, "Mutation task aborted");
                Err(RemoteError::Unreachable {
                    reason: format!("mutation task aborted: {join_error}"),
                }
                .into())
            }
        }
    }

    pub async fn create_project(&self, project: NewProject) -> CatalogResult<Project> {
        match self.execute(Mutation::CreateProject(project)).await? {
            MutationOutcome::ProjectCreated(project) => Ok(project),
            other => Err(unexpected_outcome(&other)),
        }
    }

    pub async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> CatalogResult<MutationOutcome> {
        self.execute(Mutation::UpdateProject { id, patch }).await
    }

    pub async fn delete_project(&self, id: ProjectId) -> CatalogResult<MutationOutcome> {
        self.execute(Mutation::DeleteProject(id)).await
    }

    pub async fn create_review(&self, review: NewReview) -> CatalogResult<Review> {
        match self.execute(Mutation::CreateReview(review)).await? {
            MutationOutcome::ReviewCreated(review) => Ok(review),
            other => Err(unexpected_outcome(&other)),
        }
    }

    pub async fn update_review(
        &self,
        id: ReviewId,
        patch: ReviewPatch,
    ) -> CatalogResult<MutationOutcome> {
        self.execute(Mutation::UpdateReview { id, patch }).await
    }

    pub async fn delete_review(&self, id: ReviewId) -> CatalogResult<MutationOutcome> {
        self.execute(Mutation::DeleteReview(id)).await
    }

    async fn target_lock(&self, kind: EntityKind, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.target_locks.lock().await;
        // Entries only the map still references belong to callers that gave
        // up while queued.
        locks.retain(|_, target_lock| Arc::strong_count(target_lock) > 1);
        Arc::clone(
            locks
                .entry((kind, id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Number of targets with a write in flight or queued.
    pub async fn queued_targets(&self) -> usize {
        self.target_locks
            .lock()
            .await
            .values()
            .filter(|target_lock| Arc::strong_count(target_lock) > 1)
            .count()
    }
}

impl WriteTask {
    async fn run(self) -> CatalogResult<MutationOutcome> {
        let mutation = &self.mutation;
        let result = match self.write().await {
            Err(err) if err.is_not_found() && mutation.op() == MutationOp::Delete => {
                debug!(mutation = %mutation, target = ?mutation.target(), "Delete target already gone");
                Ok(MutationOutcome::AlreadyDeleted)
            }
            other => other,
        };

        match &result {
            Ok(_) => {
                for affected in mutation.affected_kinds() {
                    self.cache.invalidate_kind(*affected);
                }
                info!(mutation = %mutation, target = ?mutation.target(), "Mutation applied");
            }
            Err(err) => {
                warn!(mutation = %mutation, target = ?mutation.target(), error = %err, "Mutation failed");
            }
        }

        self.release_target().await;
        result
    }

    /// Exactly one remote write.
    async fn write(&self) -> CatalogResult<MutationOutcome> {
        match &self.mutation {
            Mutation::CreateProject(project) => self
                .remote
                .project_insert(project)
                .await
                .map(MutationOutcome::ProjectCreated),
            Mutation::UpdateProject { id, patch } => self
                .remote
                .project_update(id, patch)
                .await
                .map(|()| MutationOutcome::Updated),
            Mutation::DeleteProject(id) => self
                .remote
                .project_delete(id)
                .await
                .map(|()| MutationOutcome::Deleted),
            Mutation::CreateReview(review) => self
                .remote
                .review_insert(review)
                .await
                .map(MutationOutcome::ReviewCreated),
            Mutation::UpdateReview { id, patch } => self
                .remote
                .review_update(id, patch)
                .await
                .map(|()| MutationOutcome::Updated),
            Mutation::DeleteReview(id) => self
                .remote
                .review_delete(id)
                .await
                .map(|()| MutationOutcome::Deleted),
        }
    }

    /// Leave the queue, dropping its entry once nobody else waits on it.
    async fn release_target(mut self) {
        let Some(queued) = self.queued.take() else {
            return;
        };
        let Some(id) = self.mutation.target() else {
            return;
        };
        let key = (self.mutation.kind(), id.to_string());
        let mut locks = self.target_locks.lock().await;
        drop(queued);
        if locks
            .get(&key)
            .is_some_and(|target_lock| Arc::strong_count(target_lock) == 1)
        {
            locks.remove(&key);
        }
    }
}

fn unexpected_outcome(outcome: &MutationOutcome) -> CatalogError {
    RemoteError::InvalidResponse {
        reason: format!("unexpected mutation outcome: {outcome:?}"),
    }
    .into()
}
