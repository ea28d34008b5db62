//! Advisory admin gate.
//!
//! Resolves the current actor's role once per identity and answers
//! admission checks from memory. The remote store applies its own row-level
//! checks; this gate only stops the client from attempting writes it already
//! knows will be refused.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nuvex_core::{AuthorizationError, CatalogResult, Role, UserIdentity};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::remote::RemoteCollectionClient;

/// Resolution state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No identity resolved yet. Admin views show a neutral checking state.
    Unknown,
    /// Anonymous actor, or an actor without the admin role.
    Denied,
    /// Actor holds the admin role.
    Granted,
}

impl GateState {
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

#[derive(Debug)]
struct GateInner {
    state: GateState,
    actor: Option<UserIdentity>,
    /// Bumped on every reset so a resolution that raced a reset is dropped.
    epoch: u64,
}

/// Session-scoped admin gate.
///
/// `Unknown` moves to `Denied` or `Granted` exactly once per identity, via
/// [`resolve`](Self::resolve). [`reset`](Self::reset) re-enters `Unknown`
/// on sign-in or sign-out.
pub struct AuthorizationGate {
    remote: Arc<dyn RemoteCollectionClient>,
    inner: RwLock<GateInner>,
    resolving: Mutex<()>,
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AuthorizationGate {
    pub fn new(remote: Arc<dyn RemoteCollectionClient>) -> Self {
        Self {
            remote,
            inner: RwLock::new(GateInner {
                state: GateState::Unknown,
                actor: None,
                epoch: 0,
            }),
            resolving: Mutex::new(()),
        }
    }

    /// Current state, without any network call.
    pub fn state(&self) -> GateState {
        self.read().state
    }

    /// Actor seen by the last successful resolution.
    pub fn actor(&self) -> Option<UserIdentity> {
        self.read().actor.clone()
    }

    /// Resolve the actor's role if not yet resolved, and return the state.
    ///
    /// Concurrent callers share one resolution. A lookup failure resolves to
    /// `Denied`; call [`reset`](Self::reset) to try again.
    pub async fn resolve(&self) -> GateState {
        let state = self.state();
        if state.is_resolved() {
            return state;
        }

        let _resolving = self.resolving.lock().await;
        let epoch = {
            let inner = self.read();
            if inner.state.is_resolved() {
                return inner.state;
            }
            inner.epoch
        };

        let (resolved, actor) = match self.lookup().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Permission check failed, denying admin access");
                (GateState::Denied, None)
            }
        };

        let mut inner = self.write();
        if inner.epoch != epoch {
            debug!("Identity changed during permission check, discarding result");
            return inner.state;
        }
        inner.state = resolved;
        inner.actor = actor;
        info!(
            state = ?resolved,
            user_id = ?inner.actor.as_ref().map(|actor| &actor.id),
            "Admin permissions resolved"
        );
        resolved
    }

    /// Admission check for an admin-gated operation. Never touches the
    /// network.
    pub fn admit(&self, operation: &str) -> Result<(), AuthorizationError> {
        match self.state() {
            GateState::Granted => Ok(()),
            GateState::Unknown => Err(AuthorizationError::NotResolved {
                operation: operation.to_string(),
            }),
            GateState::Denied => Err(AuthorizationError::Denied {
                operation: operation.to_string(),
            }),
        }
    }

    /// Forget the resolved role. The next `resolve` asks the remote again.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.state = GateState::Unknown;
        inner.actor = None;
        inner.epoch += 1;
        debug!(epoch = inner.epoch, "Authorization gate reset");
    }

    async fn lookup(&self) -> CatalogResult<(GateState, Option<UserIdentity>)> {
        let Some(user) = self.remote.current_user().await? else {
            return Ok((GateState::Denied, None));
        };
        let is_admin = self.remote.user_role_exists(&user.id, Role::Admin).await?;
        let state = if is_admin {
            GateState::Granted
        } else {
            GateState::Denied
        };
        Ok((state, Some(user)))
    }

    fn read(&self) -> RwLockReadGuard<'_, GateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
