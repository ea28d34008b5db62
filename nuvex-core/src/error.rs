//! Error types for catalog operations

use crate::EntityKind;
use thiserror::Error;

/// Payload validation errors, raised before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Admin-gated write attempted outside the granted state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Permissions not yet resolved for {operation}")]
    NotResolved { operation: String },

    #[error("Admin role required for {operation}")]
    Denied { operation: String },
}

/// Failures reported by the remote collection store or the path to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Remote store rejected request with status {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid response from remote store: {reason}")]
    InvalidResponse { reason: String },
}

/// Master error type for all catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{kind} entry not found: {id}")]
    NotFound { kind: EntityKind, id: String },
}

impl CatalogError {
    /// Construct a not-found error for an entity kind and raw identifier.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true for not-found errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for errors raised locally, before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Authorization(_))
    }
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "Required field missing: name");
    }

    #[test]
    fn test_not_found_display() {
        let err = CatalogError::not_found(EntityKind::Project, "missing-id");
        assert_eq!(err.to_string(), "projects entry not found: missing-id");
        assert!(err.is_not_found());
        assert!(!err.is_local());
    }

    #[test]
    fn test_local_errors() {
        let auth: CatalogError = AuthorizationError::Denied {
            operation: "delete projects".to_string(),
        }
        .into();
        assert!(auth.is_local());

        let remote: CatalogError = RemoteError::Unreachable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(!remote.is_local());
        assert!(remote.to_string().contains("connection refused"));
    }
}
