//! Error types for the catalog client.

use crate::config::ConfigError;
use nuvex_core::{AuthorizationError, CatalogError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl From<AuthorizationError> for ClientError {
    fn from(err: AuthorizationError) -> Self {
        Self::Catalog(err.into())
    }
}

impl ClientError {
    /// The catalog error carried by this error, if any.
    pub fn as_catalog(&self) -> Option<&CatalogError> {
        match self {
            Self::Catalog(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
