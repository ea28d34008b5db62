//! Identity types for catalog entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behavior of the opaque identifier newtypes.
///
/// Identifiers are assigned by the remote store and treated as opaque
/// strings on the client. Locally generated identifiers (used by the
/// in-memory store) are UUIDv7 so they sort by creation time.
pub trait EntityIdType: Clone + Eq + std::hash::Hash + fmt::Display {
    /// Wrap an existing identifier.
    fn new(value: impl Into<String>) -> Self;

    /// Borrow the raw identifier.
    fn as_str(&self) -> &str;

    /// Generate a fresh identifier.
    fn generate() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl EntityIdType for $name {
            fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a catalog project.
    ProjectId
);

define_entity_id!(
    /// Identifier of a review.
    ReviewId
);

define_entity_id!(
    /// Identifier of a signed-in user in the remote identity system.
    UserId
);
