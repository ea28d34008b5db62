//! Enum types shared across the catalog crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity kind discriminator. Each kind maps to one remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Review,
    UserRole,
}

impl EntityKind {
    /// Name of the remote collection backing this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Review => "reviews",
            Self::UserRole => "user_roles",
        }
    }

    /// Whether a write of the given kind requires the admin role.
    ///
    /// Projects are curated by administrators only. Anyone may submit a
    /// review, but editing or removing one is moderation.
    pub fn requires_admin(self, op: MutationOp) -> bool {
        match (self, op) {
            (Self::Project, _) => true,
            (Self::Review, MutationOp::Create) => false,
            (Self::Review, _) => true,
            (Self::UserRole, _) => true,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Kind of write issued against a remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Role label bound to an identity in the `user_roles` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
}

impl Role {
    /// Stable string value stored in the `role` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
        }
    }
}
