//! Nuvex Test Utilities
//!
//! Provides test infrastructure for the Nuvex catalog:
//! - Proptest generators for ratings, identifiers and reviews
//! - Fixtures for common scenarios (demo project, signed-in admin)
//! - Re-export of the in-memory remote store

use chrono::{DateTime, Utc};
use nuvex_core::{EntityIdType, ProjectId, Review, ReviewId, Role, Timestamp, UserId, UserIdentity};

pub use nuvex_storage::MockRemote;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog entities.

    use super::*;
    use nuvex_core::{MAX_RATING, MIN_RATING};
    use proptest::prelude::*;

    /// A rating the remote store accepts.
    pub fn arb_rating() -> impl Strategy<Value = u8> {
        MIN_RATING..=MAX_RATING
    }

    pub fn arb_project_id() -> impl Strategy<Value = ProjectId> {
        "p-[a-z0-9]{1,6}".prop_map(ProjectId::new)
    }

    /// Timestamps between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// A review of one of `project_ids`.
    pub fn arb_review(project_ids: Vec<ProjectId>) -> impl Strategy<Value = Review> {
        (
            prop::sample::select(project_ids),
            "[a-z]{1,10}",
            arb_rating(),
            prop::option::of("[a-z ]{0,20}"),
            arb_timestamp(),
        )
            .prop_map(|(project_id, user_name, rating, comment, created_at)| Review {
                id: ReviewId::generate(),
                project_id,
                user_name,
                rating,
                comment,
                created_at,
            })
    }

    /// Up to `max` reviews spread over a small fixed set of projects.
    pub fn arb_reviews(max: usize) -> impl Strategy<Value = Vec<Review>> {
        let projects: Vec<ProjectId> = ["p1", "p2", "p3"].into_iter().map(ProjectId::new).collect();
        prop::collection::vec(arb_review(projects), 0..=max)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built scenarios for integration tests.

    use super::*;

    /// Identifier of the project seeded by [`demo_remote`].
    pub const DEMO_PROJECT: &str = "p1";

    pub fn admin_identity() -> UserIdentity {
        UserIdentity {
            id: UserId::new("admin-1"),
            email: Some("admin@example.com".to_string()),
        }
    }

    pub fn visitor_identity() -> UserIdentity {
        UserIdentity {
            id: UserId::new("visitor-1"),
            email: Some("visitor@example.com".to_string()),
        }
    }

    /// Remote store holding one project with no reviews, anonymous actor.
    pub fn demo_remote() -> MockRemote {
        let remote = MockRemote::new();
        remote.seed_project(DEMO_PROJECT, "Demo Project");
        remote
    }

    /// Same as [`demo_remote`] with an administrator signed in.
    pub fn admin_remote() -> MockRemote {
        let remote = demo_remote();
        let admin = admin_identity();
        remote.grant_role(admin.id.clone(), Role::Admin);
        remote.sign_in(admin);
        remote
    }

    /// A review of `project_id` with a fixed author.
    pub fn review_for(project_id: &ProjectId, rating: u8) -> Review {
        Review {
            id: ReviewId::generate(),
            project_id: project_id.clone(),
            user_name: "fixture".to_string(),
            rating,
            comment: None,
            created_at: Utc::now(),
        }
    }
}
