//! Catalog consistency scenarios against the in-memory remote store.
//!
//! Each test drives `CatalogClient` the way the UI does and checks what the
//! remote store saw (call counts) alongside what the reader got back.

use std::sync::Arc;
use std::time::Duration;

use nuvex_client::{CatalogClient, Freshness, GateState, MutationOutcome};
use nuvex_core::{
    AuthorizationError, CatalogError, EntityIdType, EntityKind, NewProject, NewReview, ProjectId,
    ProjectPatch, RemoteError, ReviewId, ValidationError,
};
use nuvex_storage::{CacheConfig, PartitionKey, WriteEvent};
use nuvex_test_utils::fixtures::{admin_remote, demo_remote, DEMO_PROJECT};
use nuvex_test_utils::MockRemote;

fn client(remote: &MockRemote) -> CatalogClient {
    CatalogClient::new(Arc::new(remote.clone()), CacheConfig::new())
}

fn demo_id() -> ProjectId {
    ProjectId::new(DEMO_PROJECT)
}

// ============================================================================
// READS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_listings_share_one_fetch_per_collection() {
    let remote = demo_remote();
    remote.set_select_delay(Duration::from_millis(50));
    let catalog = client(&remote);

    let (a, b) = tokio::join!(
        catalog.list_projects(Freshness::Consistent),
        catalog.list_projects(Freshness::Consistent)
    );

    assert_eq!(a.expect("first listing"), b.expect("second listing"));
    assert_eq!(remote.select_calls(EntityKind::Project), 1);
    assert_eq!(remote.select_calls(EntityKind::Review), 1);
}

#[tokio::test]
async fn listing_previews_two_newest_reviews() {
    let remote = demo_remote();
    let p2 = remote.seed_project("p2", "Second");
    for rating in [1, 2, 3, 4, 5] {
        remote.seed_review(&demo_id(), "visitor", rating);
    }
    let catalog = client(&remote);

    let cards = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");

    // Newest project first.
    assert_eq!(cards[0].project.id, p2.id);
    assert_eq!(cards[0].more_reviews, 0);

    let demo = &cards[1];
    let previewed: Vec<u8> = demo.preview.iter().map(|r| r.rating).collect();
    assert_eq!(previewed, vec![5, 4]);
    assert_eq!(demo.more_reviews, 3);
    assert_eq!(demo.rating.average, 3.0);
    assert_eq!(demo.rating.count, 5);
}

#[tokio::test]
async fn fetch_failure_reaches_every_waiter_and_leaves_partition_empty() {
    let remote = demo_remote();
    remote.fail_next_select(RemoteError::Unreachable {
        reason: "connection reset".to_string(),
    });
    let catalog = client(&remote);

    let (a, b) = tokio::join!(
        catalog.cache().projects(Freshness::Consistent),
        catalog.cache().projects(Freshness::Consistent)
    );
    let a = a.expect_err("first waiter fails");
    let b = b.expect_err("second waiter fails");
    assert_eq!(a, b);
    assert_eq!(remote.select_calls(EntityKind::Project), 1);
    assert!(!catalog.cache().is_fresh(&PartitionKey::all_projects()));

    let retry = catalog
        .cache()
        .projects(Freshness::Consistent)
        .await
        .expect("retry succeeds");
    assert_eq!(retry.len(), 1);
    assert_eq!(remote.select_calls(EntityKind::Project), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_while_revalidate_serves_previous_snapshot() {
    let remote = demo_remote();
    let catalog = client(&remote);
    let first = catalog
        .project_reviews(&demo_id(), Freshness::Consistent)
        .await
        .expect("first read");
    assert!(first.is_empty());

    remote.seed_review(&demo_id(), "visitor", 4);
    remote.set_select_delay(Duration::from_millis(100));
    catalog
        .cache()
        .invalidate(&PartitionKey::reviews_for_project(&demo_id()));

    let stale = catalog
        .project_reviews(&demo_id(), Freshness::StaleWhileRevalidate)
        .await
        .expect("stale read");
    assert!(stale.is_stale());
    assert!(stale.is_empty());

    let fresh = catalog
        .project_reviews(&demo_id(), Freshness::Consistent)
        .await
        .expect("consistent read");
    assert!(!fresh.is_stale());
    assert_eq!(fresh.len(), 1);
    assert_eq!(remote.select_calls(EntityKind::Review), 2);
}

// ============================================================================
// WRITES
// ============================================================================

#[tokio::test]
async fn submitted_review_is_visible_to_the_next_read() {
    let remote = demo_remote();
    let catalog = client(&remote);
    let before = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    assert_eq!(before[0].rating.count, 0);

    let review = catalog
        .submit_review(NewReview::new(demo_id(), "  Ada ", 5).with_comment("   "))
        .await
        .expect("review posted");
    assert_eq!(review.user_name, "Ada");
    assert_eq!(review.comment, None);

    let after = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    assert_eq!(after[0].rating.count, 1);
    assert_eq!(after[0].preview[0].id, review.id);
    assert_eq!(remote.select_calls(EntityKind::Review), 2);
}

#[tokio::test]
async fn rating_follows_review_submissions() {
    let remote = demo_remote();
    let catalog = client(&remote);

    for rating in [5, 3] {
        catalog
            .submit_review(NewReview::new(demo_id(), "visitor", rating))
            .await
            .expect("review posted");
    }
    let rating = catalog
        .project_rating(&demo_id(), Freshness::Consistent)
        .await
        .expect("rating");
    assert_eq!((rating.average, rating.count), (4.0, 2));
    assert_eq!(rating.display_average(), "4.0");

    catalog
        .submit_review(NewReview::new(demo_id(), "visitor", 4))
        .await
        .expect("review posted");
    let rating = catalog
        .project_rating(&demo_id(), Freshness::Consistent)
        .await
        .expect("rating");
    assert_eq!((rating.average, rating.count), (4.0, 3));
}

#[tokio::test]
async fn invalid_review_never_reaches_the_store() {
    let remote = demo_remote();
    let catalog = client(&remote);

    let err = catalog
        .submit_review(NewReview::new(demo_id(), "visitor", 0))
        .await
        .expect_err("zero rating rejected");
    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::RequiredFieldMissing { .. })
    ));

    let err = catalog
        .submit_review(NewReview::new(demo_id(), "   ", 3))
        .await
        .expect_err("blank author rejected");
    assert!(err.is_local());
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test]
async fn failed_write_leaves_cache_untouched() {
    let remote = admin_remote();
    let catalog = client(&remote);
    assert_eq!(catalog.resolve_permissions().await, GateState::Granted);
    catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");

    remote.fail_next_write(RemoteError::Rejected {
        status: 500,
        code: None,
        message: "internal error".to_string(),
    });
    let err = catalog
        .update_project(demo_id(), ProjectPatch::new().name("Renamed"))
        .await
        .expect_err("write fails");
    assert!(matches!(err, CatalogError::Remote(RemoteError::Rejected { status: 500, .. })));

    assert!(catalog.cache().is_fresh(&PartitionKey::all_projects()));
    let cards = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    assert_eq!(cards[0].project.name, "Demo Project");
    assert_eq!(remote.select_calls(EntityKind::Project), 1);
}

#[tokio::test(start_paused = true)]
async fn same_target_updates_apply_in_order() {
    let remote = admin_remote();
    let catalog = client(&remote);
    catalog.resolve_permissions().await;
    catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    remote.push_write_delay(Duration::from_millis(40));

    let (first, second) = tokio::join!(
        catalog.update_project(demo_id(), ProjectPatch::new().name("First")),
        catalog.update_project(demo_id(), ProjectPatch::new().name("Second"))
    );
    assert_eq!(first, Ok(MutationOutcome::Updated));
    assert_eq!(second, Ok(MutationOutcome::Updated));
    assert_eq!(
        remote.write_log(),
        vec![
            WriteEvent::Started(EntityKind::Project),
            WriteEvent::Finished(EntityKind::Project),
            WriteEvent::Started(EntityKind::Project),
            WriteEvent::Finished(EntityKind::Project),
        ]
    );
    assert_eq!(remote.project(&demo_id()).expect("stored").name, "Second");

    let cards = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    assert_eq!(cards[0].project.name, "Second");
    assert_eq!(catalog.mutations().queued_targets().await, 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_write_still_refreshes_readers() {
    let remote = admin_remote();
    let catalog = Arc::new(client(&remote));
    catalog.resolve_permissions().await;
    catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    remote.set_write_ack_delay(Duration::from_millis(50));

    let view = {
        let catalog = Arc::clone(&catalog);
        tokio::spawn(async move {
            catalog
                .update_project(demo_id(), ProjectPatch::new().name("Renamed"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    view.abort();
    let _ = view.await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let cards = catalog
        .list_projects(Freshness::Consistent)
        .await
        .expect("listing");
    assert_eq!(cards[0].project.name, "Renamed");
    assert_eq!(catalog.mutations().queued_targets().await, 0);
}

#[tokio::test]
async fn deleting_a_missing_entry_is_success() {
    let remote = admin_remote();
    let catalog = client(&remote);
    catalog.resolve_permissions().await;

    let outcome = catalog
        .delete_project(ProjectId::new("missing-id"))
        .await
        .expect("delete of missing entry");
    assert_eq!(outcome, MutationOutcome::AlreadyDeleted);

    let outcome = catalog
        .delete_review(ReviewId::new("missing-id"))
        .await
        .expect("delete of missing review");
    assert_eq!(outcome, MutationOutcome::AlreadyDeleted);
}

#[tokio::test]
async fn deleting_a_project_refreshes_its_reviews() {
    let remote = admin_remote();
    remote.seed_review(&demo_id(), "visitor", 5);
    let catalog = client(&remote);
    catalog.resolve_permissions().await;

    let reviews = catalog
        .project_reviews(&demo_id(), Freshness::Consistent)
        .await
        .expect("reviews");
    assert_eq!(reviews.len(), 1);

    let outcome = catalog.delete_project(demo_id()).await.expect("delete");
    assert_eq!(outcome, MutationOutcome::Deleted);
    assert!(!catalog
        .cache()
        .is_fresh(&PartitionKey::reviews_for_project(&demo_id())));

    let reviews = catalog
        .project_reviews(&demo_id(), Freshness::Consistent)
        .await
        .expect("reviews");
    assert!(reviews.is_empty());
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

#[tokio::test]
async fn admin_writes_refused_before_resolution() {
    let remote = admin_remote();
    let catalog = client(&remote);

    assert_eq!(catalog.gate().state(), GateState::Unknown);
    let err = catalog
        .create_project(NewProject::new("Gadget"))
        .await
        .expect_err("gate unresolved");
    assert!(matches!(
        err,
        CatalogError::Authorization(AuthorizationError::NotResolved { .. })
    ));
    assert_eq!(remote.total_calls(), 0);

    catalog.resolve_permissions().await;
    let project = catalog
        .create_project(NewProject::new(" Gadget ").with_url("https://gadget.example.com"))
        .await
        .expect("created");
    assert_eq!(project.name, "Gadget");
    assert_eq!(remote.project_count(), 2);
}

#[tokio::test]
async fn anonymous_visitor_cannot_moderate() {
    let remote = demo_remote();
    let review = remote.seed_review(&demo_id(), "visitor", 1);
    let catalog = client(&remote);
    assert_eq!(catalog.resolve_permissions().await, GateState::Denied);

    let err = catalog
        .delete_review(review.id)
        .await
        .expect_err("moderation denied");
    assert!(matches!(
        err,
        CatalogError::Authorization(AuthorizationError::Denied { .. })
    ));
    assert_eq!(remote.write_calls(EntityKind::Review), 0);
    assert_eq!(remote.review_count(), 1);
}

#[tokio::test]
async fn dashboard_denied_without_fetching() {
    let remote = demo_remote();
    let catalog = client(&remote);

    let err = catalog
        .admin_dashboard(Freshness::Consistent)
        .await
        .expect_err("anonymous actor");
    assert!(matches!(
        err,
        CatalogError::Authorization(AuthorizationError::Denied { .. })
    ));
    assert_eq!(remote.select_calls(EntityKind::Project), 0);
    assert_eq!(remote.select_calls(EntityKind::Review), 0);
}

#[tokio::test]
async fn dashboard_for_admin() {
    let remote = admin_remote();
    remote.seed_review(&demo_id(), "a", 5);
    remote.seed_review(&demo_id(), "b", 2);
    let catalog = client(&remote);

    let dashboard = catalog
        .admin_dashboard(Freshness::Consistent)
        .await
        .expect("granted");
    assert_eq!(dashboard.stats.total_projects, 1);
    assert_eq!(dashboard.stats.total_reviews, 2);
    assert_eq!(dashboard.stats.average_rating, 3.5);
    assert_eq!(dashboard.projects[0].review_count(), 2);
}

#[tokio::test]
async fn sign_out_returns_gate_to_unknown() {
    let remote = admin_remote();
    let catalog = client(&remote);
    assert_eq!(catalog.resolve_permissions().await, GateState::Granted);

    remote.sign_out();
    catalog.identity_changed();
    assert_eq!(catalog.gate().state(), GateState::Unknown);
    assert!(catalog
        .update_project(demo_id(), ProjectPatch::new().name("x"))
        .await
        .is_err());
    assert_eq!(catalog.resolve_permissions().await, GateState::Denied);
}
