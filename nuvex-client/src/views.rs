//! Read models assembled from cache snapshots.

use nuvex_core::{
    aggregate_rating, catalog_stats, reviews_for, CatalogStats, Project, RatingSummary, Review,
};
use serde::Serialize;

/// Number of reviews shown under each project in the listing.
pub const PREVIEW_REVIEWS: usize = 2;

/// One entry of the public catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCard {
    pub project: Project,
    pub rating: RatingSummary,
    /// Most recent reviews, newest first.
    pub preview: Vec<Review>,
    /// Reviews not included in `preview`.
    pub more_reviews: usize,
}

impl ProjectCard {
    pub fn stars(&self) -> u8 {
        self.rating.stars()
    }
}

/// Build one card per project, keeping the order of `projects`.
///
/// `reviews` is expected newest first, as the review partitions are ordered.
pub fn project_cards(projects: &[Project], reviews: &[Review]) -> Vec<ProjectCard> {
    projects
        .iter()
        .map(|project| {
            let own = reviews_for(reviews, &project.id);
            let rating = aggregate_rating(reviews, &project.id);
            let preview: Vec<Review> = own
                .iter()
                .take(PREVIEW_REVIEWS)
                .map(|review| (*review).clone())
                .collect();
            ProjectCard {
                project: project.clone(),
                rating,
                more_reviews: own.len() - preview.len(),
                preview,
            }
        })
        .collect()
}

/// Per-project row of the administrator dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminProjectRow {
    pub project: Project,
    pub rating: RatingSummary,
}

impl AdminProjectRow {
    pub fn review_count(&self) -> usize {
        self.rating.count
    }
}

/// Everything the administrator dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub stats: CatalogStats,
    pub projects: Vec<AdminProjectRow>,
    /// All reviews, newest first, for moderation.
    pub reviews: Vec<Review>,
}

impl AdminDashboard {
    pub fn build(projects: &[Project], reviews: &[Review]) -> Self {
        Self {
            stats: catalog_stats(projects, reviews),
            projects: projects
                .iter()
                .map(|project| AdminProjectRow {
                    project: project.clone(),
                    rating: aggregate_rating(reviews, &project.id),
                })
                .collect(),
            reviews: reviews.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use nuvex_core::{EntityIdType, ProjectId, ReviewId};

    fn project(id: &str) -> Project {
        Project {
            id: ProjectId::new(id),
            name: id.to_uppercase(),
            description: None,
            url: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn reviews_newest_first(project_id: &str, ratings: &[u8]) -> Vec<Review> {
        let now = Utc::now();
        ratings
            .iter()
            .enumerate()
            .map(|(i, rating)| Review {
                id: ReviewId::generate(),
                project_id: ProjectId::new(project_id),
                user_name: format!("user{i}"),
                rating: *rating,
                comment: None,
                created_at: now - Duration::minutes(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_cards_preview_two_newest() {
        let projects = vec![project("p1"), project("p2")];
        let reviews = reviews_newest_first("p1", &[5, 4, 3, 2]);
        let cards = project_cards(&projects, &reviews);

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].preview, reviews[..2].to_vec());
        assert_eq!(cards[0].more_reviews, 2);
        assert_eq!(cards[0].rating.count, 4);
        assert_eq!(cards[0].rating.average, 3.5);
        assert_eq!(cards[0].stars(), 4);

        assert!(cards[1].preview.is_empty());
        assert_eq!(cards[1].more_reviews, 0);
        assert_eq!(cards[1].rating, RatingSummary::EMPTY);
    }

    #[test]
    fn test_dashboard_totals() {
        let projects = vec![project("p1"), project("p2")];
        let mut reviews = reviews_newest_first("p1", &[5, 3]);
        reviews.extend(reviews_newest_first("p2", &[4]));
        let dashboard = AdminDashboard::build(&projects, &reviews);

        assert_eq!(dashboard.stats.total_projects, 2);
        assert_eq!(dashboard.stats.total_reviews, 3);
        assert_eq!(dashboard.stats.average_rating, 4.0);
        assert_eq!(dashboard.projects[0].review_count(), 2);
        assert_eq!(dashboard.projects[1].rating.average, 4.0);
        assert_eq!(dashboard.reviews.len(), 3);
    }

    #[test]
    fn test_empty_dashboard() {
        let dashboard = AdminDashboard::build(&[], &[]);
        assert_eq!(dashboard.stats.average_rating, 0.0);
        assert!(dashboard.projects.is_empty());
    }
}
