//! Rating aggregation over review snapshots.
//!
//! Everything here is a pure function of its inputs: no cache access, no
//! network. Callers re-evaluate on every snapshot change instead of caching
//! the results.

use crate::{Project, ProjectId, Review, MAX_RATING};
use serde::{Deserialize, Serialize};

/// Aggregate rating for a set of reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Arithmetic mean rounded to one decimal place; `0.0` when `count == 0`.
    pub average: f64,
    pub count: usize,
}

impl RatingSummary {
    pub const EMPTY: Self = Self {
        average: 0.0,
        count: 0,
    };

    /// Build a summary from raw ratings.
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0usize), |(sum, count), r| (sum + u64::from(r), count + 1));
        if count == 0 {
            return Self::EMPTY;
        }
        Self {
            average: round_to_tenth(sum as f64 / count as f64),
            count,
        }
    }

    /// Whole-star value for discrete display, in `0..=5`.
    ///
    /// Independent of `average`, which keeps its decimal for sorting.
    pub fn stars(&self) -> u8 {
        let rounded = self.average.round();
        if rounded <= 0.0 {
            0
        } else if rounded >= f64::from(MAX_RATING) {
            MAX_RATING
        } else {
            rounded as u8
        }
    }

    /// Average formatted with one decimal, e.g. `"4.0"`.
    pub fn display_average(&self) -> String {
        format!("{:.1}", self.average)
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Catalog-wide totals shown on the administrator dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_projects: usize,
    pub total_reviews: usize,
    pub average_rating: f64,
}

/// Aggregate the reviews belonging to one project.
pub fn aggregate_rating(reviews: &[Review], project_id: &ProjectId) -> RatingSummary {
    RatingSummary::from_ratings(
        reviews
            .iter()
            .filter(|r| &r.project_id == project_id)
            .map(|r| r.rating),
    )
}

/// Aggregate every review regardless of project.
pub fn overall_rating(reviews: &[Review]) -> RatingSummary {
    RatingSummary::from_ratings(reviews.iter().map(|r| r.rating))
}

/// Reviews of one project, in snapshot order.
pub fn reviews_for<'a>(reviews: &'a [Review], project_id: &ProjectId) -> Vec<&'a Review> {
    reviews
        .iter()
        .filter(|r| &r.project_id == project_id)
        .collect()
}

/// Totals across both collections.
pub fn catalog_stats(projects: &[Project], reviews: &[Review]) -> CatalogStats {
    CatalogStats {
        total_projects: projects.len(),
        total_reviews: reviews.len(),
        average_rating: overall_rating(reviews).average,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityIdType, ReviewId};
    use chrono::Utc;

    fn review(project: &str, rating: u8) -> Review {
        Review {
            id: ReviewId::generate(),
            project_id: ProjectId::new(project),
            user_name: "tester".to_string(),
            rating,
            comment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_reviews_yields_zero() {
        let summary = aggregate_rating(&[], &ProjectId::new("p1"));
        assert_eq!(summary, RatingSummary::EMPTY);
        assert_eq!(summary.stars(), 0);
        assert_eq!(summary.display_average(), "0.0");
    }

    #[test]
    fn test_demo_scenario() {
        let p1 = ProjectId::new("p1");
        let mut reviews = vec![review("p1", 5), review("p1", 3)];
        let summary = aggregate_rating(&reviews, &p1);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 4.0);

        reviews.push(review("p1", 4));
        let summary = aggregate_rating(&reviews, &p1);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 4.0);
    }

    #[test]
    fn test_other_projects_are_ignored() {
        let reviews = vec![review("p1", 5), review("p2", 1), review("p1", 4)];
        let summary = aggregate_rating(&reviews, &ProjectId::new("p1"));
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 4.5);
        assert_eq!(reviews_for(&reviews, &ProjectId::new("p2")).len(), 1);
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let reviews = vec![review("p1", 5), review("p1", 4), review("p1", 4)];
        let summary = aggregate_rating(&reviews, &ProjectId::new("p1"));
        assert_eq!(summary.average, 4.3);
        assert_eq!(summary.stars(), 4);
    }

    #[test]
    fn test_stars_round_to_nearest() {
        let summary = RatingSummary {
            average: 3.5,
            count: 2,
        };
        assert_eq!(summary.stars(), 4);
        let summary = RatingSummary {
            average: 2.4,
            count: 5,
        };
        assert_eq!(summary.stars(), 2);
    }

    #[test]
    fn test_catalog_stats() {
        let reviews = vec![review("p1", 5), review("p2", 2)];
        let stats = catalog_stats(&[], &reviews);
        assert_eq!(stats.total_projects, 0);
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.average_rating, 3.5);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::{EntityIdType, ReviewId};
    use chrono::Utc;
    use proptest::prelude::*;

    fn arb_reviews() -> impl Strategy<Value = Vec<Review>> {
        prop::collection::vec((0usize..3, 1u8..=5), 0..40).prop_map(|rows| {
            rows.into_iter()
                .map(|(project, rating)| Review {
                    id: ReviewId::generate(),
                    project_id: ProjectId::new(format!("p{project}")),
                    user_name: "prop".to_string(),
                    rating,
                    comment: None,
                    created_at: Utc::now(),
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// count equals the number of reviews whose project matches.
        #[test]
        fn prop_count_matches_filter(reviews in arb_reviews(), project in 0usize..4) {
            let id = ProjectId::new(format!("p{project}"));
            let expected = reviews.iter().filter(|r| r.project_id == id).count();
            prop_assert_eq!(aggregate_rating(&reviews, &id).count, expected);
        }

        /// average is zero without reviews, else the mean rounded to a tenth.
        #[test]
        fn prop_average_is_rounded_mean(reviews in arb_reviews(), project in 0usize..4) {
            let id = ProjectId::new(format!("p{project}"));
            let ratings: Vec<f64> = reviews
                .iter()
                .filter(|r| r.project_id == id)
                .map(|r| f64::from(r.rating))
                .collect();
            let summary = aggregate_rating(&reviews, &id);
            if ratings.is_empty() {
                prop_assert_eq!(summary.average, 0.0);
            } else {
                let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
                prop_assert!((summary.average - (mean * 10.0).round() / 10.0).abs() < 1e-9);
                prop_assert!(summary.stars() >= 1 && summary.stars() <= 5);
            }
        }

        /// identical inputs give identical outputs.
        #[test]
        fn prop_aggregation_is_deterministic(reviews in arb_reviews()) {
            let id = ProjectId::new("p0");
            prop_assert_eq!(aggregate_rating(&reviews, &id), aggregate_rating(&reviews, &id));
        }
    }
}
