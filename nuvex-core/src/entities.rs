//! Core entity structures and write payloads

use crate::{EntityIdType, ProjectId, ReviewId, Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Lowest accepted star rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating.
pub const MAX_RATING: u8 = 5;

/// Project - one catalog entry.
///
/// Owned by the remote store; the client only holds read-only copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    /// Server-assigned, immutable.
    pub created_at: Timestamp,
}

/// Review - a visitor's star rating of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub project_id: ProjectId,
    pub user_name: String,
    /// 1..=5 inclusive.
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

/// Identity of the actor signed in to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// Insert payload for projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Normalize and validate the payload.
    ///
    /// The name is trimmed and must be non-empty. Optional fields are
    /// trimmed and blank values are dropped.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let name = required_text("name", &self.name)?;
        let url = optional_url("url", self.url)?;
        let image_url = optional_url("image_url", self.image_url)?;
        Ok(Self {
            name,
            description: optional_text(self.description),
            url,
            image_url,
        })
    }
}

/// Partial update payload for projects.
///
/// Outer `None` leaves a field untouched. For optional fields,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn url(mut self, url: Option<String>) -> Self {
        self.url = Some(url);
        self
    }

    pub fn image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = Some(image_url);
        self
    }

    /// Returns true when the patch touches no field.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.url.is_none()
            && self.image_url.is_none()
    }

    /// Normalize and validate the patch. An empty patch is rejected.
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "patch".to_string(),
                reason: "must change at least one field".to_string(),
            });
        }
        let name = match self.name {
            Some(name) => Some(required_text("name", &name)?),
            None => None,
        };
        let url = match self.url {
            Some(url) => Some(optional_url("url", url)?),
            None => None,
        };
        let image_url = match self.image_url {
            Some(image_url) => Some(optional_url("image_url", image_url)?),
            None => None,
        };
        Ok(Self {
            name,
            description: self.description.map(optional_text),
            url,
            image_url,
        })
    }

    /// Apply the patch to a stored project.
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(url) = &self.url {
            project.url = url.clone();
        }
        if let Some(image_url) = &self.image_url {
            project.image_url = image_url.clone();
        }
    }
}

/// Insert payload for reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub project_id: ProjectId,
    pub user_name: String,
    pub rating: u8,
    pub comment: Option<String>,
}

impl NewReview {
    pub fn new(project_id: ProjectId, user_name: impl Into<String>, rating: u8) -> Self {
        Self {
            project_id,
            user_name: user_name.into(),
            rating,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Normalize and validate the payload.
    ///
    /// A rating of zero means no star was selected and is reported as a
    /// missing field.
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.project_id.as_str().trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "project_id".to_string(),
            });
        }
        let user_name = required_text("user_name", &self.user_name)?;
        validate_rating(self.rating)?;
        Ok(Self {
            project_id: self.project_id,
            user_name,
            rating: self.rating,
            comment: optional_text(self.comment),
        })
    }
}

/// Partial update payload for reviews (moderation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Option<String>>,
}

impl ReviewPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.comment.is_none()
    }

    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "patch".to_string(),
                reason: "must change at least one field".to_string(),
            });
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(Self {
            rating: self.rating,
            comment: self.comment.map(optional_text),
        })
    }

    pub fn apply_to(&self, review: &mut Review) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(comment) = &self.comment {
            review.comment = comment.clone();
        }
    }
}

// ============================================================================
// NORMALIZATION HELPERS
// ============================================================================

fn required_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_url(field: &str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(url) = optional_text(value) else {
        return Ok(None);
    };
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(Some(url))
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be an http(s) URL".to_string(),
        })
    }
}

fn validate_rating(rating: u8) -> Result<(), ValidationError> {
    if rating == 0 {
        return Err(ValidationError::RequiredFieldMissing {
            field: "rating".to_string(),
        });
    }
    if rating > MAX_RATING {
        return Err(ValidationError::InvalidValue {
            field: "rating".to_string(),
            reason: format!("must be between {MIN_RATING} and {MAX_RATING}"),
        });
    }
    Ok(())
}
