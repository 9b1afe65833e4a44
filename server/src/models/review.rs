use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub loo_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i16,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPayload {
    pub rating: i64,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    pub body: Option<String>,
}

/// Validated rating and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    pub rating: i16,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub loo_id: Uuid,
    pub reviewer_id: Uuid,
    pub input: ReviewInput,
}

impl ReviewPayload {
    pub fn validate(self) -> AppResult<ReviewInput> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(AppError::invalid(format!(
                "rating must be an integer between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        Ok(ReviewInput {
            rating: self.rating as i16,
            body: self
                .body
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty()),
        })
    }
}

impl ReviewPatch {
    pub fn apply_to(self, review: &Review) -> ReviewPayload {
        ReviewPayload {
            rating: self.rating.unwrap_or(i64::from(review.rating)),
            body: self.body.or_else(|| review.body.clone()),
        }
    }
}
