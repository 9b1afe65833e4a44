//! Derived rating fields for a loo.
//!
//! Nothing here is persisted: the summary is rebuilt from the live review
//! rows every time a loo is read.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal, `None` when there are no reviews.
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        average_rating: None,
        review_count: 0,
    };

    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));
        Self::from_totals(sum, count)
    }

    pub fn from_totals(sum: i64, count: i64) -> Self {
        if count <= 0 {
            return Self::EMPTY;
        }
        let mean = sum as f64 / count as f64;
        Self {
            average_rating: Some(round_to_tenth(mean)),
            review_count: count,
        }
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
