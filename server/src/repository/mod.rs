// /server/src/repository/mod.rs
use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        image::{ImageFile, LooImage, NewImage},
        location::{Loo, LooInput},
        review::{NewReview, Review, ReviewInput},
    },
    rating::RatingSummary,
};

mod memory;
mod postgres;

pub use memory::InMemoryLooRepository;
pub use postgres::PgLooRepository;

/// Storage for loos and the images and reviews they own. Deleting a loo
/// removes its images and reviews with it.
///
/// Listing methods return rows newest first.
#[async_trait]
pub trait LooRepository: Send + Sync {
    async fn init(&self) -> AppResult<()>;

    async fn create_loo(&self, owner_id: Option<Uuid>, input: LooInput) -> AppResult<Loo>;
    async fn list_loos(&self) -> AppResult<Vec<Loo>>;
    async fn list_loos_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Loo>>;
    async fn get_loo(&self, id: Uuid) -> AppResult<Option<Loo>>;
    async fn update_loo(&self, id: Uuid, input: LooInput) -> AppResult<Option<Loo>>;
    async fn delete_loo(&self, id: Uuid) -> AppResult<bool>;

    /// Rating totals for the given loos, recomputed from the review rows.
    /// Loos without reviews are absent from the map.
    async fn rating_summaries(&self, loo_ids: &[Uuid]) -> AppResult<HashMap<Uuid, RatingSummary>>;

    async fn create_image(&self, image: NewImage) -> AppResult<LooImage>;
    async fn list_images(&self, loo_ids: Option<&[Uuid]>) -> AppResult<Vec<LooImage>>;
    async fn get_image(&self, id: Uuid) -> AppResult<Option<LooImage>>;
    async fn get_image_file(&self, id: Uuid) -> AppResult<Option<ImageFile>>;
    async fn replace_image(
        &self,
        id: Uuid,
        content_type: String,
        data: Vec<u8>,
    ) -> AppResult<Option<LooImage>>;
    async fn delete_image(&self, id: Uuid) -> AppResult<bool>;

    /// Inserts a review. A second review for the same (loo, reviewer) pair
    /// fails with `AppError::DuplicateReview` no matter how the calls race.
    async fn create_review(&self, review: NewReview) -> AppResult<Review>;
    async fn find_review(&self, loo_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<Review>>;
    async fn list_reviews(&self, loo_id: Option<Uuid>) -> AppResult<Vec<Review>>;
    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>>;
    async fn update_review(&self, id: Uuid, input: ReviewInput) -> AppResult<Option<Review>>;
    async fn delete_review(&self, id: Uuid) -> AppResult<bool>;
}
