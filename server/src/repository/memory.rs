// /server/src/repository/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::LooRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        image::{ImageFile, LooImage, NewImage},
        location::{Loo, LooInput},
        review::{NewReview, Review, ReviewInput},
    },
    rating::RatingSummary,
};

struct StoredImage {
    meta: LooImage,
    data: Vec<u8>,
}

/// Rows are kept in insertion order; listings walk them in reverse to get
/// newest first.
#[derive(Default)]
struct Tables {
    loos: Vec<Loo>,
    images: Vec<StoredImage>,
    reviews: Vec<Review>,
}

/// Process-local store used by tests and `STORAGE_BACKEND=memory`.
///
/// All tables sit behind one lock, so the duplicate-review check and the
/// insert happen atomically.
#[derive(Default)]
pub struct InMemoryLooRepository {
    tables: RwLock<Tables>,
}

impl InMemoryLooRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LooRepository for InMemoryLooRepository {
    async fn init(&self) -> AppResult<()> {
        Ok(())
    }

    async fn create_loo(&self, owner_id: Option<Uuid>, input: LooInput) -> AppResult<Loo> {
        let loo = Loo {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name,
            description: input.description,
            latitude: input.latitude,
            longitude: input.longitude,
            cleanliness: input.cleanliness,
            privacy: input.privacy,
            tags: input.tags,
            created_at: Utc::now(),
        };
        self.tables.write().await.loos.push(loo.clone());
        Ok(loo)
    }

    async fn list_loos(&self) -> AppResult<Vec<Loo>> {
        let tables = self.tables.read().await;
        Ok(tables.loos.iter().rev().cloned().collect())
    }

    async fn list_loos_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Loo>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loos
            .iter()
            .rev()
            .filter(|loo| loo.owner_id == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn get_loo(&self, id: Uuid) -> AppResult<Option<Loo>> {
        let tables = self.tables.read().await;
        Ok(tables.loos.iter().find(|loo| loo.id == id).cloned())
    }

    async fn update_loo(&self, id: Uuid, input: LooInput) -> AppResult<Option<Loo>> {
        let mut tables = self.tables.write().await;
        let Some(loo) = tables.loos.iter_mut().find(|loo| loo.id == id) else {
            return Ok(None);
        };
        loo.name = input.name;
        loo.description = input.description;
        loo.latitude = input.latitude;
        loo.longitude = input.longitude;
        loo.cleanliness = input.cleanliness;
        loo.privacy = input.privacy;
        loo.tags = input.tags;
        Ok(Some(loo.clone()))
    }

    async fn delete_loo(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.loos.len();
        tables.loos.retain(|loo| loo.id != id);
        if tables.loos.len() == before {
            return Ok(false);
        }
        tables.images.retain(|image| image.meta.loo_id != id);
        tables.reviews.retain(|review| review.loo_id != id);
        Ok(true)
    }

    async fn rating_summaries(&self, loo_ids: &[Uuid]) -> AppResult<HashMap<Uuid, RatingSummary>> {
        let tables = self.tables.read().await;
        let mut ratings: HashMap<Uuid, Vec<i16>> = HashMap::new();
        for review in tables.reviews.iter().filter(|r| loo_ids.contains(&r.loo_id)) {
            ratings.entry(review.loo_id).or_default().push(review.rating);
        }
        Ok(ratings
            .into_iter()
            .map(|(loo_id, ratings)| (loo_id, RatingSummary::from_ratings(ratings)))
            .collect())
    }

    async fn create_image(&self, image: NewImage) -> AppResult<LooImage> {
        let mut tables = self.tables.write().await;
        if !tables.loos.iter().any(|loo| loo.id == image.loo_id) {
            return Err(AppError::not_found("Loo not found"));
        }
        let meta = LooImage {
            id: Uuid::new_v4(),
            loo_id: image.loo_id,
            uploader_id: image.uploader_id,
            content_type: image.content_type,
            size: image.data.len() as i64,
            uploaded_at: Utc::now(),
        };
        tables.images.push(StoredImage {
            meta: meta.clone(),
            data: image.data,
        });
        Ok(meta)
    }

    async fn list_images(&self, loo_ids: Option<&[Uuid]>) -> AppResult<Vec<LooImage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .images
            .iter()
            .rev()
            .filter(|image| loo_ids.map_or(true, |ids| ids.contains(&image.meta.loo_id)))
            .map(|image| image.meta.clone())
            .collect())
    }

    async fn get_image(&self, id: Uuid) -> AppResult<Option<LooImage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .images
            .iter()
            .find(|image| image.meta.id == id)
            .map(|image| image.meta.clone()))
    }

    async fn get_image_file(&self, id: Uuid) -> AppResult<Option<ImageFile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .images
            .iter()
            .find(|image| image.meta.id == id)
            .map(|image| ImageFile {
                content_type: image.meta.content_type.clone(),
                data: image.data.clone(),
            }))
    }

    async fn replace_image(
        &self,
        id: Uuid,
        content_type: String,
        data: Vec<u8>,
    ) -> AppResult<Option<LooImage>> {
        let mut tables = self.tables.write().await;
        let Some(image) = tables.images.iter_mut().find(|image| image.meta.id == id) else {
            return Ok(None);
        };
        image.meta.content_type = content_type;
        image.meta.size = data.len() as i64;
        image.meta.uploaded_at = Utc::now();
        image.data = data;
        Ok(Some(image.meta.clone()))
    }

    async fn delete_image(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.images.len();
        tables.images.retain(|image| image.meta.id != id);
        Ok(tables.images.len() != before)
    }

    async fn create_review(&self, review: NewReview) -> AppResult<Review> {
        let mut tables = self.tables.write().await;
        if !tables.loos.iter().any(|loo| loo.id == review.loo_id) {
            return Err(AppError::not_found("Loo not found"));
        }
        if tables
            .reviews
            .iter()
            .any(|r| r.loo_id == review.loo_id && r.reviewer_id == review.reviewer_id)
        {
            return Err(AppError::DuplicateReview);
        }
        let review = Review {
            id: Uuid::new_v4(),
            loo_id: review.loo_id,
            reviewer_id: review.reviewer_id,
            rating: review.input.rating,
            body: review.input.body,
            created_at: Utc::now(),
        };
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn find_review(&self, loo_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .find(|r| r.loo_id == loo_id && r.reviewer_id == reviewer_id)
            .cloned())
    }

    async fn list_reviews(&self, loo_id: Option<Uuid>) -> AppResult<Vec<Review>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .rev()
            .filter(|r| loo_id.map_or(true, |id| r.loo_id == id))
            .cloned()
            .collect())
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn update_review(&self, id: Uuid, input: ReviewInput) -> AppResult<Option<Review>> {
        let mut tables = self.tables.write().await;
        let Some(review) = tables.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        review.rating = input.rating;
        review.body = input.body;
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|r| r.id != id);
        Ok(tables.reviews.len() != before)
    }
}
