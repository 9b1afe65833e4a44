// /server/src/repository/postgres.rs
use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::LooRepository;
use crate::{
    error::AppResult,
    models::{
        image::{ImageFile, LooImage, NewImage},
        location::{Loo, LooInput},
        review::{NewReview, Review, ReviewInput},
    },
    rating::RatingSummary,
};

const LOO_COLUMNS: &str = "id, owner_id, name, description, latitude, longitude, \
                           cleanliness, privacy, tags, created_at";

const IMAGE_COLUMNS: &str =
    "id, loo_id, uploader_id, content_type, octet_length(data)::BIGINT AS size, uploaded_at";

const REVIEW_COLUMNS: &str = "id, loo_id, reviewer_id, rating, body, created_at";

#[derive(Clone)]
pub struct PgLooRepository {
    pool: PgPool,
}

impl PgLooRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RatingTotals {
    loo_id: Uuid,
    rating_sum: i64,
    review_count: i64,
}

#[async_trait]
impl LooRepository for PgLooRepository {
    async fn init(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn create_loo(&self, owner_id: Option<Uuid>, input: LooInput) -> AppResult<Loo> {
        let loo = sqlx::query_as::<_, Loo>(&format!(
            r#"
            INSERT INTO loos (id, owner_id, name, description, latitude, longitude, cleanliness, privacy, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LOO_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.name)
        .bind(input.description)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.cleanliness)
        .bind(input.privacy)
        .bind(input.tags)
        .fetch_one(&self.pool)
        .await?;

        Ok(loo)
    }

    async fn list_loos(&self) -> AppResult<Vec<Loo>> {
        let loos = sqlx::query_as::<_, Loo>(&format!(
            "SELECT {LOO_COLUMNS} FROM loos ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(loos)
    }

    async fn list_loos_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Loo>> {
        let loos = sqlx::query_as::<_, Loo>(&format!(
            "SELECT {LOO_COLUMNS} FROM loos WHERE owner_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loos)
    }

    async fn get_loo(&self, id: Uuid) -> AppResult<Option<Loo>> {
        let loo = sqlx::query_as::<_, Loo>(&format!(
            "SELECT {LOO_COLUMNS} FROM loos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loo)
    }

    async fn update_loo(&self, id: Uuid, input: LooInput) -> AppResult<Option<Loo>> {
        let loo = sqlx::query_as::<_, Loo>(&format!(
            r#"
            UPDATE loos
            SET name = $2, description = $3, latitude = $4, longitude = $5,
                cleanliness = $6, privacy = $7, tags = $8
            WHERE id = $1
            RETURNING {LOO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.description)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.cleanliness)
        .bind(input.privacy)
        .bind(input.tags)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loo)
    }

    async fn delete_loo(&self, id: Uuid) -> AppResult<bool> {
        // Images and reviews go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM loos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rating_summaries(&self, loo_ids: &[Uuid]) -> AppResult<HashMap<Uuid, RatingSummary>> {
        if loo_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let totals = sqlx::query_as::<_, RatingTotals>(
            r#"
            SELECT loo_id, SUM(rating)::BIGINT AS rating_sum, COUNT(*)::BIGINT AS review_count
            FROM loo_reviews
            WHERE loo_id = ANY($1)
            GROUP BY loo_id
            "#,
        )
        .bind(loo_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals
            .into_iter()
            .map(|t| (t.loo_id, RatingSummary::from_totals(t.rating_sum, t.review_count)))
            .collect())
    }

    async fn create_image(&self, image: NewImage) -> AppResult<LooImage> {
        let image = sqlx::query_as::<_, LooImage>(&format!(
            r#"
            INSERT INTO loo_images (id, loo_id, uploader_id, content_type, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(image.loo_id)
        .bind(image.uploader_id)
        .bind(image.content_type)
        .bind(image.data)
        .fetch_one(&self.pool)
        .await?;
        Ok(image)
    }

    async fn list_images(&self, loo_ids: Option<&[Uuid]>) -> AppResult<Vec<LooImage>> {
        let images = match loo_ids {
            Some(ids) => {
                sqlx::query_as::<_, LooImage>(&format!(
                    "SELECT {IMAGE_COLUMNS} FROM loo_images WHERE loo_id = ANY($1) \
                     ORDER BY uploaded_at DESC, id"
                ))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LooImage>(&format!(
                    "SELECT {IMAGE_COLUMNS} FROM loo_images ORDER BY uploaded_at DESC, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(images)
    }

    async fn get_image(&self, id: Uuid) -> AppResult<Option<LooImage>> {
        let image = sqlx::query_as::<_, LooImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM loo_images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn get_image_file(&self, id: Uuid) -> AppResult<Option<ImageFile>> {
        let file = sqlx::query_as::<_, ImageFile>(
            "SELECT content_type, data FROM loo_images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    async fn replace_image(
        &self,
        id: Uuid,
        content_type: String,
        data: Vec<u8>,
    ) -> AppResult<Option<LooImage>> {
        let image = sqlx::query_as::<_, LooImage>(&format!(
            r#"
            UPDATE loo_images
            SET content_type = $2, data = $3, uploaded_at = NOW()
            WHERE id = $1
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(content_type)
        .bind(data)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn delete_image(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM loo_images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_review(&self, review: NewReview) -> AppResult<Review> {
        // A concurrent insert for the same pair trips the unique constraint,
        // which `AppError::from(sqlx::Error)` turns into DuplicateReview.
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO loo_reviews (id, loo_id, reviewer_id, rating, body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(review.loo_id)
        .bind(review.reviewer_id)
        .bind(review.input.rating)
        .bind(review.input.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn find_review(&self, loo_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM loo_reviews WHERE loo_id = $1 AND reviewer_id = $2"
        ))
        .bind(loo_id)
        .bind(reviewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn list_reviews(&self, loo_id: Option<Uuid>) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS} FROM loo_reviews
            WHERE $1::UUID IS NULL OR loo_id = $1
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(loo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM loo_reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn update_review(&self, id: Uuid, input: ReviewInput) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE loo_reviews SET rating = $2, body = $3
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.rating)
        .bind(input.body)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM loo_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
