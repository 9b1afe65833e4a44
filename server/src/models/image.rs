// /server/src/models/image.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// Image metadata. The payload itself is only loaded by the file route.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LooImage {
    pub id: Uuid,
    pub loo_id: Uuid,
    pub uploader_id: Option<Uuid>,
    pub content_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub loo_id: Uuid,
    pub uploader_id: Option<Uuid>,
    pub content_type: String,
    pub size: i64,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<LooImage> for ImageView {
    fn from(image: LooImage) -> Self {
        Self {
            url: format!("/api/images/{}/file", image.id),
            id: image.id,
            loo_id: image.loo_id,
            uploader_id: image.uploader_id,
            content_type: image.content_type,
            size: image.size,
            uploaded_at: image.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageFile {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// An image file received from a client, not yet checked.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Checks the size cap and the declared content type. Returns the
    /// normalized content type to store.
    pub fn validate(&self) -> AppResult<String> {
        if self.data.len() > MAX_IMAGE_BYTES {
            return Err(AppError::PayloadTooLarge);
        }

        let content_type = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(AppError::UnsupportedMediaType);
        }

        Ok(content_type)
    }
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub loo_id: Uuid,
    pub uploader_id: Option<Uuid>,
    pub content_type: String,
    pub data: Vec<u8>,
}
