// /server/src/handlers/mod.rs
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod image_handler;
pub mod loo_handler;
pub mod review_handler;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ids arrive as path segments and form fields; anything that is not a UUID
/// is a malformed request.
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::invalid(format!("{what} must be a valid id")))
}
