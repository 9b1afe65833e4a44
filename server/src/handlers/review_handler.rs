// /server/src/handlers/review_handler.rs
use crate::{
    auth::Caller,
    error::{AppError, AppResult},
    handlers::parse_id,
    models::review::{NewReview, Review, ReviewPatch, ReviewPayload},
    policy,
    state::AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ReviewQuery {
    loo: Option<Uuid>,
}

async fn load_review(state: &AppState, raw_id: &str) -> AppResult<Review> {
    let id = parse_id(raw_id, "review id")?;
    state
        .repo
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))
}

pub async fn list_loo_reviews(
    State(state): State<AppState>,
    Path(loo_id): Path<String>,
) -> AppResult<Json<Vec<Review>>> {
    let loo_id = parse_id(&loo_id, "loo id")?;
    if state.repo.get_loo(loo_id).await?.is_none() {
        return Err(AppError::not_found("Loo not found"));
    }
    Ok(Json(state.repo.list_reviews(Some(loo_id)).await?))
}

/// `POST /loos/{id}/reviews/`. The lookup for an existing review only
/// short-circuits the common case; the store's uniqueness check decides.
pub async fn create_loo_review(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(loo_id): Path<String>,
    payload: Result<Json<ReviewPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let reviewer_id = policy::authorize_review(&caller)?;
    let loo_id = parse_id(&loo_id, "loo id")?;
    if state.repo.get_loo(loo_id).await?.is_none() {
        return Err(AppError::not_found("Loo not found"));
    }

    if state.repo.find_review(loo_id, reviewer_id).await?.is_some() {
        return Err(AppError::DuplicateReview);
    }

    let Json(payload) = payload?;
    let input = payload.validate()?;

    let review = state
        .repo
        .create_review(NewReview {
            loo_id,
            reviewer_id,
            input,
        })
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::DuplicateReview) {
                tracing::warn!("Concurrent duplicate review by {} on loo {}", reviewer_id, loo_id);
            }
        })?;

    tracing::info!("Review {} ({}/5) added to loo {}", review.id, review.rating, loo_id);
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Review>>> {
    let Query(query) = query?;
    Ok(Json(state.repo.list_reviews(query.loo).await?))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    Ok(Json(load_review(&state, &id).await?))
}

pub async fn replace_review(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<ReviewPayload>, JsonRejection>,
) -> AppResult<Json<Review>> {
    let review = load_review(&state, &id).await?;
    policy::authorize_mutation(&caller, &review)?;

    let Json(payload) = payload?;
    save_review(&state, review.id, payload).await
}

pub async fn patch_review(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<ReviewPatch>, JsonRejection>,
) -> AppResult<Json<Review>> {
    let review = load_review(&state, &id).await?;
    policy::authorize_mutation(&caller, &review)?;

    let Json(patch) = payload?;
    save_review(&state, review.id, patch.apply_to(&review)).await
}

async fn save_review(state: &AppState, id: Uuid, payload: ReviewPayload) -> AppResult<Json<Review>> {
    let input = payload.validate()?;
    let review = state
        .repo
        .update_review(id, input)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))?;
    Ok(Json(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let review = load_review(&state, &id).await?;
    policy::authorize_mutation(&caller, &review)?;

    if !state.repo.delete_review(review.id).await? {
        return Err(AppError::not_found("Review not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
