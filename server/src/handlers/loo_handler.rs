// /server/src/handlers/loo_handler.rs
use std::collections::HashMap;

use crate::{
    auth::Caller,
    error::{AppError, AppResult},
    handlers::parse_id,
    models::{
        image::ImageView,
        location::{Loo, LooInput, LooPatch, LooPayload, LooView},
    },
    policy,
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

/// Attaches images and freshly computed ratings to each loo. Runs on every
/// read, so the rating always reflects the current reviews.
pub(crate) async fn present_loos(state: &AppState, loos: Vec<Loo>) -> AppResult<Vec<LooView>> {
    let ids: Vec<Uuid> = loos.iter().map(|loo| loo.id).collect();
    let mut ratings = state.repo.rating_summaries(&ids).await?;

    let mut images: HashMap<Uuid, Vec<ImageView>> = HashMap::new();
    for image in state.repo.list_images(Some(ids.as_slice())).await? {
        images.entry(image.loo_id).or_default().push(image.into());
    }

    Ok(loos
        .into_iter()
        .map(|loo| LooView {
            rating: ratings.remove(&loo.id).unwrap_or_default(),
            images: images.remove(&loo.id).unwrap_or_default(),
            loo,
        })
        .collect())
}

async fn present_loo(state: &AppState, loo: Loo) -> AppResult<LooView> {
    present_loos(state, vec![loo])
        .await?
        .pop()
        .ok_or_else(|| AppError::internal("Loo vanished while being presented"))
}

async fn load_loo(state: &AppState, raw_id: &str) -> AppResult<Loo> {
    let id = parse_id(raw_id, "loo id")?;
    state
        .repo
        .get_loo(id)
        .await?
        .ok_or_else(|| AppError::not_found("Loo not found"))
}

pub async fn list_loos(State(state): State<AppState>) -> AppResult<Json<Vec<LooView>>> {
    let loos = state.repo.list_loos().await?;
    Ok(Json(present_loos(&state, loos).await?))
}

pub async fn get_loo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LooView>> {
    let loo = load_loo(&state, &id).await?;
    Ok(Json(present_loo(&state, loo).await?))
}

pub async fn create_loo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<LooPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<LooView>)> {
    let Json(payload) = payload?;
    let input = payload.validate()?;
    let owner_id = policy::owner_for_new_loo(&caller);

    let loo = state.repo.create_loo(owner_id, input).await?;
    match owner_id {
        Some(owner) => tracing::info!("Loo {} ({}) added by {}", loo.id, loo.display_name(), owner),
        None => tracing::info!("Loo {} ({}) added anonymously", loo.id, loo.display_name()),
    }

    Ok((StatusCode::CREATED, Json(present_loo(&state, loo).await?)))
}

pub async fn replace_loo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<LooPayload>, JsonRejection>,
) -> AppResult<Json<LooView>> {
    let loo = load_loo(&state, &id).await?;
    policy::authorize_mutation(&caller, &loo)?;

    let Json(payload) = payload?;
    let input = payload.validate()?;
    save_loo(&state, loo.id, input).await
}

pub async fn patch_loo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<LooPatch>, JsonRejection>,
) -> AppResult<Json<LooView>> {
    let loo = load_loo(&state, &id).await?;
    policy::authorize_mutation(&caller, &loo)?;

    let Json(patch) = payload?;
    if !patch.has_changes() {
        return Err(AppError::invalid("at least one field must be provided"));
    }
    let input = patch.apply_to(&loo).validate()?;
    save_loo(&state, loo.id, input).await
}

async fn save_loo(state: &AppState, id: Uuid, input: LooInput) -> AppResult<Json<LooView>> {
    let loo = state
        .repo
        .update_loo(id, input)
        .await?
        .ok_or_else(|| AppError::not_found("Loo not found"))?;
    tracing::debug!("Loo {} updated", loo.id);
    Ok(Json(present_loo(state, loo).await?))
}

pub async fn delete_loo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let loo = load_loo(&state, &id).await?;
    let user_id = policy::authorize_mutation(&caller, &loo)?;

    if !state.repo.delete_loo(loo.id).await? {
        return Err(AppError::not_found("Loo not found"));
    }
    tracing::info!("Loo {} deleted by {}", loo.id, user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Loos created by the calling user, newest first.
pub async fn my_loos(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> AppResult<Json<Vec<LooView>>> {
    let claims = caller.require_user()?;
    let loos = state.repo.list_loos_by_owner(claims.sub).await?;
    Ok(Json(present_loos(&state, loos).await?))
}
