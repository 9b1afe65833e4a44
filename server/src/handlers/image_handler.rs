// /server/src/handlers/image_handler.rs
use crate::{
    auth::Caller,
    error::{AppError, AppResult},
    handlers::parse_id,
    models::image::{ImageUpload, ImageView, LooImage, NewImage},
    policy,
    state::AppState,
};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::QueryRejection,
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ImageQuery {
    loo: Option<Uuid>,
}

/// Fields of an upload form that matter to us; everything else is ignored.
#[derive(Default)]
struct UploadForm {
    loo_id: Option<String>,
    image: Option<ImageUpload>,
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("loo_id") => {
                let value = field.text().await?;
                form.loo_id = Some(value).filter(|v| !v.trim().is_empty());
            }
            Some("image") => {
                let content_type = field.content_type().map(str::to_owned).unwrap_or_default();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.image = Some(ImageUpload {
                        content_type,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn load_image(state: &AppState, raw_id: &str) -> AppResult<LooImage> {
    let id = parse_id(raw_id, "image id")?;
    state
        .repo
        .get_image(id)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))
}

/// `POST /upload-image/` with multipart fields `loo_id` and `image`.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<ImageView>)> {
    let uploader_id = policy::authorize_upload(&caller)?;

    let form = read_form(multipart?).await?;
    let (Some(raw_loo_id), Some(upload)) = (form.loo_id, form.image) else {
        return Err(AppError::invalid("Both loo_id and image are required"));
    };
    let loo_id = parse_id(&raw_loo_id, "loo_id")?;
    let content_type = upload.validate()?;

    let loo = state
        .repo
        .get_loo(loo_id)
        .await?
        .ok_or_else(|| AppError::not_found("Loo not found"))?;

    let image = state
        .repo
        .create_image(NewImage {
            loo_id: loo.id,
            uploader_id: Some(uploader_id),
            content_type,
            data: upload.data,
        })
        .await?;

    tracing::info!(
        "Image {} ({} bytes) uploaded for {} by {}",
        image.id,
        image.size,
        loo.display_name(),
        uploader_id
    );
    Ok((StatusCode::CREATED, Json(image.into())))
}

pub async fn list_images(
    State(state): State<AppState>,
    query: Result<Query<ImageQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ImageView>>> {
    let Query(query) = query?;
    let images = match query.loo {
        Some(loo_id) => state.repo.list_images(Some(&[loo_id][..])).await?,
        None => state.repo.list_images(None).await?,
    };
    Ok(Json(images.into_iter().map(ImageView::from).collect()))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ImageView>> {
    Ok(Json(load_image(&state, &id).await?.into()))
}

pub async fn get_image_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id, "image id")?;
    let file = state
        .repo
        .get_image_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.data))
}

/// `PUT /images/{id}/` swaps the stored file, keeping the image's loo.
pub async fn replace_image(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ImageView>> {
    let image = load_image(&state, &id).await?;
    policy::authorize_mutation(&caller, &image)?;

    let upload = read_form(multipart?)
        .await?
        .image
        .ok_or_else(|| AppError::invalid("image is required"))?;
    let content_type = upload.validate()?;

    let image = state
        .repo
        .replace_image(image.id, content_type, upload.data)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    Ok(Json(image.into()))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let image = load_image(&state, &id).await?;
    policy::authorize_mutation(&caller, &image)?;

    if !state.repo.delete_image(image.id).await? {
        return Err(AppError::not_found("Image not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
