// /server/src/routes/mod.rs
use crate::{
    auth::auth_middleware,
    handlers::{health, image_handler, loo_handler, review_handler},
    state::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

/// Request bodies may exceed the 5 MiB image cap so that oversized uploads
/// reach the handler and get a proper error instead of a bare 413.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(app_state: AppState) -> Router {
    let loo_routes = Router::new()
        .route("/loos/", get(loo_handler::list_loos).post(loo_handler::create_loo))
        .route(
            "/loos/:id/",
            get(loo_handler::get_loo)
                .put(loo_handler::replace_loo)
                .patch(loo_handler::patch_loo)
                .delete(loo_handler::delete_loo),
        )
        .route(
            "/loos/:id/reviews/",
            get(review_handler::list_loo_reviews).post(review_handler::create_loo_review),
        )
        .route("/my-loos/", get(loo_handler::my_loos));

    let image_routes = Router::new()
        .route("/upload-image/", post(image_handler::upload_image))
        .route("/images/", get(image_handler::list_images))
        .route(
            "/images/:id/",
            get(image_handler::get_image)
                .put(image_handler::replace_image)
                .delete(image_handler::delete_image),
        )
        .route("/images/:id/file", get(image_handler::get_image_file));

    let review_routes = Router::new()
        .route("/reviews/", get(review_handler::list_reviews))
        .route(
            "/reviews/:id/",
            get(review_handler::get_review)
                .put(review_handler::replace_review)
                .patch(review_handler::patch_review)
                .delete(review_handler::delete_review),
        );

    let api_routes = Router::new()
        .merge(loo_routes)
        .merge(image_routes)
        .merge(review_routes)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(app_state)
}
