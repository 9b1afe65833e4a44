//! Backend for finding public restrooms ("loos"), their photos and reviews.
//!
//! Reads are open to everyone. Writes are checked against the owner of the
//! record by [`policy`], and ratings are recomputed from live reviews on
//! every read by [`rating`].

use std::any::Any;

use axum::{
    http::{header, Method},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod rating;
pub mod repository;
pub mod routes;
pub mod state;

use error::AppError;
use state::AppState;

pub fn build_app(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    Router::new()
        .nest("/api", routes::create_router(app_state))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unexpected failure".to_string()
    };
    AppError::internal(message).into_response()
}
