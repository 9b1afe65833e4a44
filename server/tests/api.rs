use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use loo_server::{
    auth::{encode_token, Claims},
    build_app,
    config::Config,
    repository::InMemoryLooRepository,
    state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "loo-test-boundary";
const MIB: usize = 1024 * 1024;

fn app() -> Router {
    let repo = Arc::new(InMemoryLooRepository::new());
    build_app(AppState::new(repo, Config::in_memory(SECRET)))
}

fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id,
        username: format!("user-{user_id}"),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    encode_token(&claims, SECRET).expect("token should encode")
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    if body.is_empty() {
        return (status, Value::Null);
    }
    let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
    (status, json)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match payload {
        Some(payload) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");
    read(app.clone().oneshot(request).await.expect("response expected")).await
}

fn multipart_body(loo_id: Option<&str>, image: Option<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(loo_id) = loo_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"loo_id\"\r\n\r\n{loo_id}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"photo\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_multipart(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body)).expect("request should build");
    read(app.clone().oneshot(request).await.expect("response expected")).await
}

async fn create_loo(app: &Router, token: Option<&str>, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/loos/",
        token,
        Some(json!({
            "name": name,
            "description": "Behind the ticket office",
            "latitude": 51.5308,
            "longitude": -0.1238,
            "cleanliness": 4,
            "privacy": 3,
            "tags": ["Free", "24/7"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().expect("created loo should have id").to_string()
}

async fn review(app: &Router, loo_id: &str, token: &str, rating: Value) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/loos/{loo_id}/reviews/"),
        Some(token),
        Some(json!({ "rating": rating, "body": "fine" })),
    )
    .await
}

async fn upload(app: &Router, token: &str, loo_id: &str, content_type: &str, size: usize) -> (StatusCode, Value) {
    send_multipart(
        app,
        Method::POST,
        "/api/upload-image/",
        Some(token),
        multipart_body(Some(loo_id), Some((content_type, vec![0xAB; size]))),
    )
    .await
}

#[tokio::test]
async fn health_is_open() {
    let (status, body) = send(&app(), Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn anonymous_loo_has_no_owner_and_no_rating() {
    let app = app();
    let id = create_loo(&app, None, "Kings Cross").await;

    let (status, body) = send(&app, Method::GET, &format!("/api/loos/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Kings Cross");
    assert_eq!(body["owner_id"], Value::Null);
    assert_eq!(body["average_rating"], Value::Null);
    assert_eq!(body["review_count"], 0);
    assert_eq!(body["tags"], json!(["Free", "24/7"]));
    assert_eq!(body["images"], json!([]));
}

#[tokio::test]
async fn missing_coordinates_are_rejected() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/api/loos/",
        None,
        Some(json!({ "name": "nowhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn average_rating_tracks_reviews() {
    let app = app();
    let loo_id = create_loo(&app, None, "Station").await;

    for rating in [5, 4, 4] {
        let token = token_for(Uuid::new_v4());
        let (status, _) = review(&app, &loo_id, &token, json!(rating)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(body["review_count"], 3);
    assert_eq!(body["average_rating"].as_f64(), Some(4.3));

    let (_, list) = send(&app, Method::GET, "/api/loos/", None, None).await;
    assert_eq!(list[0]["average_rating"].as_f64(), Some(4.3));

    let (status, reviews) = send(
        &app,
        Method::GET,
        &format!("/api/loos/{loo_id}/reviews/"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviews.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn second_review_by_same_user_is_rejected() {
    let app = app();
    let loo_id = create_loo(&app, None, "Park").await;
    let token = token_for(Uuid::new_v4());

    let (status, _) = review(&app, &loo_id, &token, json!(2)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = review(&app, &loo_id, &token, json!(5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already reviewed this loo");

    let (_, detail) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(detail["review_count"], 1);
    assert_eq!(detail["average_rating"].as_f64(), Some(2.0));
}

#[tokio::test]
async fn concurrent_reviews_by_same_user_admit_one() {
    let app = app();
    let loo_id = create_loo(&app, None, "Mall").await;
    let token = token_for(Uuid::new_v4());

    let attempts = (0..6).map(|_| {
        let app = app.clone();
        let loo_id = loo_id.clone();
        let token = token.clone();
        tokio::spawn(async move { review(&app, &loo_id, &token, json!(3)).await.0 })
    });

    let mut statuses = Vec::new();
    for attempt in attempts.collect::<Vec<_>>() {
        statuses.push(attempt.await.expect("task should finish"));
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(),
        5
    );
}

#[tokio::test]
async fn review_requires_authentication_and_valid_rating() {
    let app = app();
    let loo_id = create_loo(&app, None, "Library").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/loos/{loo_id}/reviews/"),
        None,
        Some(json!({ "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = token_for(Uuid::new_v4());
    for bad in [json!(0), json!(6), json!(4.5), json!("five")] {
        let (status, body) = review(&app, &loo_id, &token, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    let (status, _) = review(&app, &Uuid::new_v4().to_string(), &token, json!(3)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_reviewer_may_change_review() {
    let app = app();
    let loo_id = create_loo(&app, None, "Cafe").await;
    let author = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());

    let (_, created) = review(&app, &loo_id, &author, json!(1)).await;
    let uri = format!("/api/reviews/{}/", created["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::PATCH, &uri, Some(stranger.as_str()), Some(json!({ "rating": 5 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(stranger.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(&app, Method::PATCH, &uri, Some(author.as_str()), Some(json!({ "rating": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["rating"], 5);
    assert_eq!(updated["body"], "fine");

    let (_, detail) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(detail["average_rating"].as_f64(), Some(5.0));

    let (status, _) = send(&app, Method::DELETE, &uri, Some(author.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(detail["review_count"], 0);
    assert_eq!(detail["average_rating"], Value::Null);
}

#[tokio::test]
async fn upload_enforces_size_and_type() {
    let app = app();
    let token = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, Some(token.as_str()), "Hotel").await;

    let (status, body) = upload(&app, &token, &loo_id, "image/jpeg", 4 * MIB).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["size"], 4 * MIB);
    assert_eq!(body["content_type"], "image/jpeg");

    let (status, body) = upload(&app, &token, &loo_id, "image/jpeg", 6 * MIB).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image size must be less than 5MB");

    for size in [10, 2 * MIB] {
        let (status, body) = upload(&app, &token, &loo_id, "image/gif", size).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only JPEG and PNG images are allowed");
    }

    let (_, detail) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(detail["images"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn upload_rejects_incomplete_or_unknown_targets() {
    let app = app();
    let token = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, None, "Gas station").await;

    let (status, _) = send_multipart(
        &app,
        Method::POST,
        "/api/upload-image/",
        Some(token.as_str()),
        multipart_body(None, Some(("image/png", vec![1; 16]))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_multipart(
        &app,
        Method::POST,
        "/api/upload-image/",
        Some(token.as_str()),
        multipart_body(Some(loo_id.as_str()), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = upload(&app, &token, &Uuid::new_v4().to_string(), "image/png", 16).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_multipart(
        &app,
        Method::POST,
        "/api/upload-image/",
        None,
        multipart_body(Some(loo_id.as_str()), Some(("image/png", vec![1; 16]))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_uploader_may_change_image() {
    let app = app();
    let uploader = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, None, "Museum").await;

    let (_, image) = upload(&app, &uploader, &loo_id, "image/png", 32).await;
    let image_id = image["id"].as_str().unwrap().to_string();
    let uri = format!("/api/images/{image_id}/");

    let request = Request::builder()
        .uri(format!("/api/images/{image_id}/file"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), 32);

    let (status, _) = send_multipart(
        &app,
        Method::PUT,
        &uri,
        Some(stranger.as_str()),
        multipart_body(None, Some(("image/jpeg", vec![2; 8]))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, replaced) = send_multipart(
        &app,
        Method::PUT,
        &uri,
        Some(uploader.as_str()),
        multipart_body(None, Some(("image/jpeg", vec![2; 8]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["content_type"], "image/jpeg");
    assert_eq!(replaced["size"], 8);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(stranger.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(uploader.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_loo_removes_images_and_reviews() {
    let app = app();
    let owner = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, Some(owner.as_str()), "Doomed").await;
    let keeper_id = create_loo(&app, Some(owner.as_str()), "Keeper").await;

    let (_, image) = upload(&app, &owner, &loo_id, "image/png", 64).await;
    let (_, own_review) = review(&app, &loo_id, &owner, json!(4)).await;
    review(&app, &keeper_id, &owner, json!(2)).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/loos/{loo_id}/"), Some(owner.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/images/{}/", image["id"].as_str().unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/reviews/{}/", own_review["id"].as_str().unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, remaining) = send(&app, Method::GET, "/api/reviews/", None, None).await;
    assert_eq!(remaining.as_array().map(Vec::len), Some(1));
    assert_eq!(remaining[0]["loo_id"], keeper_id.as_str());
}

#[tokio::test]
async fn my_loos_requires_auth_and_lists_newest_first() {
    let app = app();
    let me = token_for(Uuid::new_v4());
    let someone_else = token_for(Uuid::new_v4());

    let first = create_loo(&app, Some(me.as_str()), "First").await;
    create_loo(&app, Some(someone_else.as_str()), "Theirs").await;
    create_loo(&app, None, "Nobody's").await;
    let second = create_loo(&app, Some(me.as_str()), "Second").await;

    let (status, body) = send(&app, Method::GET, "/api/my-loos/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, body) = send(&app, Method::GET, "/api/my-loos/", Some(me.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|loo| loo["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn only_owner_may_change_loo() {
    let app = app();
    let owner = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, Some(owner.as_str()), "Owned").await;
    let uri = format!("/api/loos/{loo_id}/");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(stranger.as_str()), Some(json!({ "name": "Mine" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(owner.as_str()), Some(json!({ "privacy": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privacy"], 5);
    assert_eq!(body["name"], "Owned");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(owner.as_str()),
        Some(json!({ "name": "Renamed", "latitude": 10.0, "longitude": 20.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["cleanliness"], 0);
    assert_eq!(body["tags"], json!([]));
}

#[tokio::test]
async fn anonymous_loo_can_never_be_mutated() {
    let app = app();
    let loo_id = create_loo(&app, None, "Orphan").await;
    let uri = format!("/api/loos/{loo_id}/");
    let user = token_for(Uuid::new_v4());

    let (status, _) = send(&app, Method::PATCH, &uri, None, Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::PATCH, &uri, Some(user.as_str()), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(user.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_token_is_rejected_even_on_reads() {
    let (status, body) = send(&app(), Method::GET, "/api/loos/", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let (status, body) = send(&app(), Method::GET, "/api/loos/42/", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_collection_filters_answer_with_json_errors() {
    let app = app();
    for uri in ["/api/reviews/?loo=abc", "/api/images/?loo=abc"] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}: {body}");
    }
}

#[tokio::test]
async fn upload_beyond_body_limit_is_payload_too_large() {
    let app = app();
    let token = token_for(Uuid::new_v4());
    let loo_id = create_loo(&app, Some(token.as_str()), "Stadium").await;

    let (status, body) = upload(&app, &token, &loo_id, "image/jpeg", 20 * MIB).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image size must be less than 5MB");

    let (_, detail) = send(&app, Method::GET, &format!("/api/loos/{loo_id}/"), None, None).await;
    assert_eq!(detail["images"].as_array().map(Vec::len), Some(0));
}
