//! API integration tests
//!
//! Requests are driven in-process through the router with the in-memory
//! store, so no database or running server is needed.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use bookloan_server::{
    api,
    config::AppConfig,
    models::user::UserClaims,
    repository::Repository,
    services::{notifier::Notifier, Services},
    AppResult, AppState,
};

const SECRET: &str = "integration-test-secret";

struct RecordingNotifier(mpsc::UnboundedSender<String>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> AppResult<()> {
        let _ = self.0.send(text.to_string());
        Ok(())
    }
}

/// Build an app backed by a fresh in-memory store
fn test_app() -> (Router, mpsc::UnboundedReceiver<String>) {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.database.url = "memory://".to_string();

    let (tx, rx) = mpsc::unbounded_channel();
    let services = Services::new(Repository::in_memory(), Arc::new(RecordingNotifier(tx)));
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    (api::create_router(state), rx)
}

fn token(user_id: i64, is_staff: bool) -> String {
    let email = if is_staff {
        format!("admin{}@admin.com", user_id)
    } else {
        format!("user{}@user.com", user_id)
    };
    UserClaims::new(user_id, &email, is_staff, chrono::Duration::hours(1))
        .create_token(SECRET)
        .expect("Failed to create token")
}

fn staff() -> String {
    token(100, true)
}

async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("Failed to build request"),
        None => builder.body(Body::empty()).expect("Failed to build request"),
    };

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_raw(app, method, uri, token, body.map(|b| b.to_string())).await
}

async fn create_book(app: &Router, title: &str, inventory: i32) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/books/",
        Some(&staff()),
        Some(json!({
            "title": title,
            "author": "Ann Leckie",
            "cover": "SOFT",
            "inventory": inventory,
            "daily_fee": "0.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn borrow(app: &Router, token: &str, book_id: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/borrowings/",
        Some(token),
        Some(json!({ "book": book_id, "expected_return_date": "2030-01-15" })),
    )
    .await
}

async fn book_inventory(app: &Router, book_id: i64) -> i64 {
    let (status, body) = send(app, Method::GET, &format!("/api/v1/books/{}/", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["inventory"].as_i64().expect("inventory missing")
}

#[tokio::test]
async fn test_health_and_ready() {
    let (app, _rx) = test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_books_are_public() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Ancillary Justice", 3).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["title"], "Ancillary Justice");
    assert_eq!(body[0]["daily_fee"], "0.50");

    let uri = format!("/api/v1/books/{}", book["id"]);
    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cover"], "SOFT");

    let (status, _) = send(&app, Method::GET, "/api/v1/books/999/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_mutations_require_staff() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Provenance", 2).await;
    let uri = format!("/api/v1/books/{}/", book["id"]);
    let payload = json!({
        "title": "Another",
        "author": "Someone",
        "cover": "HARD",
        "inventory": 1,
        "daily_fee": "1.00"
    });

    let (status, _) = send(&app, Method::POST, "/api/v1/books/", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reader = token(1, false);
    let (status, body) = send(&app, Method::POST, "/api/v1/books/", Some(&reader), Some(payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You do not have permission to perform this action.");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&reader), Some(json!({ "inventory": 9 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(book_inventory(&app, book["id"].as_i64().unwrap()).await, 2);
}

#[tokio::test]
async fn test_staff_book_lifecycle() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "The Raven Tower", 4).await;
    let uri = format!("/api/v1/books/{}/", book["id"]);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&staff()),
        Some(json!({ "inventory": 7, "daily_fee": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inventory"], 7);
    assert_eq!(body["daily_fee"], "2.00");
    assert_eq!(body["title"], "The Raven Tower");

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&staff()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_validation_errors() {
    let (app, _rx) = test_app();
    create_book(&app, "Translation State", 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/books/",
        Some(&staff()),
        Some(json!({
            "title": "Translation State",
            "author": "Ann Leckie",
            "cover": "HARD",
            "inventory": 1,
            "daily_fee": "1.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["title"].is_array());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/books/",
        Some(&staff()),
        Some(json!({
            "title": "Negative",
            "author": "Nobody",
            "cover": "HARD",
            "inventory": -1,
            "daily_fee": "1.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["inventory"].is_array());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/books/",
        Some(&staff()),
        Some(json!({
            "title": "Bad cover",
            "author": "Nobody",
            "cover": "PAPERBACK",
            "inventory": 1,
            "daily_fee": "1.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _rx) = test_app();
    let reader = token(1, false);

    let (status, body) = send_raw(
        &app,
        Method::POST,
        "/api/v1/borrowings/",
        Some(&reader),
        Some("{\"book\": ".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_borrowings_require_authentication() {
    let (app, _rx) = test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/borrowings/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");

    let (status, _) = send(&app, Method::GET, "/api/v1/borrowings/", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/api/v1/borrowings/1/return/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_borrow_and_return_round_trip() {
    let (app, mut rx) = test_app();
    let book = create_book(&app, "Ancillary Sword", 10).await;
    let book_id = book["id"].as_i64().unwrap();
    let reader = token(1, false);

    let (status, created) = borrow(&app, &reader, book_id).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["book"], book_id);
    assert_eq!(created["expected_return_date"], "2030-01-15");
    assert!(created["actual_return_date"].is_null());
    assert!(created.get("user").is_none());
    assert_eq!(book_inventory(&app, book_id).await, 9);

    let text = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("notification not delivered")
        .expect("notifier channel closed");
    assert!(text.contains("user1@user.com"));
    assert!(text.contains("Ancillary Sword"));

    let uri = format!("/api/v1/borrowings/{}/return/", created["id"]);
    let (status, returned) = send(&app, Method::POST, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["id"], created["id"]);
    assert!(returned["actual_return_date"].is_string());
    assert_eq!(book_inventory(&app, book_id).await, 10);

    let (status, body) = send(&app, Method::POST, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This borrowing has already been returned.");
    assert_eq!(book_inventory(&app, book_id).await, 10);
}

#[tokio::test]
async fn test_borrow_rejected_when_out_of_stock() {
    let (app, mut rx) = test_app();
    let book = create_book(&app, "Empty Shelf", 0).await;
    let book_id = book["id"].as_i64().unwrap();

    let (status, body) = borrow(&app, &token(1, false), book_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["fields"]["inventory"][0].as_str().unwrap_or_default();
    assert!(message.contains("current inventory: 0"), "{}", message);
    assert_eq!(book_inventory(&app, book_id).await, 0);

    let (status, body) = borrow(&app, &token(1, false), 4242).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["book"].is_array());

    let (_, list) = send(&app, Method::GET, "/api/v1/borrowings/", Some(&staff()), None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(0));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_borrowings_are_scoped_to_owner() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Ancillary Mercy", 5).await;
    let book_id = book["id"].as_i64().unwrap();
    let alice = token(1, false);
    let bob = token(2, false);

    let (_, alice_borrowing) = borrow(&app, &alice, book_id).await;
    let (_, bob_borrowing) = borrow(&app, &bob, book_id).await;

    let (status, list) = send(&app, Method::GET, "/api/v1/borrowings/", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&Value> = list.as_array().unwrap().iter().map(|b| &b["id"]).collect();
    assert_eq!(ids, vec![&alice_borrowing["id"]]);

    // user_id is ignored for regular users
    let (_, list) = send(&app, Method::GET, "/api/v1/borrowings/?user_id=2", Some(&alice), None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["id"], alice_borrowing["id"]);

    let bob_uri = format!("/api/v1/borrowings/{}/", bob_borrowing["id"]);
    let (status, _) = send(&app, Method::GET, &bob_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, detail) = send(&app, Method::GET, &bob_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["book"]["title"], "Ancillary Mercy");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{}return/", bob_uri),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(book_inventory(&app, book_id).await, 3);
}

#[tokio::test]
async fn test_staff_listing_and_filters() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Hyperion", 5).await;
    let book_id = book["id"].as_i64().unwrap();
    let alice = token(1, false);
    let bob = token(2, false);

    let (_, first) = borrow(&app, &alice, book_id).await;
    borrow(&app, &alice, book_id).await;
    borrow(&app, &bob, book_id).await;
    send(
        &app,
        Method::POST,
        &format!("/api/v1/borrowings/{}/return", first["id"]),
        Some(&alice),
        None,
    )
    .await;

    let (_, all) = send(&app, Method::GET, "/api/v1/borrowings", Some(&staff()), None).await;
    assert_eq!(all.as_array().map(Vec::len), Some(3));
    assert!(all[0]["user"].is_number());

    let (_, alice_only) = send(&app, Method::GET, "/api/v1/borrowings?user_id=1", Some(&staff()), None).await;
    assert_eq!(alice_only.as_array().map(Vec::len), Some(2));

    let (_, active) = send(
        &app,
        Method::GET,
        "/api/v1/borrowings?user_id=1&is_active=true",
        Some(&staff()),
        None,
    )
    .await;
    assert_eq!(active.as_array().map(Vec::len), Some(1));

    let (_, returned) = send(&app, Method::GET, "/api/v1/borrowings?is_active=False", Some(&staff()), None).await;
    assert_eq!(returned.as_array().map(Vec::len), Some(1));
    assert_eq!(returned[0]["id"], first["id"]);

    let (_, unfiltered) = send(&app, Method::GET, "/api/v1/borrowings?is_active=maybe", Some(&staff()), None).await;
    assert_eq!(unfiltered.as_array().map(Vec::len), Some(3));

    let (status, body) = send(&app, Method::GET, "/api/v1/borrowings?user_id=abc", Some(&staff()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["user_id"].is_array());
}

#[tokio::test]
async fn test_deleting_book_removes_its_borrowings() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Fall of Hyperion", 2).await;
    let book_id = book["id"].as_i64().unwrap();
    let (_, borrowing) = borrow(&app, &token(1, false), book_id).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/books/{}", book_id),
        Some(&staff()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/borrowings/{}", borrowing["id"]),
        Some(&staff()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_created_borrowing_omits_user_for_staff() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "The Left Hand of Darkness", 2).await;
    let book_id = book["id"].as_i64().unwrap();

    let (status, created) = borrow(&app, &staff(), book_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("user").is_none());

    let uri = format!("/api/v1/borrowings/{}/", created["id"]);
    let (_, detail) = send(&app, Method::GET, &uri, Some(&staff()), None).await;
    assert_eq!(detail["user"], 100);
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let (app, _rx) = test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/books/abc/", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/borrowings/abc/return/",
        Some(&token(1, false)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 6);
}

#[tokio::test]
async fn test_return_after_inventory_raised_to_limit() {
    let (app, _rx) = test_app();
    let book = create_book(&app, "Four Ways to Forgiveness", 1).await;
    let book_id = book["id"].as_i64().unwrap();
    let reader = token(1, false);

    let (_, created) = borrow(&app, &reader, book_id).await;
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/books/{}/", book_id),
        Some(&staff()),
        Some(json!({ "inventory": i32::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/borrowings/{}/return/", created["id"]);
    let (status, body) = send(&app, Method::POST, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["inventory"].is_array());
    assert_eq!(book_inventory(&app, book_id).await, i64::from(i32::MAX));
}
