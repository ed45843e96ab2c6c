use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use axum_extra::headers::{Authorization, HeaderMapExt};
use http_body_util::BodyExt;
use postbox_api::{AppStateInner, router};
use postbox_crypto::Passthrough;
use postbox_store::{Engine, KvBackend, Store};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let store = Store::new(
        Engine::from(KvBackend::new(Duration::from_secs(2))),
        Arc::new(Passthrough),
    );
    router(Arc::new(AppStateInner { store }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    credentials: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
        req = req.header(header::CONTENT_TYPE, "application/json");
    }
    let mut req = req
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    if let Some((user, pass)) = credentials {
        req.headers_mut().typed_insert(Authorization::basic(user, pass));
    }

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> i64 {
    let (status, body) = call(
        app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["user_id"].as_i64().unwrap()
}

#[tokio::test]
async fn registration_is_public_and_validated() {
    let app = app();
    let id = register(&app, "alice", "p1").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "1bad", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = call(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "alice", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::GET, &format!("/users/{id}"), Some(("alice", "p1")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user_id": id, "username": "alice" }));
}

#[tokio::test]
async fn protected_routes_demand_basic_credentials() {
    let app = app();
    register(&app, "alice", "p1").await;

    let (status, _) = call(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/users", Some(("alice", "wrong")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/users")
        .header(header::AUTHORIZATION, "Bearer some-token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let (status, body) = call(&app, Method::GET, "/users", Some(("alice", "p1")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn message_lifecycle_over_http() {
    let app = app();
    let a = register(&app, "a", "pw").await;
    let b = register(&app, "b", "pw").await;
    let c = register(&app, "c", "pw").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(("a", "pw")),
        Some(json!({ "recipients": [b], "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let msg = body["message_id"].as_i64().unwrap();

    let (status, _) = call(&app, Method::GET, &format!("/messages/{msg}"), Some(("c", "pw")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, &format!("/users/{b}/received"), Some(("b", "pw")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([msg]));

    let (status, body) = call(&app, Method::GET, &format!("/messages/{msg}"), Some(("b", "pw")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "hi");
    assert_eq!(body["sender_id"], a);
    assert_eq!(body["read_by"], json!([b]));

    let (status, body) = call(&app, Method::DELETE, &format!("/messages/{msg}"), Some(("a", "pw")), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/users/{c}/messages"),
        Some(("a", "pw")),
        Some(json!({ "body": "unread" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let unread = body["message_id"].as_i64().unwrap();

    let (status, _) = call(&app, Method::DELETE, &format!("/messages/{unread}"), Some(("a", "pw")), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::GET, &format!("/messages/{unread}"), Some(("c", "pw")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, &format!("/users/{a}/sent"), Some(("a", "pw")), None).await;
    assert_eq!(body, json!([msg]));
}

#[tokio::test]
async fn broadcast_reaches_everyone_else() {
    let app = app();
    let a = register(&app, "a", "pw").await;
    let b = register(&app, "b", "pw").await;
    let c = register(&app, "c", "pw").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages/broadcast",
        Some(("a", "pw")),
        Some(json!({ "body": "all hands" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let msg = body["message_id"].as_i64().unwrap();

    let (_, body) = call(&app, Method::GET, &format!("/messages/{msg}"), Some(("a", "pw")), None).await;
    assert_eq!(body["recipients"], json!([b, c]));
    assert_eq!(body["sender_id"], a);
}

#[tokio::test]
async fn users_update_only_themselves() {
    let app = app();
    let alice = register(&app, "alice", "pw").await;
    register(&app, "bob", "pw").await;

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/users/{alice}"),
        Some(("bob", "pw")),
        Some(json!({ "username": "mallory", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/users/{alice}"),
        Some(("alice", "pw")),
        Some(json!({ "username": "alicia", "password": "new" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice);

    let (status, body) = call(&app, Method::GET, "/usernames/alicia", Some(("alicia", "new")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice);

    let (status, _) = call(&app, Method::GET, "/usernames/alice", Some(("alicia", "new")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}
