//! App state, request and webhook-receiver helpers

use super::FakeCrm;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use mxc_checkin::api::auth::USER_HEADER;
use mxc_checkin::{build_router, AppState};
use mxc_common::db::{create_schema, Role, User};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@maxmodels.test";

/// Scan cooldown used by test states
pub const TEST_COOLDOWN_MS: u64 = 3000;

async fn memory_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

/// App state over an in-memory database and the given fake CRM
pub async fn test_state(crm: FakeCrm) -> (AppState, Arc<FakeCrm>) {
    let db = memory_db().await;
    let crm = Arc::new(crm);
    let state = AppState::new(db, crm.clone(), TEST_COOLDOWN_MS);
    (state, crm)
}

pub async fn add_user(db: &SqlitePool, email: &str, role: Role, permissions: &[&str]) -> User {
    let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    mxc_checkin::db::users::create_user(db, email, role, &permissions)
        .await
        .unwrap()
}

pub async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// One request through a fresh router; returns status and JSON body
pub async fn request(
    state: &AppState,
    method: Method,
    uri: &str,
    user: Option<&User>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user.id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

/// Bodies posted to a [`spawn_receiver`] server
pub type Received = Arc<Mutex<Vec<Value>>>;

/// Local HTTP server standing in for an outbound webhook target.
///
/// `POST /ok` records the body and answers 200; `POST /fail` records it and
/// answers 500. Returns the base URL.
pub async fn spawn_receiver() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let ok = received.clone();
    let fail = received.clone();
    let app = Router::new()
        .route(
            "/ok",
            post(move |Json(body): Json<Value>| {
                let ok = ok.clone();
                async move {
                    ok.lock().unwrap().push(body);
                    StatusCode::OK
                }
            }),
        )
        .route(
            "/fail",
            post(move |Json(body): Json<Value>| {
                let fail = fail.clone();
                async move {
                    fail.lock().unwrap().push(body);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), received)
}
