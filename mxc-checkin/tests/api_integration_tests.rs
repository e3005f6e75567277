//! HTTP API integration tests
//!
//! Requests go through the full router, including caller identification.

mod helpers;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use helpers::{add_user, body_json, request, test_state, FakeCrm, ADMIN_EMAIL};
use mxc_checkin::build_router;
use mxc_checkin::db::{checkins, settings};
use mxc_common::db::Role;
use serde_json::json;
use tower::ServiceExt;

fn crm() -> FakeCrm {
    FakeCrm::new()
        .with_lead(101, json!({"NAME": "Ana", "LAST_NAME": "Souza"}))
        .with_file("44", "image/jpeg", b"\xff\xd8\xff\xe0jpeg")
}

#[tokio::test]
async fn test_health_is_public() {
    let (state, _crm) = test_state(crm()).await;
    let (status, body) = request(&state, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mxc-checkin");
    assert_eq!(body["crm_configured"], true);
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_checkin_requires_signed_in_caller() {
    let (state, _crm) = test_state(crm()).await;

    let (status, body) = request(&state, Method::GET, "/api/checkin/state", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/checkin/state")
                .header("x-user-id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/checkin/state")
                .header("x-user-id", uuid::Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scan_confirm_over_http() {
    let (state, _crm) = test_state(crm()).await;
    let operator = add_user(&state.db, "desk@maxmodels.test", Role::Operator, &[]).await;

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/checkin/scan",
        Some(&operator),
        Some(json!({"code": "101"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "flow");
    assert_eq!(body["data"]["state"], "review");
    assert_eq!(body["data"]["lead"]["model_name"], "Ana Souza");
    assert!(body["data"]["prior"].is_null());

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/checkin/confirm",
        Some(&operator),
        Some(json!({"choice": {"kind": "first"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["state"], "done");
    assert_eq!(body["checkin"]["lead_id"], 101);

    // Not in review any more
    let (status, body) = request(
        &state,
        Method::POST,
        "/api/checkin/confirm",
        Some(&operator),
        Some(json!({"choice": {"kind": "reconfirm_same"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = request(&state, Method::GET, "/api/checkins?lead_id=101", Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_scan_errors_map_to_status_codes() {
    let (state, _crm) = test_state(crm()).await;
    let operator = add_user(&state.db, "desk@maxmodels.test", Role::Operator, &[]).await;

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/checkin/search",
        Some(&operator),
        Some(json!({"query": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/checkin/search",
        Some(&operator),
        Some(json!({"query": "777"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CRM_NOT_FOUND");

    let (_, body) = request(&state, Method::GET, "/api/checkin/state", Some(&operator), None).await;
    assert_eq!(body["state"], "error");
}

#[tokio::test]
async fn test_mapping_unknown_local_field_rejected() {
    let (state, _crm) = test_state(crm()).await;
    let admin = add_user(&state.db, ADMIN_EMAIL, Role::Admin, &[]).await;

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/mappings",
        Some(&admin),
        Some(json!({"local_field": "model_nmae", "crm_field": "UF_CRM_MODEL"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, body) = request(&state, Method::GET, "/api/mappings", Some(&admin), None).await;
    assert!(body["mappings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_mappings_admin_only_and_single_active() {
    let (state, _crm) = test_state(crm()).await;
    let operator = add_user(&state.db, "desk@maxmodels.test", Role::Operator, &[]).await;
    let admin = add_user(&state.db, ADMIN_EMAIL, Role::Admin, &[]).await;

    let payload = json!({"local_field": "model_name", "crm_field": "UF_CRM_MODEL"});
    let (status, _) = request(&state, Method::POST, "/api/mappings", Some(&operator), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, first) = request(&state, Method::POST, "/api/mappings", Some(&admin), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["is_active"], true);

    let (status, _) = request(
        &state,
        Method::POST,
        "/api/mappings",
        Some(&admin),
        Some(json!({"local_field": "model_name", "crm_field": "UF_CRM_MODEL_2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(&state, Method::GET, "/api/mappings", Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    let active: Vec<_> = body["mappings"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["local_field"] == "model_name" && m["is_active"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["crm_field"], "UF_CRM_MODEL_2");
    assert!(body["local_fields"]
        .as_array()
        .unwrap()
        .contains(&json!("presenca_confirmada")));

    // Re-activating the first one swaps them back
    let uri = format!("/api/mappings/{}/activate", first["id"].as_str().unwrap());
    let (status, body) = request(&state, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crm_field"], "UF_CRM_MODEL");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn test_bootstrap_only_without_admin() {
    let (state, _crm) = test_state(crm()).await;
    let payload = json!({"email": ADMIN_EMAIL, "role": "admin"});

    let (status, body) = request(&state, Method::POST, "/api/users/bootstrap", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "admin");

    let (status, _) = request(
        &state,
        Method::POST,
        "/api/users/bootstrap",
        None,
        Some(json!({"email": "second@maxmodels.test", "role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_concurrent_bootstraps_create_one_admin() {
    let (state, _crm) = test_state(crm()).await;

    let (a, b) = tokio::join!(
        request(&state, Method::POST, "/api/users/bootstrap", None, Some(json!({"email": "a@maxmodels.test", "role": "admin"}))),
        request(&state, Method::POST, "/api/users/bootstrap", None, Some(json!({"email": "b@maxmodels.test", "role": "admin"}))),
    );
    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::FORBIDDEN]);

    let admins = mxc_checkin::db::users::list_users(&state.db)
        .await
        .unwrap()
        .into_iter()
        .filter(|u| u.role == Role::Admin)
        .count();
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn test_admin_manages_users_and_bitrix_url() {
    let (state, _crm) = test_state(crm()).await;
    let admin = add_user(&state.db, ADMIN_EMAIL, Role::Admin, &[]).await;

    let (status, user) = request(
        &state,
        Method::POST,
        "/api/users",
        Some(&admin),
        Some(json!({"email": "board@maxmodels.test", "role": "operator", "permissions": ["kanban"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["permissions"], json!(["kanban"]));

    let (status, _) = request(
        &state,
        Method::POST,
        "/api/users",
        Some(&admin),
        Some(json!({"email": "board@maxmodels.test", "role": "operator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/users/{}", admin.id);
    let (status, _) = request(&state, Method::PUT, &uri, Some(&admin), Some(json!({"role": "operator"}))).await;
    assert_eq!(status, StatusCode::CONFLICT, "admins cannot demote themselves");

    let (status, _) = request(
        &state,
        Method::PUT,
        "/api/settings/bitrix",
        Some(&admin),
        Some(json!({"webhook_url": "ftp://nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let url = "https://agency.bitrix24.com.br/rest/1/abc";
    let (status, body) = request(
        &state,
        Method::PUT,
        "/api/settings/bitrix",
        Some(&admin),
        Some(json!({"webhook_url": format!(" {} ", url)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["webhook_url"], url);
    assert_eq!(
        settings::get_bitrix_webhook_url(&state.db).await.unwrap().as_deref(),
        Some(url)
    );
}

#[tokio::test]
async fn test_lead_photo_proxy_allows_any_origin() {
    let (state, _crm) = test_state(crm()).await;

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/lead-photo?file_id=44")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let (status, _) = request(&state, Method::GET, "/api/lead-photo?file_id=../etc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(&state, Method::GET, "/api/lead-photo?file_id=45", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CRM_NOT_FOUND");
}

#[tokio::test]
async fn test_appointment_webhook_accepts_query_json_and_form() {
    let (state, _crm) = test_state(crm()).await;
    let operator = add_user(&state.db, "desk@maxmodels.test", Role::Operator, &[]).await;

    let (status, body) = request(
        &state,
        Method::GET,
        "/webhooks/appointment?id=300&nome=Ana&data=19/10/2026&hora=10:00",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["lead_id"], 300);
    assert_eq!(body["scheduled_at"], "2026-10-19T13:00:00Z");

    let (status, body) = request(
        &state,
        Method::POST,
        "/webhooks/appointment",
        None,
        Some(json!({"lead_id": "301", "name": "Bia", "datetime": "2026-10-19T15:00:00-03:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["client_name"], "Bia");

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/webhooks/appointment?hora=16:00")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("data%5BFIELDS%5D%5BID%5D=302&data=2026-10-19&telefone=11999990000"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["lead_id"], 302);
    assert_eq!(body["phone"], "11999990000");
    assert_eq!(body["scheduled_at"], "2026-10-19T19:00:00Z");

    // Re-sent webhook moves the existing appointment instead of adding one
    let (status, _) = request(
        &state,
        Method::GET,
        "/webhooks/appointment?id=300&data=19/10/2026&hora=11:30",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &state,
        Method::GET,
        "/api/appointments?date=2026-10-19",
        Some(&operator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 3);
    let ana = list.iter().find(|a| a["lead_id"] == 300).unwrap();
    assert_eq!(ana["scheduled_at"], "2026-10-19T14:30:00Z");

    let (status, _) = request(&state, Method::POST, "/webhooks/appointment", None, Some(json!({"nome": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_screensaver_state_and_config() {
    let (state, _crm) = test_state(crm()).await;
    let admin = add_user(&state.db, ADMIN_EMAIL, Role::Admin, &[]).await;

    let (status, body) = request(&state, Method::GET, "/api/screensaver/state", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["current_media"].is_null());

    let config = json!({
        "media": [
            {"id": "a", "kind": "image", "url": "/media/a.jpg"},
            {"id": "b", "kind": "image", "url": "/media/b.jpg"}
        ],
        "taglines": ["Welcome to Max Models"],
        "slide_secs": 5,
        "tagline_secs": 8
    });
    let (status, _) = request(&state, Method::PUT, "/api/screensaver/config", None, Some(config.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = request(&state, Method::PUT, "/api/screensaver/config", Some(&admin), Some(config)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = request(&state, Method::GET, "/api/screensaver/state", None, None).await;
    assert_eq!(body["current_media"]["id"], "a");
    assert_eq!(body["current_tagline"], "Welcome to Max Models");

    let (status, body) = request(
        &state,
        Method::POST,
        "/api/screensaver/advance",
        None,
        Some(json!({"elapsed_ms": 5000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(!body["steps"].as_array().unwrap().is_empty());

    let (_, body) = request(&state, Method::GET, "/api/screensaver/state", None, None).await;
    assert_eq!(body["current_media"]["id"], "b");

    let (status, _) = request(
        &state,
        Method::POST,
        "/api/screensaver/advance",
        None,
        Some(json!({"elapsed_ms": 600000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recent_checkins_listing_clamps_limit() {
    let (state, _crm) = test_state(crm()).await;
    let operator = add_user(&state.db, "desk@maxmodels.test", Role::Operator, &[]).await;
    for lead_id in 1..=3 {
        checkins::insert_checkin(
            &state.db,
            &checkins::NewCheckIn {
                lead_id,
                model_name: format!("Model {}", lead_id),
                model_photo: None,
                responsible: None,
                deal_id: None,
                checked_in_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    let (status, body) = request(&state, Method::GET, "/api/checkins?limit=0", Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = request(&state, Method::GET, "/api/checkins?lead_id=-4", Some(&operator), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
