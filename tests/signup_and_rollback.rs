use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use gymdesk::{app::build_app, auth::Role, state::AppState};
use tower::ServiceExt;

#[macro_use]
mod common;

async fn post(
    state: AppState,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    let res = build_app(state)
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn underage_signup_creates_no_user() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let email = common::unique_test_email("teen");

    let (status, json) = post(
        common::state(pool.clone()),
        "/auth/signup",
        None,
        serde_json::json!({
            "firstName": "Teen",
            "lastName": "Lifter",
            "email": email,
            "phone": "5551234567",
            "dateOfBirth": "2020-01-01",
            "password": "Str0ngPass",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "You must be at least 16 years old");

    let mut conn = pool.acquire().await.unwrap();
    assert!(!common::email_exists(&mut conn, &email).await);
}

#[tokio::test]
async fn failed_member_create_rolls_back_user_row() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let state = common::state(pool.clone());
    let mut conn = pool.acquire().await.unwrap();

    let admin = common::seed_user(&mut conn, Role::Admin).await;
    let auth = common::bearer(&state, admin, Role::Admin);
    let email = common::unique_test_email("rollback");

    let (status, json) = post(
        state,
        "/api/members",
        Some(&auth),
        serde_json::json!({
            "email": email,
            "firstName": "Half",
            "lastName": "Made",
            "password": "Str0ngPass",
            "phone": "5551234567",
            "address": "1 Main St",
            "height": 180,
            "weight": 80,
            "membershipPlan": format!("No such plan {}", uuid::Uuid::new_v4()),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{json}");
    assert!(json["error"].as_str().unwrap().starts_with("Membership plan not found"));

    assert!(!common::email_exists(&mut conn, &email).await);
}
