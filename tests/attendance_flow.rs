use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use gymdesk::{app::build_app, attendance::repo as attendance_repo, auth::Role, error::AppError};
use time::OffsetDateTime;
use tower::ServiceExt;

#[macro_use]
mod common;

async fn post(app: &Router, uri: &str, auth: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::post(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn double_check_in_leaves_one_open_session() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let state = common::state(pool.clone());
    let mut conn = pool.acquire().await.unwrap();

    let admin = common::seed_user(&mut conn, Role::Admin).await;
    let (_, member_id) = common::seed_member(&mut conn).await;
    let auth = common::bearer(&state, admin, Role::Admin);
    let app = build_app(state);
    let body = serde_json::json!({ "member_id": member_id });

    let (status, json) = post(&app, "/api/attendance/check-in", &auth, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["attendance"]["member_name"], "Test Member");

    let (status, json) = post(&app, "/api/attendance/check-in", &auth, body.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Member is already checked in");

    let open: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE member_id = $1 AND check_out IS NULL")
            .bind(member_id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    assert_eq!(open, 1);

    let (status, json) = post(&app, "/api/attendance/check-out", &auth, body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert!(json["attendance"]["duration_minutes"].as_i64().unwrap() >= 0);

    let (status, json) = post(&app, "/api/attendance/check-out", &auth, body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No active check-in found for this member");
}

#[tokio::test]
async fn member_checks_in_only_themself() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let state = common::state(pool.clone());
    let mut conn = pool.acquire().await.unwrap();

    let (user_id, _) = common::seed_member(&mut conn).await;
    let (_, other_member) = common::seed_member(&mut conn).await;
    let auth = common::bearer(&state, user_id, Role::Member);
    let app = build_app(state);

    let (status, _) = post(
        &app,
        "/api/attendance/check-in",
        &auth,
        serde_json::json!({ "member_id": other_member }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(&app, "/api/attendance/check-in", &auth, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn open_session_index_rejects_a_racing_insert() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();
    let (_, member_id) = common::seed_member(&mut conn).await;

    attendance_repo::insert_check_in(&mut conn, member_id, None, OffsetDateTime::now_utc())
        .await
        .unwrap();
    let err: AppError = attendance_repo::insert_check_in(&mut conn, member_id, None, OffsetDateTime::now_utc())
        .await
        .unwrap_err()
        .into();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.to_string(), "Member is already checked in");
}
