use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use gymdesk::{
    app::build_app,
    auth::Role,
    error::AppError,
    memberships::{
        repo as membership_repo,
        services::{display_status, subscribe, MembershipStatus, SubscribeInput},
    },
    payments::repo as payment_repo,
};
use rust_decimal::Decimal;
use time::macros::date;
use tower::ServiceExt;
use uuid::Uuid;

#[macro_use]
mod common;

#[tokio::test]
async fn thirty_day_plan_lifecycle() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();

    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = membership_repo::insert_plan(
        &mut conn,
        &format!("Monthly {}", Uuid::new_v4().simple()),
        30,
        Decimal::new(1000, 0),
        None,
    )
    .await
    .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let created = subscribe(
        &mut tx,
        SubscribeInput {
            member_id,
            plan: &plan,
            start_date: date!(2024 - 01 - 01),
            discount: Decimal::new(10, 0),
            payment_mode: None,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let sub = &created.subscription;
    assert_eq!(sub.end_date, date!(2024 - 01 - 31));
    assert_eq!(sub.status, "active");
    assert_eq!(sub.amount_paid, Decimal::new(900, 0));
    assert_eq!(
        display_status(&sub.status, sub.start_date, sub.end_date, date!(2024 - 01 - 01)),
        MembershipStatus::Active
    );
    assert_eq!(
        display_status(&sub.status, sub.start_date, sub.end_date, date!(2024 - 02 - 01)),
        MembershipStatus::Expired
    );

    let payment = payment_repo::find(&mut conn, created.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.amount, Decimal::new(900, 0));
    assert_eq!(payment.membership_id, Some(sub.id));
    assert_eq!(payment.mode.as_deref(), Some("Cash"));
}

#[tokio::test]
async fn overlapping_membership_is_rejected() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();

    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = membership_repo::insert_plan(
        &mut conn,
        &format!("Overlap {}", Uuid::new_v4().simple()),
        30,
        Decimal::new(500, 0),
        None,
    )
    .await
    .unwrap();
    let plan_ref = &plan;
    let input = |start_date| SubscribeInput {
        member_id,
        plan: plan_ref,
        start_date,
        discount: Decimal::ZERO,
        payment_mode: Some("UPI"),
    };

    let mut tx = pool.begin().await.unwrap();
    subscribe(&mut tx, input(date!(2024 - 01 - 01))).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let err = subscribe(&mut tx, input(date!(2024 - 01 - 15))).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    assert_eq!(err.to_string(), "Member has an active membership until 2024-01-31");
    drop(tx);

    let history = membership_repo::history_for_member(&mut conn, member_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn plan_with_active_subscription_cannot_be_deleted() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let state = common::state(pool.clone());
    let mut conn = pool.acquire().await.unwrap();

    let admin = common::seed_user(&mut conn, Role::Admin).await;
    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = membership_repo::insert_plan(
        &mut conn,
        &format!("Locked {}", Uuid::new_v4().simple()),
        30,
        Decimal::new(700, 0),
        None,
    )
    .await
    .unwrap();
    let mut tx = pool.begin().await.unwrap();
    subscribe(
        &mut tx,
        SubscribeInput {
            member_id,
            plan: &plan,
            start_date: date!(2024 - 05 - 01),
            discount: Decimal::ZERO,
            payment_mode: None,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let req = Request::delete(format!("/api/memberships/plans/{}", plan.id))
        .header(header::AUTHORIZATION, common::bearer(&state, admin, Role::Admin))
        .body(Body::empty())
        .unwrap();
    let res = build_app(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert!(membership_repo::find_plan(&mut conn, plan.id).await.unwrap().is_some());
}

#[tokio::test]
async fn future_subscription_is_reported_upcoming() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let state = common::state(pool.clone());
    let mut conn = pool.acquire().await.unwrap();

    let admin = common::seed_user(&mut conn, Role::Admin).await;
    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = membership_repo::insert_plan(
        &mut conn,
        &format!("Later {}", Uuid::new_v4().simple()),
        30,
        Decimal::new(300, 0),
        None,
    )
    .await
    .unwrap();

    let body = serde_json::json!({
        "member_id": member_id,
        "plan_id": plan.id,
        "start_date": "2099-01-01",
    });
    let req = Request::post("/api/memberships")
        .header(header::AUTHORIZATION, common::bearer(&state, admin, Role::Admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = build_app(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["membership"]["status"], "active");
    assert_eq!(json["membership"]["display_status"], "upcoming");
    assert_eq!(json["membership"]["end_date"], "2099-01-31");
}

#[tokio::test]
async fn start_date_at_calendar_edge_is_rejected() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();

    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = membership_repo::insert_plan(
        &mut conn,
        &format!("Edge {}", Uuid::new_v4().simple()),
        30,
        Decimal::new(300, 0),
        None,
    )
    .await
    .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let err = subscribe(
        &mut tx,
        SubscribeInput {
            member_id,
            plan: &plan,
            start_date: date!(9999 - 12 - 31),
            discount: Decimal::ZERO,
            payment_mode: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
