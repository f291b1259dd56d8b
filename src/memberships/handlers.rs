use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::collections::HashMap;
use time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreateSubscriptionRequest, CreatedSubscription, CreatedSubscriptionResponse,
        MembershipCounts, MembershipStatsResponse, PlanListResponse, PlanRequest, PlanResponse,
        PlanView, RevenueFigures, SubscriptionListResponse, SubscriptionQuery, SubscriptionView,
        UpdateSubscriptionRequest, UpdatedSubscription, UpdatedSubscriptionResponse,
    },
    repo,
    repo_types::{Plan, SubscriptionFilter},
    services::{
        display_status, full_name, subscribe, MembershipStatus, SubscribeInput, MAX_PLAN_DURATION_DAYS,
    },
};
use crate::{
    auth::{CurrentUser, Role},
    common::{clean, parse_id, parse_optional_date, today, ApiJson, ApiPath, ApiQuery, MessageResponse, Page},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn membership_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/stats", get(membership_stats))
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/:id", put(update_plan).delete(delete_plan))
        .route("/:id", put(update_subscription))
}

fn validate_plan_fields(name: &str, duration_days: i32, price: rust_decimal::Decimal) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if duration_days <= 0 {
        return Err(AppError::validation("Duration must be positive"));
    }
    if duration_days > MAX_PLAN_DURATION_DAYS {
        return Err(AppError::validation(format!(
            "Duration must be at most {MAX_PLAN_DURATION_DAYS} days"
        )));
    }
    if price.is_sign_negative() {
        return Err(AppError::validation("Price cannot be negative"));
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn list_plans(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<PlanListResponse>> {
    let mut conn = state.db.acquire().await?;
    let plans = repo::list_plans(&mut conn).await?;

    let usage: HashMap<Uuid, _> = if user.is_admin() {
        repo::plan_usage(&mut conn)
            .await?
            .into_iter()
            .map(|u| (u.plan_id, u))
            .collect()
    } else {
        HashMap::new()
    };

    let plans: Vec<PlanView> = plans
        .into_iter()
        .map(|plan| {
            let (active, revenue) = match usage.get(&plan.id) {
                Some(u) => (u.active_memberships, u.total_revenue),
                None => (0, rust_decimal::Decimal::ZERO),
            };
            PlanView {
                active_memberships: user.is_admin().then_some(active),
                total_revenue: user.is_admin().then_some(revenue),
                plan,
            }
        })
        .collect();

    Ok(Json(PlanListResponse {
        total: plans.len(),
        plans,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_plan(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<PlanRequest>,
) -> AppResult<(StatusCode, Json<PlanResponse>)> {
    user.require(&[Role::Admin])?;

    let name = clean(payload.name).ok_or_else(|| AppError::validation("name is required"))?;
    let duration_days = payload
        .duration_days
        .ok_or_else(|| AppError::validation("duration_days is required"))?;
    let price = payload
        .price
        .ok_or_else(|| AppError::validation("price is required"))?;
    validate_plan_fields(&name, duration_days, price)?;
    let description = clean(payload.description);

    let mut tx = state.db.begin().await?;
    if repo::plan_name_taken(&mut tx, &name, None).await? {
        return Err(AppError::conflict("Plan name already exists"));
    }
    let plan = repo::insert_plan(&mut tx, &name, duration_days, price, description.as_deref()).await?;
    tx.commit().await?;

    info!(plan_id = %plan.id, name = %plan.name, "membership plan created");
    Ok((
        StatusCode::CREATED,
        Json(PlanResponse {
            message: "Membership plan created successfully",
            plan,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_plan(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<PlanRequest>,
) -> AppResult<Json<PlanResponse>> {
    user.require(&[Role::Admin])?;

    let mut tx = state.db.begin().await?;
    let current = repo::find_plan(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Plan not found"))?;

    let name = match payload.name {
        Some(n) => n.trim().to_string(),
        None => current.name.clone(),
    };
    let updated = Plan {
        duration_days: payload.duration_days.unwrap_or(current.duration_days),
        price: payload.price.unwrap_or(current.price),
        description: match payload.description {
            Some(d) => clean(Some(d)),
            None => current.description.clone(),
        },
        name,
        ..current
    };
    validate_plan_fields(&updated.name, updated.duration_days, updated.price)?;

    if repo::plan_name_taken(&mut tx, &updated.name, Some(id)).await? {
        return Err(AppError::conflict("Plan name already exists"));
    }
    let plan = repo::update_plan(&mut tx, &updated).await?;
    tx.commit().await?;

    info!(plan_id = %plan.id, "membership plan updated");
    Ok(Json(PlanResponse {
        message: "Membership plan updated successfully",
        plan,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_plan(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    user.require(&[Role::Admin])?;

    let mut tx = state.db.begin().await?;
    repo::find_plan(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Plan not found"))?;

    let active = repo::count_active_for_plan(&mut tx, id).await?;
    if active > 0 {
        warn!(plan_id = %id, active, "plan delete blocked by active memberships");
        return Err(AppError::conflict(format!(
            "Cannot delete plan with {active} active memberships"
        )));
    }

    repo::delete_plan(&mut tx, id).await?;
    tx.commit().await?;

    info!(plan_id = %id, "membership plan deleted");
    Ok(Json(MessageResponse {
        message: "Membership plan deleted successfully",
    }))
}

#[instrument(skip(state, user))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<SubscriptionQuery>,
) -> AppResult<Json<SubscriptionListResponse>> {
    user.require(&[Role::Admin])?;

    let status = match clean(q.status) {
        Some(s) if s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(s.parse::<MembershipStatus>()?.as_str().to_string()),
        None => None,
    };
    let filter = SubscriptionFilter {
        status,
        member_id: clean(q.member_id).map(|s| parse_id(&s, "member")).transpose()?,
        plan_id: clean(q.plan_id).map(|s| parse_id(&s, "plan")).transpose()?,
    };
    let page = Page::new(q.page, q.limit);

    let mut conn = state.db.acquire().await?;
    let (rows, total) = repo::list_subscriptions(&mut conn, &filter, page.limit, page.offset()).await?;

    let today = today();
    Ok(Json(SubscriptionListResponse {
        memberships: rows
            .into_iter()
            .map(|row| SubscriptionView::from_detail(row, today))
            .collect(),
        meta: page.meta(total),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<CreatedSubscriptionResponse>)> {
    user.require(&[Role::Admin])?;

    let member_id = clean(payload.member_id).ok_or_else(|| AppError::validation("member_id is required"))?;
    let plan_id = clean(payload.plan_id).ok_or_else(|| AppError::validation("plan_id is required"))?;
    let (member_id, plan_id) = match (Uuid::parse_str(&member_id), Uuid::parse_str(&plan_id)) {
        (Ok(m), Ok(p)) => (m, p),
        _ => return Err(AppError::validation("Invalid member_id or plan_id format")),
    };
    let start_date = parse_optional_date(payload.start_date.as_deref())
        .map_err(|_| AppError::validation("Invalid start_date format. Use YYYY-MM-DD"))?
        .unwrap_or_else(today);
    let payment_mode = clean(payload.payment_mode);

    let mut tx = state.db.begin().await?;
    let plan = repo::find_plan(&mut tx, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Plan not found"))?;

    let created = subscribe(
        &mut tx,
        SubscribeInput {
            member_id,
            plan: &plan,
            start_date,
            discount: payload.discount.unwrap_or_default(),
            payment_mode: payment_mode.as_deref(),
        },
    )
    .await?;
    tx.commit().await?;

    let s = created.subscription;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSubscriptionResponse {
            message: "Membership created successfully",
            membership: CreatedSubscription {
                id: s.id,
                member_name: full_name(
                    created.member.first_name.as_deref(),
                    created.member.last_name.as_deref(),
                ),
                plan_name: plan.name,
                start_date: s.start_date,
                end_date: s.end_date,
                display_status: display_status(&s.status, s.start_date, s.end_date, today()),
                status: s.status,
                amount_paid: s.amount_paid,
                discount: s.discount,
                payment_id: created.payment_id,
            },
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateSubscriptionRequest>,
) -> AppResult<Json<UpdatedSubscriptionResponse>> {
    user.require(&[Role::Admin])?;

    let status = clean(payload.status)
        .map(|s| s.parse::<MembershipStatus>())
        .transpose()?;
    let end_date = parse_optional_date(payload.end_date.as_deref())
        .map_err(|_| AppError::validation("Invalid end_date format. Use YYYY-MM-DD"))?;

    let mut tx = state.db.begin().await?;
    let current = repo::find_subscription(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Membership not found"))?;

    let end_date = end_date.unwrap_or(current.end_date);
    if end_date < current.start_date {
        return Err(AppError::validation("End date cannot be before start date"));
    }
    let status = status.map(|s| s.as_str()).unwrap_or(current.status.as_str());

    let updated = repo::update_subscription(&mut tx, id, status, end_date).await?;
    tx.commit().await?;

    info!(membership_id = %id, status = %updated.status, "membership updated");
    Ok(Json(UpdatedSubscriptionResponse {
        message: "Membership updated successfully",
        membership: UpdatedSubscription {
            id: updated.id,
            display_status: display_status(&updated.status, updated.start_date, updated.end_date, today()),
            status: updated.status,
            end_date: updated.end_date,
        },
    }))
}

#[instrument(skip(state, user))]
pub async fn membership_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<MembershipStatsResponse>> {
    user.require(&[Role::Admin])?;

    let today = today();
    let mut conn = state.db.acquire().await?;

    let mut counts = MembershipCounts::default();
    for row in repo::counts_by_status(&mut conn).await? {
        match row.status.parse::<MembershipStatus>() {
            Ok(MembershipStatus::Active) => counts.active = row.count,
            Ok(MembershipStatus::Upcoming) => counts.upcoming = row.count,
            Ok(MembershipStatus::Expired) => counts.expired = row.count,
            Ok(MembershipStatus::Cancelled) => counts.cancelled = row.count,
            Ok(MembershipStatus::Suspended) => counts.suspended = row.count,
            Err(_) => warn!(status = %row.status, "unknown stored membership status"),
        }
    }
    counts.expiring_soon = repo::count_expiring(&mut conn, today, today + Duration::days(30)).await?;

    let month_start = today.replace_day(1).unwrap_or(today);
    let revenue = RevenueFigures {
        total: repo::revenue_since(&mut conn, None).await?,
        current_month: repo::revenue_since(&mut conn, Some(month_start)).await?,
    };
    let popular_plans = repo::popular_plans(&mut conn, 5).await?;

    Ok(Json(MembershipStatsResponse {
        membership_counts: counts,
        revenue,
        popular_plans,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn plan_duration_is_bounded() {
        assert!(validate_plan_fields("Monthly", 30, Decimal::new(1000, 0)).is_ok());
        assert!(validate_plan_fields("Decade", MAX_PLAN_DURATION_DAYS, Decimal::ZERO).is_ok());

        let err = validate_plan_fields("Forever", i32::MAX, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Duration must be at most 3650 days");
        assert!(validate_plan_fields("Zero", 0, Decimal::ZERO).is_err());
    }
}
