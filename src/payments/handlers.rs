use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreatePaymentRequest, CreatedPaymentResponse, PaymentListResponse,
        PaymentModesResponse, PaymentQuery, PaymentResponse, PaymentStatsResponse, PaymentView,
        RevenueSummary, StatsQuery, TopMember,
    },
    repo::{self, NewPayment, PaymentFilter},
    services::{end_of_day_exclusive, merge_modes, start_of_day, Period},
};
use crate::{
    auth::{CurrentUser, Role},
    common::{clean, parse_date, parse_id, today, ApiJson, ApiPath, ApiQuery, DateRange, Page},
    error::{AppError, AppResult},
    members::repo as member_repo,
    memberships::services::full_name,
    state::AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments).post(create_payment))
        .route("/stats", get(payment_stats))
        .route("/modes", get(payment_modes))
        .route("/:id", get(get_payment))
}

#[instrument(skip(state, user))]
pub async fn list_payments(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<PaymentQuery>,
) -> AppResult<Json<PaymentListResponse>> {
    user.require(&[Role::Admin, Role::Member])?;

    let requested = clean(q.member_id).map(|s| parse_id(&s, "member")).transpose()?;
    let member_id = if user.is(Role::Member) {
        let own = user.own_member_id()?;
        if requested.is_some_and(|id| id != own) {
            return Err(AppError::forbidden());
        }
        Some(own)
    } else {
        requested
    };

    let from = clean(q.start_date)
        .map(|s| parse_date(&s))
        .transpose()
        .map_err(|_| AppError::validation("Invalid start_date format. Use YYYY-MM-DD"))?;
    let until = clean(q.end_date)
        .map(|s| parse_date(&s))
        .transpose()
        .map_err(|_| AppError::validation("Invalid end_date format. Use YYYY-MM-DD"))?;

    let filter = PaymentFilter {
        member_id,
        mode: clean(q.mode),
        from: from.map(start_of_day),
        until: until.map(end_of_day_exclusive),
    };
    let page = Page::new(q.page, q.limit);

    let mut conn = state.db.acquire().await?;
    let (rows, total) = repo::list(&mut conn, &filter, page.limit, page.offset()).await?;

    Ok(Json(PaymentListResponse {
        payments: rows.into_iter().map(|r| PaymentView::from_row(r, false)).collect(),
        meta: page.meta(total),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<CreatedPaymentResponse>)> {
    user.require(&[Role::Admin])?;

    let member_id = clean(payload.member_id).ok_or_else(|| AppError::validation("member_id is required"))?;
    let member_id = parse_id(&member_id, "member")?;
    let amount = payload.amount.ok_or_else(|| AppError::validation("amount is required"))?;
    let mode = clean(payload.mode).ok_or_else(|| AppError::validation("mode is required"))?;
    if amount <= rust_decimal::Decimal::ZERO {
        return Err(AppError::validation("Amount must be positive"));
    }
    let membership_id = clean(payload.membership_id)
        .map(|s| parse_id(&s, "membership"))
        .transpose()?;
    let date = clean(payload.date)
        .map(|s| parse_date(&s))
        .transpose()?
        .map(start_of_day);

    let mut tx = state.db.begin().await?;
    if !member_repo::exists(&mut tx, member_id).await? {
        return Err(AppError::not_found("Member not found"));
    }
    if let Some(membership_id) = membership_id {
        let owner = repo::membership_owner(&mut tx, membership_id)
            .await?
            .ok_or_else(|| AppError::not_found("Membership not found"))?;
        if owner != member_id {
            warn!(%membership_id, %member_id, "payment membership mismatch");
            return Err(AppError::validation("Membership does not belong to this member"));
        }
    }

    let id = repo::insert_payment(
        &mut tx,
        &NewPayment {
            member_id,
            membership_id,
            amount,
            date,
            mode: Some(mode),
        },
    )
    .await?;
    let row = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("payment {id} vanished after insert"))?;
    tx.commit().await?;

    info!(payment_id = %id, %member_id, amount = %row.amount, "payment recorded");
    Ok((
        StatusCode::CREATED,
        Json(CreatedPaymentResponse {
            message: "Payment recorded successfully",
            payment: PaymentView::from_row(row, false),
        }),
    ))
}

#[instrument(skip(state, user))]
pub async fn get_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PaymentResponse>> {
    user.require(&[Role::Admin, Role::Member])?;

    let mut conn = state.db.acquire().await?;
    let row = repo::find(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;

    if user.is(Role::Member) && (user.member_id.is_none() || row.member_id != user.member_id) {
        return Err(AppError::Forbidden("Access denied".into()));
    }

    Ok(Json(PaymentResponse {
        payment: PaymentView::from_row(row, true),
    }))
}

#[instrument(skip(state, user))]
pub async fn payment_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<StatsQuery>,
) -> AppResult<Json<PaymentStatsResponse>> {
    user.require(&[Role::Admin])?;

    let period = Period::parse(q.period.as_deref())?;
    let today = today();
    let start_date = period.start_from(today);
    let since = start_of_day(start_date);

    let mut conn = state.db.acquire().await?;
    let totals = repo::period_totals(&mut conn, since).await?;
    let all_time_total = repo::all_time_total(&mut conn).await?;
    let payment_modes = repo::mode_totals(&mut conn, since).await?;
    let daily_revenue = repo::daily_revenue(&mut conn, since).await?;
    let monthly_revenue = if period == Period::Year {
        repo::monthly_revenue(&mut conn, since).await?
    } else {
        Vec::new()
    };
    let top_members = repo::top_payers(&mut conn, since, 10)
        .await?
        .into_iter()
        .map(|p| TopMember {
            member_name: full_name(p.first_name.as_deref(), p.last_name.as_deref()),
            total_paid: p.total_paid,
            payment_count: p.payment_count,
        })
        .collect();

    Ok(Json(PaymentStatsResponse {
        period: period.as_str(),
        date_range: DateRange {
            start_date,
            end_date: today,
        },
        revenue: RevenueSummary {
            period_total: totals.period_total,
            all_time_total,
            average_payment: totals.average_payment.round_dp(2),
        },
        payment_count: totals.payment_count,
        payment_modes,
        daily_revenue,
        monthly_revenue,
        top_members,
    }))
}

#[instrument(skip(state, _user))]
pub async fn payment_modes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<PaymentModesResponse>> {
    let mut conn = state.db.acquire().await?;
    let stored = repo::distinct_modes(&mut conn).await?;
    Ok(Json(PaymentModesResponse {
        payment_modes: merge_modes(stored),
    }))
}
