use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AssignPlansRequest, AssignmentResponse, CreateMemberRequest, MemberDetail,
        MemberDetailResponse, MemberListQuery, MemberListResponse, MemberOverview,
        MemberSavedResponse, MetricResponse, MetricsRequest, PlanNamesResponse,
        UpdateMemberRequest,
    },
    repo::{self, NewMember},
    repo_types::{AddressPatch, MemberFilter, MemberPatch},
    services::{bmi, validate_metrics, ATTENDANCE_WINDOW_DAYS, DETAIL_METRICS},
};
use crate::{
    auth::{
        password::{check_strength, hash_password},
        repo_types::User,
        services::{is_valid_email, is_valid_phone, normalize_email},
        CurrentUser, Role,
    },
    common::{clean, parse_optional_date, today, ApiJson, ApiPath, ApiQuery, MessageResponse, Page},
    error::{AppError, AppResult},
    memberships::{
        dto::SubscriptionView,
        repo as membership_repo,
        services::{subscribe, SubscribeInput},
    },
    plans::{
        repo as plan_repo,
        services::{parse_ids, replace_plans_for_member, PlanKind},
    },
    state::AppState,
};

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route("/membership-plans", get(membership_plan_names))
        .route("/:id", get(get_member).put(update_member).delete(delete_member))
        .route("/:id/metrics", post(add_metrics))
        .route("/:id/workout-plans", put(assign_workout_plans))
        .route("/:id/diet-plans", put(assign_diet_plans))
}

fn visits_since() -> OffsetDateTime {
    OffsetDateTime::now_utc() - Duration::days(ATTENDANCE_WINDOW_DAYS)
}

async fn load_overview(conn: &mut PgConnection, id: Uuid) -> AppResult<MemberOverview> {
    let row = repo::find_overview(conn, id, visits_since())
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;
    Ok(MemberOverview::from_row(row, today()))
}

/// Blank means no phone; anything else must be a valid number.
fn checked_phone(raw: Option<String>) -> AppResult<Option<String>> {
    match clean(raw) {
        Some(phone) if is_valid_phone(&phone) => Ok(Some(phone)),
        Some(_) => Err(AppError::validation("Invalid phone number format")),
        None => Ok(None),
    }
}

#[instrument(skip(state, user))]
pub async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<MemberListQuery>,
) -> AppResult<Json<MemberListResponse>> {
    user.require(&[Role::Admin, Role::Trainer])?;

    let active = match clean(q.status).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("all") => None,
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        Some(_) => return Err(AppError::validation("Status must be one of: all, active, inactive")),
    };
    let filter = MemberFilter {
        search: clean(q.search),
        active,
        plan: clean(q.plan),
        only_active: user.is(Role::Trainer),
    };
    let page = Page::new(q.page, q.limit);

    let mut conn = state.db.acquire().await?;
    let (rows, total) = repo::list(&mut conn, &filter, visits_since(), page.limit, page.offset()).await?;
    let today = today();

    Ok(Json(MemberListResponse {
        members: rows.into_iter().map(|r| MemberOverview::from_row(r, today)).collect(),
        meta: page.meta(total),
    }))
}

#[instrument(skip(state, user))]
pub async fn get_member(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MemberDetailResponse>> {
    let mut conn = state.db.acquire().await?;
    let overview = load_overview(&mut conn, id).await?;
    if !(user.is_admin() || user.is_member_self(id)) {
        return Err(AppError::forbidden());
    }

    let today = today();
    let membership_history = membership_repo::history_for_member(&mut conn, id)
        .await?
        .into_iter()
        .map(|row| SubscriptionView::from_detail(row, today))
        .collect();
    let physical_metrics = repo::recent_metrics(&mut conn, id, DETAIL_METRICS).await?;
    let workout_plans = plan_repo::plans_for_member(&mut conn, PlanKind::Workout, id).await?;
    let diet_plans = plan_repo::plans_for_member(&mut conn, PlanKind::Diet, id).await?;

    Ok(Json(MemberDetailResponse {
        member: MemberDetail {
            overview,
            membership_history,
            physical_metrics,
            workout_plans,
            diet_plans,
        },
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_member(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateMemberRequest>,
) -> AppResult<(StatusCode, Json<MemberSavedResponse>)> {
    user.require(&[Role::Admin])?;

    let email = normalize_email(&clean(payload.email).ok_or_else(|| AppError::validation("email is required"))?);
    let first_name = clean(payload.first_name).ok_or_else(|| AppError::validation("firstName is required"))?;
    let last_name = clean(payload.last_name).ok_or_else(|| AppError::validation("lastName is required"))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("password is required"))?;

    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email format"));
    }
    check_strength(&password).map_err(AppError::validation)?;
    let dob = parse_optional_date(payload.date_of_birth.as_deref())
        .map_err(|_| AppError::validation("Invalid date format for dateOfBirth. Use YYYY-MM-DD"))?;
    let phone = checked_phone(payload.phone)?;
    let start_date = parse_optional_date(payload.start_date.as_deref())?;
    let address = AddressPatch {
        street_name: clean(payload.address),
        city_name: clean(payload.city),
        state_name: clean(payload.state),
        postal_code: clean(payload.zip_code),
    };
    if payload.height.is_some() || payload.weight.is_some() {
        validate_metrics(payload.height, payload.weight)?;
    }

    let mut tx = state.db.begin().await?;

    if User::email_taken(&mut tx, &email, None).await? {
        warn!(email = %email, "member email already registered");
        return Err(AppError::conflict("Email already exists"));
    }
    let hash = hash_password(&password)?;
    let user_id = User::create(&mut tx, &email, &hash, Role::Member).await?;
    let member_id = repo::insert_member(
        &mut tx,
        &NewMember {
            user_id,
            first_name: Some(first_name),
            last_name: Some(last_name),
            dob,
            gender: clean(payload.gender),
            emergency_contact: clean(payload.emergency_contact),
        },
    )
    .await?;

    if phone.is_some() {
        repo::replace_phone(&mut tx, member_id, phone.as_deref()).await?;
    }
    if !address.is_empty() {
        repo::upsert_address(&mut tx, member_id, &address).await?;
    }
    if payload.height.is_some() || payload.weight.is_some() {
        repo::insert_metric(
            &mut tx,
            member_id,
            payload.height,
            payload.weight,
            bmi(payload.height, payload.weight),
        )
        .await?;
    }

    if let Some(plan_name) = clean(payload.membership_plan) {
        let plan = membership_repo::find_plan_by_name(&mut tx, &plan_name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Membership plan not found: {plan_name}")))?;
        subscribe(
            &mut tx,
            SubscribeInput {
                member_id,
                plan: &plan,
                start_date: start_date.unwrap_or_else(today),
                discount: payload.discount.unwrap_or_default(),
                payment_mode: payload.payment_mode.as_deref(),
            },
        )
        .await?;
    }

    let member = load_overview(&mut tx, member_id).await?;
    tx.commit().await?;

    info!(member_id = %member_id, user_id = %user_id, "member created");
    Ok((
        StatusCode::CREATED,
        Json(MemberSavedResponse {
            message: "Member created successfully",
            member,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_member(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateMemberRequest>,
) -> AppResult<Json<MemberSavedResponse>> {
    let mut tx = state.db.begin().await?;
    let current = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;
    if !(user.is_admin() || user.is_member_self(id)) {
        return Err(AppError::forbidden());
    }
    if !user.is_admin() && (payload.is_active.is_some() || payload.email.is_some()) {
        warn!(user_id = %user.user_id, "member tried to change admin-only fields");
        return Err(AppError::Forbidden("Only admins can change email or status".into()));
    }

    let dob = parse_optional_date(payload.dob.as_deref())
        .map_err(|_| AppError::validation("Invalid date format for dateOfBirth. Use YYYY-MM-DD"))?;
    let patch = MemberPatch {
        first_name: clean(payload.first_name),
        last_name: clean(payload.last_name),
        gender: clean(payload.gender),
        emergency_contact: clean(payload.emergency_contact),
        dob,
        is_active: payload.is_active,
    };

    if let Some(raw) = payload.email {
        let email = normalize_email(&raw);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Invalid email format"));
        }
        if User::email_taken(&mut tx, &email, Some(current.user_id)).await? {
            return Err(AppError::conflict("Email already exists"));
        }
        User::set_email(&mut tx, current.user_id, &email).await?;
    }

    repo::update_profile(&mut tx, id, &patch).await?;

    if payload.phone.is_some() {
        let phone = checked_phone(payload.phone)?;
        repo::replace_phone(&mut tx, id, phone.as_deref()).await?;
    }

    let address = AddressPatch {
        street_name: clean(payload.address),
        city_name: clean(payload.city),
        state_name: clean(payload.state),
        postal_code: clean(payload.zip_code),
    };
    if !address.is_empty() {
        repo::upsert_address(&mut tx, id, &address).await?;
    }

    if payload.height.is_some() || payload.weight.is_some() {
        validate_metrics(payload.height, payload.weight)?;
        repo::insert_metric(&mut tx, id, payload.height, payload.weight, bmi(payload.height, payload.weight))
            .await?;
    }

    let member = load_overview(&mut tx, id).await?;
    tx.commit().await?;

    info!(member_id = %id, by = %user.user_id, "member updated");
    Ok(Json(MemberSavedResponse {
        message: "Member updated successfully",
        member,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_member(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    user.require(&[Role::Admin])?;

    let mut tx = state.db.begin().await?;
    let member = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;
    repo::delete_with_history(&mut tx, id).await?;
    User::delete(&mut tx, member.user_id).await?;
    tx.commit().await?;

    info!(member_id = %id, user_id = %member.user_id, "member deleted");
    Ok(Json(MessageResponse {
        message: "Member deleted successfully",
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn add_metrics(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<MetricsRequest>,
) -> AppResult<(StatusCode, Json<MetricResponse>)> {
    if !(user.is_admin() || user.is(Role::Trainer) || user.is_member_self(id)) {
        return Err(AppError::forbidden());
    }
    validate_metrics(payload.height, payload.weight)?;

    let mut tx = state.db.begin().await?;
    if !repo::exists(&mut tx, id).await? {
        return Err(AppError::not_found("Member not found"));
    }
    let metric = repo::insert_metric(&mut tx, id, payload.height, payload.weight, bmi(payload.height, payload.weight))
        .await?;
    tx.commit().await?;

    info!(member_id = %id, metric_id = %metric.id, "physical metrics recorded");
    Ok((
        StatusCode::CREATED,
        Json(MetricResponse {
            message: "Physical metrics added successfully",
            metric,
        }),
    ))
}

async fn assign_plans(
    state: AppState,
    user: CurrentUser,
    kind: PlanKind,
    member_id: Uuid,
    payload: AssignPlansRequest,
) -> AppResult<Json<AssignmentResponse>> {
    user.require(&[Role::Admin, Role::Trainer])?;
    let plan_ids = parse_ids(&payload.plan_ids, "plan")?;

    let mut tx = state.db.begin().await?;
    if !repo::exists(&mut tx, member_id).await? {
        return Err(AppError::not_found("Member not found"));
    }
    replace_plans_for_member(&mut tx, kind, member_id, &plan_ids).await?;
    let plans = plan_repo::plans_for_member(&mut tx, kind, member_id).await?;
    tx.commit().await?;

    Ok(Json(AssignmentResponse {
        message: match kind {
            PlanKind::Workout => "Workout plans assigned successfully",
            PlanKind::Diet => "Diet plans assigned successfully",
        },
        member_id,
        plans,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn assign_workout_plans(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignPlansRequest>,
) -> AppResult<Json<AssignmentResponse>> {
    assign_plans(state, user, PlanKind::Workout, id, payload).await
}

#[instrument(skip(state, user, payload))]
pub async fn assign_diet_plans(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignPlansRequest>,
) -> AppResult<Json<AssignmentResponse>> {
    assign_plans(state, user, PlanKind::Diet, id, payload).await
}

#[instrument(skip(state, _user))]
pub async fn membership_plan_names(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<PlanNamesResponse>> {
    let mut conn = state.db.acquire().await?;
    let plans = membership_repo::distinct_plan_names(&mut conn).await?;
    Ok(Json(PlanNamesResponse { plans }))
}
