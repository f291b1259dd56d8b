use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, routing::get, Extension, Json, Router};
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AvailableMembersResponse, DeletedResponse, IdRef, MemberSearchQuery, PlanEnvelope,
        PlanEquipmentView, PlanMemberView, PlanPage, PlanQuery, PlanRequest, PlanStatistics,
        PlanStatisticsResponse, PlanTypesResponse, PlanView,
    },
    repo,
    repo_types::{PlanFields, PlanFilter, PlanRow},
    services::{
        merge_types, parse_ids, replace_equipment_for_workout, replace_members_for_plan, PlanKind,
    },
};
use crate::{
    auth::{CurrentUser, Role},
    common::{clean, parse_id, ApiJson, ApiPath, ApiQuery, Page},
    error::{AppError, AppResult},
    members::repo as member_repo,
    memberships::services::full_name,
    state::AppState,
    trainers::repo as trainer_repo,
};

const STAFF: &[Role] = &[Role::Admin, Role::Trainer];

/// Same routes for both catalogs; the kind comes from an `Extension` layer.
pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/types", get(plan_types))
        .route("/statistics", get(plan_statistics))
        .route("/members", get(available_members))
        .route("/:id", get(get_plan).put(update_plan).delete(delete_plan))
}

fn ensure_owner(user: &CurrentUser, plan: &PlanRow) -> AppResult<()> {
    if user.is(Role::Trainer) && (user.trainer_id.is_none() || plan.created_by != user.trainer_id) {
        warn!(user_id = %user.user_id, plan_id = %plan.id, "trainer touching foreign plan");
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok(())
}

async fn load_plan(conn: &mut PgConnection, kind: PlanKind, id: Uuid) -> AppResult<PlanRow> {
    repo::find(conn, kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", kind.label())))
}

/// Attaches assigned members (and equipment for workouts) to a page of plans.
async fn decorate(conn: &mut PgConnection, kind: PlanKind, rows: Vec<PlanRow>) -> AppResult<Vec<PlanView>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let mut members: HashMap<Uuid, Vec<PlanMemberView>> = HashMap::new();
    for m in repo::members_of(&mut *conn, kind, &ids).await? {
        members.entry(m.plan_id).or_default().push(PlanMemberView {
            id: m.id,
            name: full_name(m.first_name.as_deref(), m.last_name.as_deref()),
            email: m.email,
        });
    }

    let mut equipment: HashMap<Uuid, Vec<PlanEquipmentView>> = HashMap::new();
    if kind == PlanKind::Workout {
        for e in repo::equipment_of(&mut *conn, &ids).await? {
            equipment.entry(e.plan_id).or_default().push(PlanEquipmentView {
                id: e.id,
                name: e.name,
                category: e.category,
            });
        }
    }

    Ok(rows
        .into_iter()
        .map(|plan| PlanView {
            assigned_members: members.remove(&plan.id).unwrap_or_default(),
            equipment: (kind == PlanKind::Workout)
                .then(|| equipment.remove(&plan.id).unwrap_or_default()),
            plan,
        })
        .collect())
}

async fn apply_links(
    conn: &mut PgConnection,
    kind: PlanKind,
    plan_id: Uuid,
    assigned_members: Option<Vec<IdRef>>,
    equipment_ids: Option<Vec<String>>,
) -> AppResult<()> {
    if let Some(refs) = assigned_members {
        let raw: Vec<String> = refs.into_iter().map(IdRef::into_raw).collect();
        let member_ids = parse_ids(&raw, "member")?;
        replace_members_for_plan(&mut *conn, kind, plan_id, &member_ids).await?;
    }
    if let Some(raw) = equipment_ids {
        if kind != PlanKind::Workout {
            return Err(AppError::validation("Only workout plans link equipment"));
        }
        let ids = parse_ids(&raw, "equipment")?;
        replace_equipment_for_workout(&mut *conn, plan_id, &ids).await?;
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn list_plans(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<PlanQuery>,
) -> AppResult<Json<PlanPage>> {
    user.require(STAFF)?;
    let page = Page::new(q.page, q.limit);

    let owner = if user.is(Role::Trainer) {
        match user.trainer_id {
            Some(id) => Some(id),
            None => {
                return Ok(Json(PlanPage {
                    kind,
                    plans: Vec::new(),
                    meta: page.meta(0),
                }))
            }
        }
    } else {
        clean(q.created_by).map(|s| parse_id(&s, "trainer")).transpose()?
    };

    let filter = PlanFilter {
        owner,
        search: clean(q.search),
        plan_type: clean(q.plan_type),
    };

    let mut conn = state.db.acquire().await?;
    let (rows, total) = repo::list(&mut conn, kind, &filter, page.limit, page.offset()).await?;
    let plans = decorate(&mut conn, kind, rows).await?;

    Ok(Json(PlanPage {
        kind,
        plans,
        meta: page.meta(total),
    }))
}

#[instrument(skip(state, user))]
pub async fn get_plan(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PlanEnvelope>> {
    user.require(STAFF)?;

    let mut conn = state.db.acquire().await?;
    let plan = load_plan(&mut conn, kind, id).await?;
    ensure_owner(&user, &plan)?;

    let plan = decorate(&mut conn, kind, vec![plan])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("decorated plan missing"))?;
    Ok(Json(PlanEnvelope {
        kind,
        message: None,
        plan,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_plan(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<PlanRequest>,
) -> AppResult<(StatusCode, Json<PlanEnvelope>)> {
    user.require(STAFF)?;

    let name = clean(payload.name)
        .ok_or_else(|| AppError::validation(format!("{} name is required", kind.label())))?;
    if payload.kcal_count.is_some_and(|k| k < 0) {
        return Err(AppError::validation("kcal_count cannot be negative"));
    }

    let mut tx = state.db.begin().await?;

    let created_by = if user.is(Role::Trainer) {
        user.own_trainer_id()?
    } else if kind == PlanKind::Workout {
        let raw = clean(payload.created_by)
            .ok_or_else(|| AppError::validation("created_by is required when an admin creates a plan"))?;
        let trainer_id = parse_id(&raw, "trainer")?;
        if !trainer_repo::exists(&mut tx, trainer_id).await? {
            return Err(AppError::not_found("Trainer not found"));
        }
        trainer_id
    } else {
        return Err(AppError::Forbidden("Only trainers can create diet plans".into()));
    };

    let fields = PlanFields {
        name,
        plan_type: clean(payload.plan_type),
        description: clean(payload.description),
        kcal_count: payload.kcal_count,
    };
    let id = repo::insert(&mut tx, kind, &fields, created_by).await?;
    apply_links(&mut tx, kind, id, payload.assigned_members, payload.equipment_ids).await?;

    let row = load_plan(&mut tx, kind, id).await?;
    let plan = decorate(&mut tx, kind, vec![row])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("decorated plan missing"))?;
    tx.commit().await?;

    info!(plan_id = %id, kind = kind.key(), trainer_id = %created_by, "plan created");
    Ok((
        StatusCode::CREATED,
        Json(PlanEnvelope {
            kind,
            message: Some(match kind {
                PlanKind::Workout => "Workout plan created successfully",
                PlanKind::Diet => "Diet plan created successfully",
            }),
            plan,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_plan(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<PlanRequest>,
) -> AppResult<Json<PlanEnvelope>> {
    user.require(STAFF)?;

    let mut tx = state.db.begin().await?;
    let current = load_plan(&mut tx, kind, id).await?;
    ensure_owner(&user, &current)?;

    let name = match payload.name {
        Some(n) => clean(Some(n))
            .ok_or_else(|| AppError::validation(format!("{} name cannot be empty", kind.label())))?,
        None => current.name.clone(),
    };
    if payload.kcal_count.is_some_and(|k| k < 0) {
        return Err(AppError::validation("kcal_count cannot be negative"));
    }
    let fields = PlanFields {
        name,
        plan_type: match payload.plan_type {
            Some(t) => clean(Some(t)),
            None => current.plan_type.clone(),
        },
        description: match payload.description {
            Some(d) => clean(Some(d)),
            None => current.description.clone(),
        },
        kcal_count: payload.kcal_count.or(current.kcal_count),
    };
    repo::update(&mut tx, kind, id, &fields).await?;
    apply_links(&mut tx, kind, id, payload.assigned_members, payload.equipment_ids).await?;

    let row = load_plan(&mut tx, kind, id).await?;
    let plan = decorate(&mut tx, kind, vec![row])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("decorated plan missing"))?;
    tx.commit().await?;

    info!(plan_id = %id, kind = kind.key(), "plan updated");
    Ok(Json(PlanEnvelope {
        kind,
        message: Some(match kind {
            PlanKind::Workout => "Workout plan updated successfully",
            PlanKind::Diet => "Diet plan updated successfully",
        }),
        plan,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_plan(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    user.require(STAFF)?;

    let mut tx = state.db.begin().await?;
    let plan = load_plan(&mut tx, kind, id).await?;
    ensure_owner(&user, &plan)?;
    repo::delete(&mut tx, kind, id).await?;
    tx.commit().await?;

    info!(plan_id = %id, kind = kind.key(), "plan deleted");
    Ok(Json(DeletedResponse {
        message: format!("{} \"{}\" deleted successfully", kind.label(), plan.name),
    }))
}

#[instrument(skip(state, user))]
pub async fn plan_types(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<PlanTypesResponse>> {
    user.require(STAFF)?;
    let mut conn = state.db.acquire().await?;
    let stored = repo::distinct_types(&mut conn, kind).await?;
    Ok(Json(PlanTypesResponse {
        types: merge_types(kind, stored),
    }))
}

#[instrument(skip(state, user))]
pub async fn plan_statistics(
    Extension(kind): Extension<PlanKind>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<PlanStatisticsResponse>> {
    user.require(STAFF)?;
    let owner = if user.is(Role::Trainer) {
        Some(user.own_trainer_id()?)
    } else {
        None
    };

    let mut conn = state.db.acquire().await?;
    let total_plans = repo::count(&mut conn, kind, owner).await?;
    let plans_by_type = repo::counts_by_type(&mut conn, kind, owner).await?;
    let total_assigned_members = repo::assigned_member_count(&mut conn, kind, owner).await?;
    let average_calories = match kind {
        PlanKind::Diet => Some((repo::average_kcal(&mut conn, owner).await? * 10.0).round() / 10.0),
        PlanKind::Workout => None,
    };
    let by_trainer = repo::counts_by_trainer(&mut conn, kind, owner).await?;

    let avg_members_per_plan = if total_plans > 0 {
        (total_assigned_members as f64 / total_plans as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    Ok(Json(PlanStatisticsResponse {
        statistics: PlanStatistics {
            total_plans,
            plans_by_type,
            total_assigned_members,
            avg_members_per_plan,
            average_calories,
            by_trainer,
        },
    }))
}

#[instrument(skip(state, user))]
pub async fn available_members(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<MemberSearchQuery>,
) -> AppResult<Json<AvailableMembersResponse>> {
    user.require(STAFF)?;
    let limit = Page::new(None, q.limit).limit;

    let mut conn = state.db.acquire().await?;
    let members = member_repo::search_active(&mut conn, clean(q.search).as_deref(), limit).await?;
    Ok(Json(AvailableMembersResponse {
        total: members.len(),
        members,
    }))
}
