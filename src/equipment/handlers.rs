use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        CategoriesResponse, CategoryView, CreateEquipmentRequest, EquipmentListResponse, EquipmentQuery,
        EquipmentResponse, EquipmentSavedResponse, EquipmentStatsResponse, EquipmentView,
        MaintenanceRequest, UpdateEquipmentRequest,
    },
    repo::{self, EquipmentFields, EquipmentFilter},
    services::{count_statuses, maintenance_dates, maintenance_status, EquipmentStatus},
};
use crate::{
    auth::{CurrentUser, Role},
    common::{clean, parse_optional_date, today, ApiJson, ApiPath, ApiQuery, Page},
    error::{AppError, AppResult},
    plans::dto::DeletedResponse,
    state::AppState,
};

pub fn equipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_equipment).post(create_equipment))
        .route("/categories", get(equipment_categories))
        .route("/stats", get(equipment_stats))
        .route(
            "/:id",
            get(get_equipment).put(update_equipment).delete(delete_equipment),
        )
        .route("/:id/maintenance", post(record_maintenance))
}

fn date_field(raw: Option<&str>, field: &str) -> AppResult<Option<time::Date>> {
    parse_optional_date(raw).map_err(|_| AppError::validation(format!("Invalid {field} format. Use YYYY-MM-DD")))
}

fn checked_quantity(quantity: i32) -> AppResult<i32> {
    if quantity < 0 {
        return Err(AppError::validation("Quantity must be non-negative"));
    }
    Ok(quantity)
}

#[instrument(skip(state, _user))]
pub async fn list_equipment(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<EquipmentQuery>,
) -> AppResult<Json<EquipmentListResponse>> {
    let status = clean(q.status).map(|s| EquipmentStatus::parse(&s)).transpose()?;
    let filter = EquipmentFilter {
        search: clean(q.search),
        category: clean(q.category),
    };
    let page = Page::new(q.page, q.limit);
    let (today, window) = (today(), state.config.maintenance_window_days);

    let mut conn = state.db.acquire().await?;
    let matching: Vec<EquipmentView> = repo::list(&mut conn, &filter)
        .await?
        .into_iter()
        .map(|row| EquipmentView::from_row(row, today, window))
        .filter(|view| status.map_or(true, |s| view.status == s))
        .collect();

    let total = matching.len() as i64;
    Ok(Json(EquipmentListResponse {
        equipment: page.slice(matching),
        pagination: page.meta(total),
    }))
}

#[instrument(skip(state, _user))]
pub async fn get_equipment(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<EquipmentResponse>> {
    let mut conn = state.db.acquire().await?;
    let row = repo::find(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Equipment not found"))?;
    Ok(Json(EquipmentResponse {
        equipment: EquipmentView::from_row(row, today(), state.config.maintenance_window_days),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateEquipmentRequest>,
) -> AppResult<(StatusCode, Json<EquipmentSavedResponse>)> {
    user.require(&[Role::Admin, Role::Trainer])?;

    let fields = EquipmentFields {
        name: clean(payload.name).ok_or_else(|| AppError::validation("Equipment name is required"))?,
        category: Some(clean(payload.category).ok_or_else(|| AppError::validation("Category is required"))?),
        quantity: checked_quantity(payload.quantity.unwrap_or(1))?,
        purchase_date: date_field(payload.purchase_date.as_deref(), "purchase_date")?,
        last_maintenance_date: date_field(payload.last_maintenance_date.as_deref(), "last_maintenance_date")?,
        next_maintenance_date: date_field(payload.next_maintenance_date.as_deref(), "next_maintenance_date")?,
    };

    let mut tx = state.db.begin().await?;
    let row = repo::insert(&mut tx, &fields).await?;
    tx.commit().await?;

    info!(equipment_id = %row.id, name = %row.name, by = %user.user_id, "equipment created");
    Ok((
        StatusCode::CREATED,
        Json(EquipmentSavedResponse {
            message: "Equipment created successfully",
            equipment: EquipmentView::from_row(row, today(), state.config.maintenance_window_days),
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateEquipmentRequest>,
) -> AppResult<Json<EquipmentSavedResponse>> {
    user.require(&[Role::Admin, Role::Trainer])?;

    let mut tx = state.db.begin().await?;
    let current = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Equipment not found"))?;
    let mut fields = EquipmentFields::from(current);

    if let Some(name) = payload.name {
        fields.name = clean(Some(name)).ok_or_else(|| AppError::validation("Equipment name cannot be empty"))?;
    }
    if let Some(category) = payload.category {
        fields.category = clean(category);
    }
    if let Some(quantity) = payload.quantity {
        fields.quantity = checked_quantity(quantity)?;
    }
    if let Some(raw) = payload.purchase_date {
        fields.purchase_date = date_field(raw.as_deref(), "purchase_date")?;
    }
    if let Some(raw) = payload.last_maintenance_date {
        fields.last_maintenance_date = date_field(raw.as_deref(), "last_maintenance_date")?;
    }
    if let Some(raw) = payload.next_maintenance_date {
        fields.next_maintenance_date = date_field(raw.as_deref(), "next_maintenance_date")?;
    }

    let row = repo::update(&mut tx, id, &fields).await?;
    tx.commit().await?;

    info!(equipment_id = %id, by = %user.user_id, "equipment updated");
    Ok(Json(EquipmentSavedResponse {
        message: "Equipment updated successfully",
        equipment: EquipmentView::from_row(row, today(), state.config.maintenance_window_days),
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    user.require(&[Role::Admin])?;

    let mut tx = state.db.begin().await?;
    let row = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Equipment not found"))?;
    repo::delete(&mut tx, id).await?;
    tx.commit().await?;

    info!(equipment_id = %id, name = %row.name, "equipment deleted");
    Ok(Json(DeletedResponse {
        message: format!("Equipment \"{}\" deleted successfully", row.name),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn record_maintenance(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    payload: Option<ApiJson<MaintenanceRequest>>,
) -> AppResult<Json<EquipmentSavedResponse>> {
    user.require(&[Role::Admin, Role::Trainer])?;
    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();

    let today = today();
    let (last, next) = maintenance_dates(
        date_field(payload.maintenance_date.as_deref(), "maintenance_date")?,
        date_field(payload.next_maintenance_date.as_deref(), "next_maintenance_date")?,
        payload.next_offset_days,
        today,
    )?;

    let mut tx = state.db.begin().await?;
    if repo::find(&mut tx, id).await?.is_none() {
        return Err(AppError::not_found("Equipment not found"));
    }
    let row = repo::record_maintenance(&mut tx, id, last, next).await?;
    tx.commit().await?;

    let window = state.config.maintenance_window_days;
    info!(
        equipment_id = %id,
        next = %next,
        status = maintenance_status(Some(next), today, window).as_str(),
        "maintenance recorded"
    );
    Ok(Json(EquipmentSavedResponse {
        message: "Maintenance recorded successfully",
        equipment: EquipmentView::from_row(row, today, window),
    }))
}

#[instrument(skip(state, _user))]
pub async fn equipment_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<CategoriesResponse>> {
    let mut conn = state.db.acquire().await?;
    let categories = repo::category_counts(&mut conn)
        .await?
        .into_iter()
        .map(|c| CategoryView {
            name: c.name,
            count: c.count,
        })
        .collect();
    Ok(Json(CategoriesResponse { categories }))
}

#[instrument(skip(state, _user))]
pub async fn equipment_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<EquipmentStatsResponse>> {
    let mut conn = state.db.acquire().await?;
    let next_dates = repo::all_next_dates(&mut conn).await?;
    let window = state.config.maintenance_window_days;
    Ok(Json(EquipmentStatsResponse {
        stats: count_statuses(&next_dates, today(), window),
        maintenance_window_days: window,
    }))
}
