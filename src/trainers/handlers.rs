use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreateTrainerRequest, SalaryRequest, Specialties, SpecialtiesResponse, TrainerListQuery,
        TrainerListResponse, TrainerResponse, TrainerSavedResponse, TrainerStats, TrainerStatsResponse,
        TrainerView, UpdateTrainerRequest,
    },
    repo::{self, NewTrainer},
    repo_types::{TrainerFilter, TrainerPatch},
    services::{join_specialties, merge_specialties, salary_from, validate_rating},
};
use crate::{
    auth::{
        password::{check_strength, hash_password},
        repo_types::User,
        services::{is_valid_email, is_valid_phone, normalize_email},
        CurrentUser, Role,
    },
    common::{clean, today, ApiJson, ApiPath, ApiQuery},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn trainer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trainers).post(create_trainer))
        .route("/stats", get(trainer_stats))
        .route("/specialties", get(list_specialties))
        .route("/:id", get(get_trainer).put(update_trainer))
        .route("/:id/salary", put(update_salary))
}

fn can_see_salary(user: &CurrentUser, trainer_id: Uuid) -> bool {
    user.is_admin() || user.is_trainer_self(trainer_id)
}

async fn load_view(conn: &mut PgConnection, user: &CurrentUser, id: Uuid) -> AppResult<TrainerView> {
    let row = repo::find(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Trainer not found"))?;
    Ok(TrainerView::from_row(row, can_see_salary(user, id)))
}

fn checked_phone(raw: Option<String>) -> AppResult<Option<String>> {
    match clean(raw) {
        Some(phone) if is_valid_phone(&phone) => Ok(Some(phone)),
        Some(_) => Err(AppError::validation("Invalid phone number format")),
        None => Ok(None),
    }
}

fn checked_counts(experience: Option<i32>, total_clients: Option<i32>, rating: Option<f64>) -> AppResult<()> {
    if experience.is_some_and(|e| e < 0) {
        return Err(AppError::validation("Experience must be non-negative"));
    }
    if total_clients.is_some_and(|c| c < 0) {
        return Err(AppError::validation("Total clients must be non-negative"));
    }
    if let Some(rating) = rating {
        validate_rating(rating)?;
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn list_trainers(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<TrainerListQuery>,
) -> AppResult<Json<TrainerListResponse>> {
    let filter = TrainerFilter {
        search: clean(q.search),
        specialty: clean(q.specialty),
        availability: clean(q.availability),
    };
    let mut conn = state.db.acquire().await?;
    let trainers: Vec<TrainerView> = repo::list_active(&mut conn, &filter)
        .await?
        .into_iter()
        .map(|row| {
            let show = can_see_salary(&user, row.id);
            TrainerView::from_row(row, show)
        })
        .collect();

    Ok(Json(TrainerListResponse {
        total: trainers.len(),
        trainers,
    }))
}

#[instrument(skip(state, user))]
pub async fn get_trainer(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<TrainerResponse>> {
    let mut conn = state.db.acquire().await?;
    let trainer = load_view(&mut conn, &user, id).await?;
    Ok(Json(TrainerResponse { trainer }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_trainer(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateTrainerRequest>,
) -> AppResult<(StatusCode, Json<TrainerSavedResponse>)> {
    user.require(&[Role::Admin])?;

    let first_name = clean(payload.first_name).ok_or_else(|| AppError::validation("firstName is required"))?;
    let last_name = clean(payload.last_name).ok_or_else(|| AppError::validation("lastName is required"))?;
    let phone = checked_phone(payload.phone)?;
    checked_counts(payload.experience, payload.total_clients, payload.rating)?;
    let salary = payload.salary.unwrap_or(0);
    if salary < 0 {
        return Err(AppError::validation("Salary must be non-negative"));
    }

    // A login is only created when an email is supplied.
    let login = match clean(payload.email) {
        Some(raw) => {
            let email = normalize_email(&raw);
            if !is_valid_email(&email) {
                return Err(AppError::validation("Invalid email format"));
            }
            let password = payload
                .password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AppError::validation("password is required when email is given"))?;
            check_strength(&password).map_err(AppError::validation)?;
            Some((email, password))
        }
        None => None,
    };

    let mut tx = state.db.begin().await?;

    let user_id = match login {
        Some((email, password)) => {
            if User::email_taken(&mut tx, &email, None).await? {
                warn!(email = %email, "trainer email already registered");
                return Err(AppError::conflict("Email already exists"));
            }
            let hash = hash_password(&password)?;
            Some(User::create(&mut tx, &email, &hash, Role::Trainer).await?)
        }
        None => None,
    };

    let specialties = payload.specialties.map(Specialties::into_list).unwrap_or_default();
    let trainer_id = repo::insert_trainer(
        &mut tx,
        &NewTrainer {
            user_id,
            first_name: Some(first_name),
            last_name: Some(last_name),
            gender: clean(payload.gender),
            specialization: join_specialties(&specialties),
            experience_years: payload.experience.unwrap_or(0),
            bio: clean(payload.bio),
            availability: clean(payload.availability),
            salary,
            rating: payload.rating.unwrap_or(0.0),
            total_clients: payload.total_clients.unwrap_or(0),
        },
    )
    .await?;
    if phone.is_some() {
        repo::replace_phone(&mut tx, trainer_id, phone.as_deref()).await?;
    }

    let trainer = load_view(&mut tx, &user, trainer_id).await?;
    tx.commit().await?;

    info!(trainer_id = %trainer_id, has_login = user_id.is_some(), "trainer created");
    Ok((
        StatusCode::CREATED,
        Json(TrainerSavedResponse {
            message: "Trainer created successfully",
            trainer,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_trainer(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTrainerRequest>,
) -> AppResult<Json<TrainerSavedResponse>> {
    if !(user.is_admin() || user.is_trainer_self(id)) {
        return Err(AppError::forbidden());
    }

    let patch = TrainerPatch {
        first_name: clean(payload.first_name),
        last_name: clean(payload.last_name),
        gender: clean(payload.gender),
        specialization: payload
            .specialization
            .map(|s| join_specialties(&s.into_list()).unwrap_or_default()),
        experience_years: payload.experience_years,
        bio: payload.bio,
        availability: payload.availability,
        salary: payload.salary,
        rating: payload.rating,
        total_clients: payload.total_clients,
        is_active: payload.is_active,
    };
    if !user.is_admin() && patch.touches_admin_fields() {
        warn!(user_id = %user.user_id, "trainer tried to change admin-only fields");
        return Err(AppError::Forbidden(
            "Only admins can change salary, rating, clients or status".into(),
        ));
    }
    checked_counts(patch.experience_years, patch.total_clients, patch.rating)?;
    if patch.salary.is_some_and(|s| s < 0) {
        return Err(AppError::validation("Salary must be non-negative"));
    }

    let mut tx = state.db.begin().await?;
    if !repo::exists(&mut tx, id).await? {
        return Err(AppError::not_found("Trainer not found"));
    }
    repo::update(&mut tx, id, &patch).await?;
    if payload.phone.is_some() {
        let phone = checked_phone(payload.phone)?;
        repo::replace_phone(&mut tx, id, phone.as_deref()).await?;
    }
    let trainer = load_view(&mut tx, &user, id).await?;
    tx.commit().await?;

    info!(trainer_id = %id, by = %user.user_id, "trainer updated");
    Ok(Json(TrainerSavedResponse {
        message: "Trainer updated successfully",
        trainer,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn update_salary(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SalaryRequest>,
) -> AppResult<Json<TrainerSavedResponse>> {
    user.require(&[Role::Admin])?;
    let salary = salary_from(payload.salary.ok_or_else(|| AppError::validation("salary is required"))?)?;

    let mut tx = state.db.begin().await?;
    if !repo::exists(&mut tx, id).await? {
        return Err(AppError::not_found("Trainer not found"));
    }
    repo::set_salary(&mut tx, id, salary).await?;
    let trainer = load_view(&mut tx, &user, id).await?;
    tx.commit().await?;

    info!(trainer_id = %id, salary, "trainer salary updated");
    Ok(Json(TrainerSavedResponse {
        message: "Salary updated successfully",
        trainer,
    }))
}

#[instrument(skip(state, user))]
pub async fn trainer_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<TrainerStatsResponse>> {
    user.require(&[Role::Admin])?;

    let mut conn = state.db.acquire().await?;
    let totals = repo::totals(&mut conn).await?;
    let start_of_today = today().midnight().assume_utc();
    let sessions_today = repo::sessions_since(&mut conn, start_of_today).await?;

    Ok(Json(TrainerStatsResponse {
        stats: TrainerStats {
            active_trainers: totals.active_trainers,
            avg_rating: (totals.avg_rating * 10.0).round() / 10.0,
            sessions_today,
            total_clients: totals.total_clients,
        },
    }))
}

#[instrument(skip(state, _user))]
pub async fn list_specialties(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<SpecialtiesResponse>> {
    let mut conn = state.db.acquire().await?;
    let stored = repo::specializations(&mut conn).await?;
    Ok(Json(SpecialtiesResponse {
        specialties: merge_specialties(stored),
    }))
}
