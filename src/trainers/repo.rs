use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    dto::TrainerSummary,
    repo_types::{TrainerFilter, TrainerPatch, TrainerRow, TrainerTotals},
};

pub use super::repo_types::NewTrainer;

const TRAINER_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.first_name, t.last_name, t.gender, t.specialization,
           t.experience_years, t.bio, t.availability, t.salary, t.rating,
           t.total_clients, t.is_active, t.created_at,
           u.email,
           (SELECT phone FROM trainer_phones WHERE trainer_id = t.id LIMIT 1) AS phone
    FROM trainers t
    LEFT JOIN users u ON u.id = t.user_id
"#;

pub async fn insert_trainer(conn: &mut PgConnection, new: &NewTrainer) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO trainers (user_id, first_name, last_name, gender, specialization,
                              experience_years, bio, availability, salary, rating, total_clients)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(new.user_id)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.gender)
    .bind(&new.specialization)
    .bind(new.experience_years)
    .bind(&new.bio)
    .bind(&new.availability)
    .bind(new.salary)
    .bind(new.rating)
    .bind(new.total_clients)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn replace_phone(conn: &mut PgConnection, trainer_id: Uuid, phone: Option<&str>) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM trainer_phones WHERE trainer_id = $1")
        .bind(trainer_id)
        .execute(&mut *conn)
        .await?;
    if let Some(phone) = phone {
        sqlx::query("INSERT INTO trainer_phones (trainer_id, phone) VALUES ($1, $2)")
            .bind(trainer_id)
            .bind(phone)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn summary_by_user(conn: &mut PgConnection, user_id: Uuid) -> anyhow::Result<Option<TrainerSummary>> {
    let row = sqlx::query_as::<_, TrainerSummary>(
        r#"
        SELECT t.id, t.first_name, t.last_name,
               (SELECT phone FROM trainer_phones WHERE trainer_id = t.id LIMIT 1) AS phone,
               t.specialization, t.experience_years, t.bio, t.availability, t.is_active
        FROM trainers t
        WHERE t.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn exists(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM trainers WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(found)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<TrainerRow>> {
    let row = sqlx::query_as::<_, TrainerRow>(&format!("{TRAINER_SELECT} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Active trainers matching every supplied filter.
pub async fn list_active(conn: &mut PgConnection, filter: &TrainerFilter) -> anyhow::Result<Vec<TrainerRow>> {
    let like = |v: &Option<String>| v.as_ref().map(|s| format!("%{s}%"));
    let rows = sqlx::query_as::<_, TrainerRow>(&format!(
        r#"
        {TRAINER_SELECT}
        WHERE t.is_active
          AND ($1::text IS NULL
               OR t.first_name ILIKE $1 OR t.last_name ILIKE $1 OR u.email ILIKE $1
               OR concat_ws(' ', t.first_name, t.last_name) ILIKE $1)
          AND ($2::text IS NULL OR t.specialization ILIKE $2)
          AND ($3::text IS NULL OR t.availability ILIKE $3)
        ORDER BY t.first_name, t.last_name
        "#
    ))
    .bind(like(&filter.search))
    .bind(like(&filter.specialty))
    .bind(like(&filter.availability))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, patch: &TrainerPatch) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE trainers
        SET first_name       = COALESCE($2, first_name),
            last_name        = COALESCE($3, last_name),
            gender           = COALESCE($4, gender),
            specialization   = COALESCE($5, specialization),
            experience_years = COALESCE($6, experience_years),
            bio              = COALESCE($7, bio),
            availability     = COALESCE($8, availability),
            salary           = COALESCE($9, salary),
            rating           = COALESCE($10, rating),
            total_clients    = COALESCE($11, total_clients),
            is_active        = COALESCE($12, is_active),
            updated_at       = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .bind(&patch.gender)
    .bind(&patch.specialization)
    .bind(patch.experience_years)
    .bind(&patch.bio)
    .bind(&patch.availability)
    .bind(patch.salary)
    .bind(patch.rating)
    .bind(patch.total_clients)
    .bind(patch.is_active)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_salary(conn: &mut PgConnection, id: Uuid, salary: i64) -> anyhow::Result<()> {
    sqlx::query("UPDATE trainers SET salary = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(salary)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn totals(conn: &mut PgConnection) -> anyhow::Result<TrainerTotals> {
    let row = sqlx::query_as::<_, TrainerTotals>(
        r#"
        SELECT COUNT(*) AS active_trainers,
               COALESCE(AVG(rating), 0)::float8 AS avg_rating,
               COALESCE(SUM(total_clients), 0)::bigint AS total_clients
        FROM trainers
        WHERE is_active
        "#,
    )
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Attendance rows supervised by any trainer since `since`.
pub async fn sessions_since(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE trainer_id IS NOT NULL AND check_in >= $1",
    )
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn specializations(conn: &mut PgConnection) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT specialization FROM trainers WHERE specialization IS NOT NULL AND specialization <> ''",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
