use sqlx::PgConnection;
use uuid::Uuid;

use super::{
    repo_types::{
        AssignedPlan, LinkedEquipment, LinkedMember, PlanFields, PlanFilter, PlanRow,
        TrainerPlanCount, TypeCount,
    },
    services::PlanKind,
};

fn kcal_column(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Workout => "NULL::integer",
        PlanKind::Diet => "COALESCE(p.kcal_count, 0)",
    }
}

fn plan_select(kind: PlanKind) -> String {
    format!(
        r#"
        SELECT p.id, p.name, p.type AS plan_type, p.description, {kcal} AS kcal_count,
               p.created_by,
               NULLIF(concat_ws(' ', t.first_name, t.last_name), '') AS trainer_name,
               p.created_at
        FROM {table} p
        LEFT JOIN trainers t ON t.id = p.created_by
        "#,
        kcal = kcal_column(kind),
        table = kind.table(),
    )
}

const LIST_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR p.created_by = $1)
      AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2 OR p.type ILIKE $2)
      AND ($3::text IS NULL OR p.type ILIKE $3)
"#;

fn like(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| format!("%{v}%"))
}

pub async fn list(
    conn: &mut PgConnection,
    kind: PlanKind,
    filter: &PlanFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<PlanRow>, i64)> {
    let search = like(&filter.search);
    let plan_type = like(&filter.plan_type);

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} p {LIST_WHERE}",
        kind.table()
    ))
    .bind(filter.owner)
    .bind(&search)
    .bind(&plan_type)
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, PlanRow>(&format!(
        "{} {LIST_WHERE} ORDER BY p.created_at DESC LIMIT $4 OFFSET $5",
        plan_select(kind)
    ))
    .bind(filter.owner)
    .bind(&search)
    .bind(&plan_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok((rows, total))
}

pub async fn find(conn: &mut PgConnection, kind: PlanKind, id: Uuid) -> anyhow::Result<Option<PlanRow>> {
    let row = sqlx::query_as::<_, PlanRow>(&format!("{} WHERE p.id = $1", plan_select(kind)))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn insert(
    conn: &mut PgConnection,
    kind: PlanKind,
    fields: &PlanFields,
    created_by: Uuid,
) -> anyhow::Result<Uuid> {
    let sql = match kind {
        PlanKind::Workout => {
            "INSERT INTO workout_plans (name, type, description, created_by) VALUES ($1, $2, $3, $4) RETURNING id"
        }
        PlanKind::Diet => {
            "INSERT INTO diet_plans (name, type, description, created_by, kcal_count) VALUES ($1, $2, $3, $4, $5) RETURNING id"
        }
    };
    let mut query = sqlx::query_scalar::<_, Uuid>(sql)
        .bind(&fields.name)
        .bind(&fields.plan_type)
        .bind(&fields.description)
        .bind(created_by);
    if kind == PlanKind::Diet {
        query = query.bind(fields.kcal_count.unwrap_or(0));
    }
    let id = query.fetch_one(conn).await?;
    Ok(id)
}

pub async fn update(
    conn: &mut PgConnection,
    kind: PlanKind,
    id: Uuid,
    fields: &PlanFields,
) -> anyhow::Result<()> {
    let sql = match kind {
        PlanKind::Workout => "UPDATE workout_plans SET name = $2, type = $3, description = $4 WHERE id = $1",
        PlanKind::Diet => {
            "UPDATE diet_plans SET name = $2, type = $3, description = $4, kcal_count = $5 WHERE id = $1"
        }
    };
    let mut query = sqlx::query(sql)
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.plan_type)
        .bind(&fields.description);
    if kind == PlanKind::Diet {
        query = query.bind(fields.kcal_count);
    }
    query.execute(conn).await?;
    Ok(())
}

pub async fn delete(conn: &mut PgConnection, kind: PlanKind, id: Uuid) -> anyhow::Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn existing_ids(conn: &mut PgConnection, kind: PlanKind, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
    let found = sqlx::query_scalar::<_, Uuid>(&format!(
        "SELECT id FROM {} WHERE id = ANY($1)",
        kind.table()
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(found)
}

pub async fn clear_member_links(conn: &mut PgConnection, kind: PlanKind, member_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE member_id = $1", kind.link_table()))
        .bind(member_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn link_plans_to_member(
    conn: &mut PgConnection,
    kind: PlanKind,
    member_id: Uuid,
    plan_ids: &[Uuid],
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {table} (member_id, {col}) SELECT $1::uuid, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
        table = kind.link_table(),
        col = kind.link_column(),
    ))
    .bind(member_id)
    .bind(plan_ids)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn clear_plan_links(conn: &mut PgConnection, kind: PlanKind, plan_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        kind.link_table(),
        kind.link_column()
    ))
    .bind(plan_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn link_members_to_plan(
    conn: &mut PgConnection,
    kind: PlanKind,
    plan_id: Uuid,
    member_ids: &[Uuid],
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {table} (member_id, {col}) SELECT unnest($2::uuid[]), $1::uuid ON CONFLICT DO NOTHING",
        table = kind.link_table(),
        col = kind.link_column(),
    ))
    .bind(plan_id)
    .bind(member_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Members of every plan in `plan_ids`, for decorating a page of plans.
pub async fn members_of(
    conn: &mut PgConnection,
    kind: PlanKind,
    plan_ids: &[Uuid],
) -> anyhow::Result<Vec<LinkedMember>> {
    let rows = sqlx::query_as::<_, LinkedMember>(&format!(
        r#"
        SELECT l.{col} AS plan_id, m.id, m.first_name, m.last_name, u.email
        FROM {table} l
        JOIN members m ON m.id = l.member_id
        LEFT JOIN users u ON u.id = m.user_id
        WHERE l.{col} = ANY($1)
        ORDER BY m.first_name, m.last_name
        "#,
        table = kind.link_table(),
        col = kind.link_column(),
    ))
    .bind(plan_ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn plans_for_member(
    conn: &mut PgConnection,
    kind: PlanKind,
    member_id: Uuid,
) -> anyhow::Result<Vec<AssignedPlan>> {
    let rows = sqlx::query_as::<_, AssignedPlan>(&format!(
        r#"
        SELECT p.id, p.name, p.type AS plan_type, p.description, {kcal} AS kcal_count,
               p.created_by,
               NULLIF(concat_ws(' ', t.first_name, t.last_name), '') AS trainer_name,
               l.assigned_at
        FROM {link} l
        JOIN {table} p ON p.id = l.{col}
        LEFT JOIN trainers t ON t.id = p.created_by
        WHERE l.member_id = $1
        ORDER BY l.assigned_at DESC
        "#,
        kcal = kcal_column(kind),
        link = kind.link_table(),
        table = kind.table(),
        col = kind.link_column(),
    ))
    .bind(member_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn existing_equipment_ids(conn: &mut PgConnection, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
    let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM equipment WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(found)
}

pub async fn replace_workout_equipment(
    conn: &mut PgConnection,
    workout_id: Uuid,
    equipment_ids: &[Uuid],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM workout_equipment WHERE workout_id = $1")
        .bind(workout_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO workout_equipment (workout_id, equipment_id) SELECT $1::uuid, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
    )
    .bind(workout_id)
    .bind(equipment_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn equipment_of(conn: &mut PgConnection, workout_ids: &[Uuid]) -> anyhow::Result<Vec<LinkedEquipment>> {
    let rows = sqlx::query_as::<_, LinkedEquipment>(
        r#"
        SELECT we.workout_id AS plan_id, e.id, e.name, e.category
        FROM workout_equipment we
        JOIN equipment e ON e.id = we.equipment_id
        WHERE we.workout_id = ANY($1)
        ORDER BY e.name
        "#,
    )
    .bind(workout_ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn distinct_types(conn: &mut PgConnection, kind: PlanKind) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(&format!(
        "SELECT DISTINCT type FROM {} WHERE type IS NOT NULL AND type <> ''",
        kind.table()
    ))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn count(conn: &mut PgConnection, kind: PlanKind, owner: Option<Uuid>) -> anyhow::Result<i64> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE ($1::uuid IS NULL OR created_by = $1)",
        kind.table()
    ))
    .bind(owner)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

pub async fn counts_by_type(
    conn: &mut PgConnection,
    kind: PlanKind,
    owner: Option<Uuid>,
) -> anyhow::Result<Vec<TypeCount>> {
    let rows = sqlx::query_as::<_, TypeCount>(&format!(
        r#"
        SELECT COALESCE(NULLIF(type, ''), 'unspecified') AS name, COUNT(*) AS count
        FROM {}
        WHERE ($1::uuid IS NULL OR created_by = $1)
        GROUP BY 1
        ORDER BY count DESC, name
        "#,
        kind.table()
    ))
    .bind(owner)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Distinct members holding at least one plan in scope.
pub async fn assigned_member_count(
    conn: &mut PgConnection,
    kind: PlanKind,
    owner: Option<Uuid>,
) -> anyhow::Result<i64> {
    let total: i64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COUNT(DISTINCT l.member_id)
        FROM {link} l
        JOIN {table} p ON p.id = l.{col}
        WHERE ($1::uuid IS NULL OR p.created_by = $1)
        "#,
        link = kind.link_table(),
        table = kind.table(),
        col = kind.link_column(),
    ))
    .bind(owner)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

pub async fn average_kcal(conn: &mut PgConnection, owner: Option<Uuid>) -> anyhow::Result<f64> {
    let avg: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(kcal_count)::float8 FROM diet_plans WHERE ($1::uuid IS NULL OR created_by = $1)",
    )
    .bind(owner)
    .fetch_one(conn)
    .await?;
    Ok(avg.unwrap_or(0.0))
}

pub async fn counts_by_trainer(
    conn: &mut PgConnection,
    kind: PlanKind,
    owner: Option<Uuid>,
) -> anyhow::Result<Vec<TrainerPlanCount>> {
    let rows = sqlx::query_as::<_, TrainerPlanCount>(&format!(
        r#"
        SELECT concat_ws(' ', t.first_name, t.last_name) AS trainer_name, COUNT(p.id) AS plan_count
        FROM trainers t
        JOIN {} p ON p.created_by = t.id
        WHERE ($1::uuid IS NULL OR t.id = $1)
        GROUP BY t.id, t.first_name, t.last_name
        ORDER BY plan_count DESC
        "#,
        kind.table()
    ))
    .bind(owner)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
