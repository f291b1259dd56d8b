use sqlx::PgConnection;
use time::Date;
use uuid::Uuid;

pub use super::repo_types::{EquipmentFields, EquipmentFilter};
use super::repo_types::{CategoryCount, EquipmentRow};

const EQUIPMENT_SELECT: &str = r#"
    SELECT id, name, category, quantity, purchase_date, last_maintenance_date,
           next_maintenance_date, created_at
    FROM equipment
"#;

/// Every item matching the filter; status filtering happens on the caller's side.
pub async fn list(conn: &mut PgConnection, filter: &EquipmentFilter) -> anyhow::Result<Vec<EquipmentRow>> {
    let rows = sqlx::query_as::<_, EquipmentRow>(&format!(
        r#"
        {EQUIPMENT_SELECT}
        WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR category ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR category ILIKE '%' || $2 || '%')
        ORDER BY name
        "#
    ))
    .bind(&filter.search)
    .bind(&filter.category)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn all_next_dates(conn: &mut PgConnection) -> anyhow::Result<Vec<Option<Date>>> {
    let dates = sqlx::query_scalar::<_, Option<Date>>("SELECT next_maintenance_date FROM equipment")
        .fetch_all(conn)
        .await?;
    Ok(dates)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<EquipmentRow>> {
    let row = sqlx::query_as::<_, EquipmentRow>(&format!("{EQUIPMENT_SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn insert(conn: &mut PgConnection, fields: &EquipmentFields) -> anyhow::Result<EquipmentRow> {
    let row = sqlx::query_as::<_, EquipmentRow>(
        r#"
        INSERT INTO equipment (name, category, quantity, purchase_date,
                               last_maintenance_date, next_maintenance_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, category, quantity, purchase_date, last_maintenance_date,
                  next_maintenance_date, created_at
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.category)
    .bind(fields.quantity)
    .bind(fields.purchase_date)
    .bind(fields.last_maintenance_date)
    .bind(fields.next_maintenance_date)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, fields: &EquipmentFields) -> anyhow::Result<EquipmentRow> {
    let row = sqlx::query_as::<_, EquipmentRow>(
        r#"
        UPDATE equipment
        SET name = $2, category = $3, quantity = $4, purchase_date = $5,
            last_maintenance_date = $6, next_maintenance_date = $7
        WHERE id = $1
        RETURNING id, name, category, quantity, purchase_date, last_maintenance_date,
                  next_maintenance_date, created_at
        "#,
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.category)
    .bind(fields.quantity)
    .bind(fields.purchase_date)
    .bind(fields.last_maintenance_date)
    .bind(fields.next_maintenance_date)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn record_maintenance(
    conn: &mut PgConnection,
    id: Uuid,
    last: Date,
    next: Date,
) -> anyhow::Result<EquipmentRow> {
    let row = sqlx::query_as::<_, EquipmentRow>(
        r#"
        UPDATE equipment
        SET last_maintenance_date = $2, next_maintenance_date = $3
        WHERE id = $1
        RETURNING id, name, category, quantity, purchase_date, last_maintenance_date,
                  next_maintenance_date, created_at
        "#,
    )
    .bind(id)
    .bind(last)
    .bind(next)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Plan links cascade with the row.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn category_counts(conn: &mut PgConnection) -> anyhow::Result<Vec<CategoryCount>> {
    let rows = sqlx::query_as::<_, CategoryCount>(
        "SELECT category AS name, COUNT(*) AS count FROM equipment GROUP BY category ORDER BY category",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
