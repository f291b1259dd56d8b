use rust_decimal::Decimal;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    dto::MemberSummary,
    repo_types::{AddressPatch, MemberFilter, MemberOverviewRow, MemberPatch, MemberPick, MemberRow, Metric},
};

pub use super::repo_types::NewMember;

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.user_id, m.first_name, m.last_name, m.dob, m.gender, m.joined_on,
           m.emergency_contact, m.is_active, m.created_at,
           u.email, ph.phone,
           a.street_name, a.city_name, a.state_name, a.postal_code
    FROM members m
    JOIN users u ON u.id = m.user_id
    LEFT JOIN LATERAL (
        SELECT phone FROM member_phones WHERE member_id = m.id LIMIT 1
    ) ph ON TRUE
    LEFT JOIN LATERAL (
        SELECT street_name, city_name, state_name, postal_code
        FROM addresses WHERE member_id = m.id LIMIT 1
    ) a ON TRUE
"#;

/// Same joins as [`MEMBER_SELECT`] plus latest metrics, visits since `$1`,
/// last check-in and the most recent membership.
const OVERVIEW_SELECT: &str = r#"
    SELECT m.id, m.user_id, m.first_name, m.last_name, m.dob, m.gender, m.joined_on,
           m.emergency_contact, m.is_active, m.created_at,
           u.email, ph.phone,
           a.street_name, a.city_name, a.state_name, a.postal_code,
           pm.height_cm, pm.weight_kg, pm.bmi,
           COALESCE(att.visit_days, 0) AS visit_days, att.last_check_in,
           cur.plan_name, cur.start_date AS plan_start, cur.end_date AS plan_end,
           cur.status AS plan_status
    FROM members m
    JOIN users u ON u.id = m.user_id
    LEFT JOIN LATERAL (
        SELECT phone FROM member_phones WHERE member_id = m.id LIMIT 1
    ) ph ON TRUE
    LEFT JOIN LATERAL (
        SELECT street_name, city_name, state_name, postal_code
        FROM addresses WHERE member_id = m.id LIMIT 1
    ) a ON TRUE
    LEFT JOIN LATERAL (
        SELECT height_cm, weight_kg, bmi FROM physical_metrics
        WHERE member_id = m.id ORDER BY measured_at DESC LIMIT 1
    ) pm ON TRUE
    LEFT JOIN LATERAL (
        SELECT COUNT(DISTINCT check_in::date) FILTER (WHERE check_in >= $1) AS visit_days,
               MAX(check_in) AS last_check_in
        FROM attendance WHERE member_id = m.id
    ) att ON TRUE
    LEFT JOIN LATERAL (
        SELECT p.name AS plan_name, mm.start_date, mm.end_date, mm.status
        FROM member_memberships mm
        JOIN membership_plans p ON p.id = mm.plan_id
        WHERE mm.member_id = m.id
        ORDER BY mm.start_date DESC
        LIMIT 1
    ) cur ON TRUE
"#;

/// Filter clause whose four parameters start at `$first`.
fn list_where(first: usize) -> String {
    let (search, active, plan, only_active) = (first, first + 1, first + 2, first + 3);
    format!(
        r#"
        WHERE (${search}::text IS NULL
               OR m.first_name ILIKE ${search} OR m.last_name ILIKE ${search}
               OR u.email ILIKE ${search}
               OR concat_ws(' ', m.first_name, m.last_name) ILIKE ${search})
          AND (${active}::bool IS NULL OR m.is_active = ${active})
          AND (${plan}::text IS NULL OR EXISTS (
                SELECT 1 FROM member_memberships fm
                JOIN membership_plans fp ON fp.id = fm.plan_id
                WHERE fm.member_id = m.id AND fp.name ILIKE ${plan}))
          AND (NOT ${only_active}::bool OR m.is_active)
        "#
    )
}

pub async fn insert_member(conn: &mut PgConnection, new: &NewMember) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO members (user_id, first_name, last_name, dob, gender, emergency_contact)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(new.user_id)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(new.dob)
    .bind(&new.gender)
    .bind(&new.emergency_contact)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Drops every stored phone and keeps `phone`, if any.
pub async fn replace_phone(conn: &mut PgConnection, member_id: Uuid, phone: Option<&str>) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM member_phones WHERE member_id = $1")
        .bind(member_id)
        .execute(&mut *conn)
        .await?;
    if let Some(phone) = phone {
        sqlx::query("INSERT INTO member_phones (member_id, phone) VALUES ($1, $2)")
            .bind(member_id)
            .bind(phone)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn summary_by_user(conn: &mut PgConnection, user_id: Uuid) -> anyhow::Result<Option<MemberSummary>> {
    let row = sqlx::query_as::<_, MemberSummary>(
        r#"
        SELECT m.id, m.first_name, m.last_name,
               (SELECT phone FROM member_phones WHERE member_id = m.id LIMIT 1) AS phone,
               m.dob, m.gender, m.emergency_contact, m.is_active
        FROM members m
        WHERE m.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn exists(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(found)
}

pub async fn existing_ids(conn: &mut PgConnection, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
    let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM members WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(found)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<MemberRow>> {
    let row = sqlx::query_as::<_, MemberRow>(&format!("{MEMBER_SELECT} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn find_overview(
    conn: &mut PgConnection,
    id: Uuid,
    visits_since: OffsetDateTime,
) -> anyhow::Result<Option<MemberOverviewRow>> {
    let row = sqlx::query_as::<_, MemberOverviewRow>(&format!("{OVERVIEW_SELECT} WHERE m.id = $2"))
        .bind(visits_since)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &MemberFilter,
    visits_since: OffsetDateTime,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<MemberOverviewRow>, i64)> {
    let search = filter.search.as_ref().map(|s| format!("%{s}%"));
    let plan = filter.plan.as_ref().map(|p| format!("%{p}%"));

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM members m JOIN users u ON u.id = m.user_id {}",
        list_where(1)
    ))
    .bind(&search)
    .bind(filter.active)
    .bind(&plan)
    .bind(filter.only_active)
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, MemberOverviewRow>(&format!(
        "{OVERVIEW_SELECT} {} ORDER BY m.created_at DESC LIMIT $6 OFFSET $7",
        list_where(2)
    ))
    .bind(visits_since)
    .bind(&search)
    .bind(filter.active)
    .bind(&plan)
    .bind(filter.only_active)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok((rows, total))
}

pub async fn search_active(conn: &mut PgConnection, search: Option<&str>, limit: i64) -> anyhow::Result<Vec<MemberPick>> {
    let pattern = search.map(|s| format!("%{s}%"));
    let rows = sqlx::query_as::<_, MemberPick>(
        r#"
        SELECT m.id, m.first_name, m.last_name,
               concat_ws(' ', m.first_name, m.last_name) AS full_name,
               u.email, m.is_active
        FROM members m
        JOIN users u ON u.id = m.user_id
        WHERE m.is_active
          AND ($1::text IS NULL
               OR m.first_name ILIKE $1 OR m.last_name ILIKE $1 OR u.email ILIKE $1
               OR concat_ws(' ', m.first_name, m.last_name) ILIKE $1)
        ORDER BY m.first_name, m.last_name
        LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn update_profile(conn: &mut PgConnection, id: Uuid, patch: &MemberPatch) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE members
        SET first_name        = COALESCE($2, first_name),
            last_name         = COALESCE($3, last_name),
            gender            = COALESCE($4, gender),
            emergency_contact = COALESCE($5, emergency_contact),
            dob               = COALESCE($6, dob),
            is_active         = COALESCE($7, is_active),
            updated_at        = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .bind(&patch.gender)
    .bind(&patch.emergency_contact)
    .bind(patch.dob)
    .bind(patch.is_active)
    .execute(conn)
    .await?;
    Ok(())
}

/// A member keeps a single address; the first one is updated or created.
pub async fn upsert_address(conn: &mut PgConnection, member_id: Uuid, patch: &AddressPatch) -> anyhow::Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE addresses
        SET street_name = COALESCE($2, street_name),
            city_name   = COALESCE($3, city_name),
            state_name  = COALESCE($4, state_name),
            postal_code = COALESCE($5, postal_code)
        WHERE id = (SELECT id FROM addresses WHERE member_id = $1 LIMIT 1)
        "#,
    )
    .bind(member_id)
    .bind(&patch.street_name)
    .bind(&patch.city_name)
    .bind(&patch.state_name)
    .bind(&patch.postal_code)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        sqlx::query(
            "INSERT INTO addresses (member_id, street_name, city_name, state_name, postal_code) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(member_id)
        .bind(&patch.street_name)
        .bind(&patch.city_name)
        .bind(&patch.state_name)
        .bind(&patch.postal_code)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_metric(
    conn: &mut PgConnection,
    member_id: Uuid,
    height_cm: Option<Decimal>,
    weight_kg: Option<Decimal>,
    bmi: Option<Decimal>,
) -> anyhow::Result<Metric> {
    let metric = sqlx::query_as::<_, Metric>(
        r#"
        INSERT INTO physical_metrics (member_id, height_cm, weight_kg, bmi)
        VALUES ($1, $2, $3, $4)
        RETURNING id, measured_at, height_cm, weight_kg, bmi
        "#,
    )
    .bind(member_id)
    .bind(height_cm)
    .bind(weight_kg)
    .bind(bmi)
    .fetch_one(conn)
    .await?;
    Ok(metric)
}

pub async fn recent_metrics(conn: &mut PgConnection, member_id: Uuid, limit: i64) -> anyhow::Result<Vec<Metric>> {
    let rows = sqlx::query_as::<_, Metric>(
        r#"
        SELECT id, measured_at, height_cm, weight_kg, bmi
        FROM physical_metrics
        WHERE member_id = $1
        ORDER BY measured_at DESC
        LIMIT $2
        "#,
    )
    .bind(member_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Removes the member row and everything recorded against it.
pub async fn delete_with_history(conn: &mut PgConnection, member_id: Uuid) -> anyhow::Result<()> {
    for sql in [
        "DELETE FROM payments WHERE member_id = $1",
        "DELETE FROM attendance WHERE member_id = $1",
        "DELETE FROM member_memberships WHERE member_id = $1",
        "DELETE FROM physical_metrics WHERE member_id = $1",
        "DELETE FROM addresses WHERE member_id = $1",
        "DELETE FROM member_phones WHERE member_id = $1",
        "DELETE FROM member_workout_plans WHERE member_id = $1",
        "DELETE FROM member_diet_plans WHERE member_id = $1",
        "DELETE FROM members WHERE id = $1",
    ] {
        sqlx::query(sql).bind(member_id).execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_where_numbers_from_first() {
        let clause = list_where(2);
        assert!(clause.contains("$2::text IS NULL"));
        assert!(clause.contains("NOT $5::bool"));
        assert!(!clause.contains("$1"));
        assert!(!clause.contains("$6"));
    }
}
