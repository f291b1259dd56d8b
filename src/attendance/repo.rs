use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

pub use super::repo_types::AttendanceFilter;
use super::repo_types::{AttendanceRow, DailyCount, HourlyCount, MemberVisits, Session};

const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.member_id, m.first_name AS member_first_name, m.last_name AS member_last_name,
           a.trainer_id, t.first_name AS trainer_first_name, t.last_name AS trainer_last_name,
           a.check_in, a.check_out, a.created_at
    FROM attendance a
    LEFT JOIN members m ON m.id = a.member_id
    LEFT JOIN trainers t ON t.id = a.trainer_id
"#;

const FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR a.member_id = $1)
      AND ($2::uuid IS NULL OR a.trainer_id = $2)
      AND ($3::timestamptz IS NULL OR a.check_in >= $3)
      AND ($4::timestamptz IS NULL OR a.check_in < $4)
"#;

pub async fn find(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<AttendanceRow>> {
    let row = sqlx::query_as::<_, AttendanceRow>(&format!("{ATTENDANCE_SELECT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// The member's open session, locked for the rest of the transaction.
pub async fn open_session(conn: &mut PgConnection, member_id: Uuid) -> anyhow::Result<Option<AttendanceRow>> {
    let row = sqlx::query_as::<_, AttendanceRow>(&format!(
        "{ATTENDANCE_SELECT} WHERE a.member_id = $1 AND a.check_out IS NULL FOR UPDATE OF a"
    ))
    .bind(member_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Fails with a unique violation on `attendance_one_open_session_idx` when
/// the member already has an open session.
pub async fn insert_check_in(
    conn: &mut PgConnection,
    member_id: Uuid,
    trainer_id: Option<Uuid>,
    at: OffsetDateTime,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO attendance (member_id, trainer_id, check_in) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(member_id)
    .bind(trainer_id)
    .bind(at)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn close_session(conn: &mut PgConnection, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
    sqlx::query("UPDATE attendance SET check_out = $2 WHERE id = $1 AND check_out IS NULL")
        .bind(id)
        .bind(at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &AttendanceFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<AttendanceRow>, i64)> {
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM attendance a {FILTER}"))
        .bind(filter.member_id)
        .bind(filter.trainer_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(&mut *conn)
        .await?;

    let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
        "{ATTENDANCE_SELECT} {FILTER} ORDER BY a.check_in DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.member_id)
    .bind(filter.trainer_id)
    .bind(filter.from)
    .bind(filter.until)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;
    Ok((rows, total))
}

/// Open sessions of members that still exist, oldest first.
pub async fn open_sessions(conn: &mut PgConnection) -> anyhow::Result<Vec<AttendanceRow>> {
    let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
        "{ATTENDANCE_SELECT} WHERE a.check_out IS NULL AND a.member_id IS NOT NULL ORDER BY a.check_in"
    ))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn sessions_since(
    conn: &mut PgConnection,
    member_id: Option<Uuid>,
    since: OffsetDateTime,
) -> anyhow::Result<Vec<Session>> {
    let rows = sqlx::query_as::<_, Session>(
        r#"
        SELECT check_in, check_out
        FROM attendance
        WHERE check_in >= $1 AND ($2::uuid IS NULL OR member_id = $2)
        ORDER BY check_in
        "#,
    )
    .bind(since)
    .bind(member_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Visit counts and closed-session minutes per member, busiest first.
pub async fn visits_by_member(
    conn: &mut PgConnection,
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> anyhow::Result<Vec<MemberVisits>> {
    let rows = sqlx::query_as::<_, MemberVisits>(
        r#"
        SELECT m.id AS member_id, m.first_name, m.last_name,
               COUNT(a.id) AS visit_count,
               COALESCE(SUM(
                   CASE WHEN a.check_out IS NOT NULL
                        THEN EXTRACT(EPOCH FROM a.check_out - a.check_in) / 60
                        ELSE 0 END
               ), 0)::float8 AS total_minutes
        FROM attendance a
        JOIN members m ON m.id = a.member_id
        WHERE a.check_in >= $1 AND a.check_in < $2
        GROUP BY m.id, m.first_name, m.last_name
        ORDER BY visit_count DESC
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn daily_counts(
    conn: &mut PgConnection,
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> anyhow::Result<Vec<DailyCount>> {
    let rows = sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT (check_in AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS visits
        FROM attendance
        WHERE check_in >= $1 AND check_in < $2
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn hourly_counts(
    conn: &mut PgConnection,
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> anyhow::Result<Vec<HourlyCount>> {
    let rows = sqlx::query_as::<_, HourlyCount>(
        r#"
        SELECT EXTRACT(HOUR FROM check_in AT TIME ZONE 'UTC')::int4 AS hour, COUNT(*) AS visits
        FROM attendance
        WHERE check_in >= $1 AND check_in < $2
        GROUP BY hour
        ORDER BY hour
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn active_member_count(conn: &mut PgConnection) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE is_active")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn distinct_members_since(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT member_id) FROM attendance WHERE member_id IS NOT NULL AND check_in >= $1",
    )
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
