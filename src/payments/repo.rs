use rust_decimal::Decimal;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

pub use super::repo_types::PaymentFilter;
use super::repo_types::{DailyRevenue, ModeTotal, MonthlyRevenue, PaymentRow, PeriodTotals, TopPayer};

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub member_id: Uuid,
    pub membership_id: Option<Uuid>,
    pub amount: Decimal,
    /// `None` records the payment at the current time.
    pub date: Option<OffsetDateTime>,
    pub mode: Option<String>,
}

const PAYMENT_SELECT: &str = r#"
    SELECT pay.id, pay.member_id, m.first_name, m.last_name, u.email AS member_email,
           pay.membership_id, p.name AS plan_name, mm.start_date AS membership_start,
           mm.end_date AS membership_end, mm.status AS membership_status,
           pay.amount, pay.date, pay.mode
    FROM payments pay
    LEFT JOIN members m ON m.id = pay.member_id
    LEFT JOIN users u ON u.id = m.user_id
    LEFT JOIN member_memberships mm ON mm.id = pay.membership_id
    LEFT JOIN membership_plans p ON p.id = mm.plan_id
"#;

const FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR pay.member_id = $1)
      AND ($2::text IS NULL OR pay.mode ILIKE '%' || $2 || '%')
      AND ($3::timestamptz IS NULL OR pay.date >= $3)
      AND ($4::timestamptz IS NULL OR pay.date < $4)
"#;

pub async fn insert_payment(conn: &mut PgConnection, new: &NewPayment) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO payments (member_id, membership_id, amount, date, mode)
        VALUES ($1, $2, $3, COALESCE($4, now()), $5)
        RETURNING id
        "#,
    )
    .bind(new.member_id)
    .bind(new.membership_id)
    .bind(new.amount)
    .bind(new.date)
    .bind(&new.mode)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &PaymentFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<PaymentRow>, i64)> {
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payments pay {FILTER}"))
        .bind(filter.member_id)
        .bind(&filter.mode)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(&mut *conn)
        .await?;

    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
        "{PAYMENT_SELECT} {FILTER} ORDER BY pay.date DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.member_id)
    .bind(&filter.mode)
    .bind(filter.from)
    .bind(filter.until)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok((rows, total))
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<PaymentRow>> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!("{PAYMENT_SELECT} WHERE pay.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Owner of a membership, used to check that a payment links to the right member.
pub async fn membership_owner(conn: &mut PgConnection, membership_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let owner: Option<Uuid> =
        sqlx::query_scalar("SELECT member_id FROM member_memberships WHERE id = $1")
            .bind(membership_id)
            .fetch_optional(conn)
            .await?;
    Ok(owner)
}

pub async fn period_totals(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<PeriodTotals> {
    let totals = sqlx::query_as::<_, PeriodTotals>(
        r#"
        SELECT COALESCE(SUM(amount), 0) AS period_total,
               COALESCE(AVG(amount), 0) AS average_payment,
               COUNT(*) AS payment_count
        FROM payments WHERE date >= $1
        "#,
    )
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(totals)
}

pub async fn all_time_total(conn: &mut PgConnection) -> anyhow::Result<Decimal> {
    let total: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments")
        .fetch_one(conn)
        .await?;
    Ok(total)
}

pub async fn mode_totals(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<Vec<ModeTotal>> {
    let rows = sqlx::query_as::<_, ModeTotal>(
        r#"
        SELECT mode, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total_amount
        FROM payments WHERE date >= $1
        GROUP BY mode
        ORDER BY total_amount DESC
        "#,
    )
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn daily_revenue(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<Vec<DailyRevenue>> {
    let rows = sqlx::query_as::<_, DailyRevenue>(
        r#"
        SELECT (date AT TIME ZONE 'UTC')::date AS date,
               SUM(amount) AS revenue,
               COUNT(*) AS payment_count
        FROM payments WHERE date >= $1
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn monthly_revenue(conn: &mut PgConnection, since: OffsetDateTime) -> anyhow::Result<Vec<MonthlyRevenue>> {
    let rows = sqlx::query_as::<_, MonthlyRevenue>(
        r#"
        SELECT EXTRACT(YEAR FROM date AT TIME ZONE 'UTC')::int AS year,
               EXTRACT(MONTH FROM date AT TIME ZONE 'UTC')::int AS month,
               SUM(amount) AS revenue
        FROM payments WHERE date >= $1
        GROUP BY 1, 2
        ORDER BY 1, 2
        "#,
    )
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn top_payers(conn: &mut PgConnection, since: OffsetDateTime, limit: i64) -> anyhow::Result<Vec<TopPayer>> {
    let rows = sqlx::query_as::<_, TopPayer>(
        r#"
        SELECT m.first_name, m.last_name,
               SUM(pay.amount) AS total_paid,
               COUNT(pay.id) AS payment_count
        FROM payments pay
        JOIN members m ON m.id = pay.member_id
        WHERE pay.date >= $1
        GROUP BY m.id, m.first_name, m.last_name
        ORDER BY total_paid DESC
        LIMIT $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn distinct_modes(conn: &mut PgConnection) -> anyhow::Result<Vec<String>> {
    let modes: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT mode FROM payments WHERE mode IS NOT NULL AND mode <> '' ORDER BY mode",
    )
    .fetch_all(conn)
    .await?;
    Ok(modes)
}
