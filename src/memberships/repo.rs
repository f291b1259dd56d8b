use rust_decimal::Decimal;
use sqlx::PgConnection;
use time::Date;
use uuid::Uuid;

use super::repo_types::{
    MemberBrief, NewSubscription, Plan, PlanPopularity, PlanUsage, StatusCount, Subscription,
    SubscriptionDetail, SubscriptionFilter,
};

const PLAN_COLUMNS: &str = "id, name, duration_days, price, description, created_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, member_id, plan_id, start_date, end_date, status, amount_paid, discount, created_at";

const DETAIL_SELECT: &str = r#"
    SELECT mm.id, mm.member_id, m.first_name, m.last_name, u.email AS member_email,
           mm.plan_id, p.name AS plan_name, mm.start_date, mm.end_date, mm.status,
           mm.amount_paid, mm.discount, mm.created_at
    FROM member_memberships mm
    JOIN membership_plans p ON p.id = mm.plan_id
    JOIN members m ON m.id = mm.member_id
    LEFT JOIN users u ON u.id = m.user_id
"#;

pub async fn list_plans(conn: &mut PgConnection) -> anyhow::Result<Vec<Plan>> {
    let rows = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM membership_plans ORDER BY duration_days, price"
    ))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn plan_usage(conn: &mut PgConnection) -> anyhow::Result<Vec<PlanUsage>> {
    let rows = sqlx::query_as::<_, PlanUsage>(
        r#"
        SELECT plan_id,
               COUNT(*) FILTER (WHERE status = 'active') AS active_memberships,
               COALESCE(SUM(amount_paid), 0) AS total_revenue
        FROM member_memberships
        GROUP BY plan_id
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn find_plan(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM membership_plans WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(plan)
}

pub async fn find_plan_by_name(conn: &mut PgConnection, name: &str) -> anyhow::Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM membership_plans WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(conn)
    .await?;
    Ok(plan)
}

pub async fn plan_name_taken(
    conn: &mut PgConnection,
    name: &str,
    except: Option<Uuid>,
) -> anyhow::Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM membership_plans WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(name)
    .bind(except)
    .fetch_one(conn)
    .await?;
    Ok(taken)
}

pub async fn insert_plan(
    conn: &mut PgConnection,
    name: &str,
    duration_days: i32,
    price: Decimal,
    description: Option<&str>,
) -> anyhow::Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        r#"
        INSERT INTO membership_plans (name, duration_days, price, description)
        VALUES ($1, $2, $3, $4)
        RETURNING {PLAN_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(duration_days)
    .bind(price)
    .bind(description)
    .fetch_one(conn)
    .await?;
    Ok(plan)
}

pub async fn update_plan(conn: &mut PgConnection, plan: &Plan) -> anyhow::Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        r#"
        UPDATE membership_plans
        SET name = $2, duration_days = $3, price = $4, description = $5
        WHERE id = $1
        RETURNING {PLAN_COLUMNS}
        "#
    ))
    .bind(plan.id)
    .bind(&plan.name)
    .bind(plan.duration_days)
    .bind(plan.price)
    .bind(&plan.description)
    .fetch_one(conn)
    .await?;
    Ok(plan)
}

pub async fn count_active_for_plan(conn: &mut PgConnection, plan_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM member_memberships WHERE plan_id = $1 AND status = 'active'",
    )
    .bind(plan_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn delete_plan(conn: &mut PgConnection, plan_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM membership_plans WHERE id = $1")
        .bind(plan_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn distinct_plan_names(conn: &mut PgConnection) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT name FROM membership_plans ORDER BY name")
            .fetch_all(conn)
            .await?;
    Ok(names)
}

/// Loads a member and holds its row lock until the transaction ends, so
/// concurrent subscription writes for one member run one after another.
pub async fn lock_member(conn: &mut PgConnection, member_id: Uuid) -> anyhow::Result<Option<MemberBrief>> {
    let member = sqlx::query_as::<_, MemberBrief>(
        "SELECT id, first_name, last_name FROM members WHERE id = $1 FOR UPDATE",
    )
    .bind(member_id)
    .fetch_optional(conn)
    .await?;
    Ok(member)
}

/// Latest end date of a stored-active subscription still running on `start`.
pub async fn active_overlap(
    conn: &mut PgConnection,
    member_id: Uuid,
    start: Date,
) -> anyhow::Result<Option<Date>> {
    let end: Option<Date> = sqlx::query_scalar(
        r#"
        SELECT end_date FROM member_memberships
        WHERE member_id = $1 AND status = 'active' AND end_date >= $2
        ORDER BY end_date DESC
        LIMIT 1
        "#,
    )
    .bind(member_id)
    .bind(start)
    .fetch_optional(conn)
    .await?;
    Ok(end)
}

pub async fn insert_subscription(
    conn: &mut PgConnection,
    new: &NewSubscription,
) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        INSERT INTO member_memberships
            (member_id, plan_id, start_date, end_date, status, amount_paid, discount)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    ))
    .bind(new.member_id)
    .bind(new.plan_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.status)
    .bind(new.amount_paid)
    .bind(new.discount)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn find_subscription(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM member_memberships WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn update_subscription(
    conn: &mut PgConnection,
    id: Uuid,
    status: &str,
    end_date: Date,
) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        UPDATE member_memberships SET status = $2, end_date = $3
        WHERE id = $1
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(end_date)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn list_subscriptions(
    conn: &mut PgConnection,
    filter: &SubscriptionFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<SubscriptionDetail>, i64)> {
    let condition = r#"
        WHERE ($1::text IS NULL OR mm.status = $1)
          AND ($2::uuid IS NULL OR mm.member_id = $2)
          AND ($3::uuid IS NULL OR mm.plan_id = $3)
    "#;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM member_memberships mm {condition}"
    ))
    .bind(&filter.status)
    .bind(filter.member_id)
    .bind(filter.plan_id)
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, SubscriptionDetail>(&format!(
        "{DETAIL_SELECT} {condition} ORDER BY mm.created_at DESC LIMIT $4 OFFSET $5"
    ))
    .bind(&filter.status)
    .bind(filter.member_id)
    .bind(filter.plan_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok((rows, total))
}

pub async fn history_for_member(
    conn: &mut PgConnection,
    member_id: Uuid,
) -> anyhow::Result<Vec<SubscriptionDetail>> {
    let rows = sqlx::query_as::<_, SubscriptionDetail>(&format!(
        "{DETAIL_SELECT} WHERE mm.member_id = $1 ORDER BY mm.start_date DESC"
    ))
    .bind(member_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn counts_by_status(conn: &mut PgConnection) -> anyhow::Result<Vec<StatusCount>> {
    let rows = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM member_memberships GROUP BY status",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn count_expiring(conn: &mut PgConnection, from: Date, until: Date) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM member_memberships
        WHERE status = 'active' AND end_date >= $1 AND end_date <= $2
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Sum of `amount_paid`; `since` limits it to subscriptions created on or after that day.
pub async fn revenue_since(conn: &mut PgConnection, since: Option<Date>) -> anyhow::Result<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_paid), 0) FROM member_memberships
        WHERE $1::date IS NULL OR created_at::date >= $1
        "#,
    )
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

pub async fn popular_plans(conn: &mut PgConnection, limit: i64) -> anyhow::Result<Vec<PlanPopularity>> {
    let rows = sqlx::query_as::<_, PlanPopularity>(
        r#"
        SELECT p.name, COUNT(mm.id) AS count
        FROM membership_plans p
        JOIN member_memberships mm ON mm.plan_id = p.id
        GROUP BY p.name
        ORDER BY count DESC, p.name
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
