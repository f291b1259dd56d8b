use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::{Plan, PlanPopularity, SubscriptionDetail},
    services::{days_remaining, display_status, full_name, MembershipStatus},
};
use crate::common::{iso_date, PageMeta};

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub name: Option<String>,
    pub duration_days: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_memberships: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub message: &'static str,
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub status: Option<String>,
    pub member_id: Option<String>,
    pub plan_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub member_id: Uuid,
    pub member_name: String,
    pub member_email: Option<String>,
    pub plan_id: Uuid,
    pub plan_name: String,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    /// As stored; drives the overlap rule.
    pub status: String,
    /// Derived from the dates at read time.
    pub display_status: MembershipStatus,
    pub amount_paid: Decimal,
    pub discount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl SubscriptionView {
    pub fn from_detail(row: SubscriptionDetail, today: Date) -> Self {
        let shown = display_status(&row.status, row.start_date, row.end_date, today);
        Self {
            id: row.id,
            member_id: row.member_id,
            member_name: full_name(row.first_name.as_deref(), row.last_name.as_deref()),
            member_email: row.member_email,
            plan_id: row.plan_id,
            plan_name: row.plan_name,
            start_date: row.start_date,
            end_date: row.end_date,
            days_remaining: (shown == MembershipStatus::Active)
                .then(|| days_remaining(row.end_date, today)),
            status: row.status,
            display_status: shown,
            amount_paid: row.amount_paid,
            discount: row.discount,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub memberships: Vec<SubscriptionView>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub member_id: Option<String>,
    pub plan_id: Option<String>,
    pub start_date: Option<String>,
    pub discount: Option<Decimal>,
    pub payment_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedSubscription {
    pub id: Uuid,
    pub member_name: String,
    pub plan_name: String,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    pub status: String,
    pub display_status: MembershipStatus,
    pub amount_paid: Decimal,
    pub discount: Decimal,
    pub payment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreatedSubscriptionResponse {
    pub message: &'static str,
    pub membership: CreatedSubscription,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub status: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedSubscription {
    pub id: Uuid,
    pub status: String,
    pub display_status: MembershipStatus,
    #[serde(with = "iso_date")]
    pub end_date: Date,
}

#[derive(Debug, Serialize)]
pub struct UpdatedSubscriptionResponse {
    pub message: &'static str,
    pub membership: UpdatedSubscription,
}

#[derive(Debug, Serialize, Default)]
pub struct MembershipCounts {
    pub active: i64,
    pub upcoming: i64,
    pub expired: i64,
    pub cancelled: i64,
    pub suspended: i64,
    pub expiring_soon: i64,
}

#[derive(Debug, Serialize)]
pub struct RevenueFigures {
    pub total: Decimal,
    pub current_month: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MembershipStatsResponse {
    pub membership_counts: MembershipCounts,
    pub revenue: RevenueFigures,
    pub popular_plans: Vec<PlanPopularity>,
}
