use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::common::iso_date;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub duration_days: i32,
    pub price: Decimal,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Per-plan figures shown to admins next to the catalog.
#[derive(Debug, Clone, FromRow)]
pub struct PlanUsage {
    pub plan_id: Uuid,
    pub active_memberships: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    pub status: String,
    pub amount_paid: Decimal,
    pub discount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Subscription joined with member and plan names.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionDetail {
    pub id: Uuid,
    pub member_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub member_email: Option<String>,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub status: String,
    pub amount_paid: Decimal,
    pub discount: Decimal,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberBrief {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub status: &'static str,
    pub amount_paid: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub status: Option<String>,
    pub member_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanPopularity {
    pub name: String,
    pub count: i64,
}
