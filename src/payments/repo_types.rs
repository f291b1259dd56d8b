use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::common::iso_date;

/// Payment joined with member, membership and plan, all optional.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub member_email: Option<String>,
    pub membership_id: Option<Uuid>,
    pub plan_name: Option<String>,
    pub membership_start: Option<Date>,
    pub membership_end: Option<Date>,
    pub membership_status: Option<String>,
    pub amount: Decimal,
    pub date: OffsetDateTime,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub member_id: Option<Uuid>,
    pub mode: Option<String>,
    pub from: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModeTotal {
    pub mode: Option<String>,
    pub count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyRevenue {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub revenue: Decimal,
    pub payment_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: i32,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct TopPayer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub total_paid: Decimal,
    pub payment_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PeriodTotals {
    pub period_total: Decimal,
    pub average_payment: Decimal,
    pub payment_count: i64,
}
