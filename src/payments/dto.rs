use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::{DailyRevenue, ModeTotal, MonthlyRevenue, PaymentRow},
    services::receipt_number,
};
use crate::{
    common::{iso_date, DateRange, PageMeta},
    memberships::services::full_name,
};

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub member_id: Option<String>,
    #[serde(alias = "payment_mode")]
    pub mode: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub member_id: Option<String>,
    pub membership_id: Option<String>,
    pub amount: Option<Decimal>,
    pub mode: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipDetails {
    pub plan_name: Option<String>,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub member_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_email: Option<String>,
    pub membership_id: Option<Uuid>,
    pub plan_name: Option<String>,
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub mode: Option<String>,
    pub receipt_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_details: Option<MembershipDetails>,
}

impl PaymentView {
    /// `detailed` adds the member email and the linked membership.
    pub fn from_row(row: PaymentRow, detailed: bool) -> Self {
        let membership_details = match (detailed, row.membership_start, row.membership_end) {
            (true, Some(start_date), Some(end_date)) => Some(MembershipDetails {
                plan_name: row.plan_name.clone(),
                start_date,
                end_date,
                status: row.membership_status.clone(),
            }),
            _ => None,
        };
        Self {
            receipt_number: receipt_number(row.id),
            id: row.id,
            member_name: row
                .member_id
                .map(|_| full_name(row.first_name.as_deref(), row.last_name.as_deref())),
            member_id: row.member_id,
            member_email: if detailed { row.member_email } else { None },
            membership_id: row.membership_id,
            plan_name: row.plan_name,
            amount: row.amount,
            date: row.date,
            mode: row.mode,
            membership_details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentView>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment: PaymentView,
}

#[derive(Debug, Serialize)]
pub struct CreatedPaymentResponse {
    pub message: &'static str,
    pub payment: PaymentView,
}

#[derive(Debug, Serialize)]
pub struct RevenueSummary {
    pub period_total: Decimal,
    pub all_time_total: Decimal,
    pub average_payment: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TopMember {
    pub member_name: String,
    pub total_paid: Decimal,
    pub payment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatsResponse {
    pub period: &'static str,
    pub date_range: DateRange,
    pub revenue: RevenueSummary,
    pub payment_count: i64,
    pub payment_modes: Vec<ModeTotal>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub top_members: Vec<TopMember>,
}

#[derive(Debug, Serialize)]
pub struct PaymentModesResponse {
    pub payment_modes: Vec<String>,
}
