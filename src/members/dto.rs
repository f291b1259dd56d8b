use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::{MemberOverviewRow, MemberRow, Metric},
    services::{attendance_percentage, membership_label, ATTENDANCE_WINDOW_DAYS},
};
use crate::{
    auth::services::age_on,
    common::{iso_date, PageMeta},
    memberships::{
        dto::SubscriptionView,
        services::{display_status, full_name, MembershipStatus},
    },
    plans::repo_types::AssignedPlan,
};

/// Profile block returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberSummary {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "iso_date::option")]
    pub dob: Option<Date>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct MemberListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub plan: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub membership_plan: Option<String>,
    pub start_date: Option<String>,
    pub discount: Option<Decimal>,
    pub payment_mode: Option<String>,
}

/// Accepts both the camelCase and snake_case spellings clients send.
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    #[serde(alias = "emergencyContact")]
    pub emergency_contact: Option<String>,
    #[serde(alias = "dateOfBirth")]
    pub dob: Option<String>,
    pub is_active: Option<bool>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(alias = "zipCode")]
    pub zip_code: Option<String>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPlansRequest {
    pub plan_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressView {
    pub street_name: Option<String>,
    pub city_name: Option<String>,
    pub state_name: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(with = "iso_date::option")]
    pub dob: Option<Date>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    #[serde(with = "iso_date")]
    pub joined_on: Date,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub address: Option<AddressView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MemberView {
    pub fn from_row(row: MemberRow, today: Date) -> Self {
        let address = (row.street_name.is_some()
            || row.city_name.is_some()
            || row.state_name.is_some()
            || row.postal_code.is_some())
        .then(|| AddressView {
            street_name: row.street_name,
            city_name: row.city_name,
            state_name: row.state_name,
            postal_code: row.postal_code,
        });
        Self {
            full_name: full_name(row.first_name.as_deref(), row.last_name.as_deref()),
            age: row.dob.map(|dob| age_on(dob, today)),
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            dob: row.dob,
            gender: row.gender,
            joined_on: row.joined_on,
            emergency_contact: row.emergency_contact,
            is_active: row.is_active,
            address,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentMembership {
    pub plan_name: String,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    pub status: String,
    pub display_status: MembershipStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberOverview {
    #[serde(flatten)]
    pub member: MemberView,
    pub height_cm: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
    pub bmi: Option<Decimal>,
    pub attendance_percentage: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_check_in: Option<OffsetDateTime>,
    pub current_membership: Option<CurrentMembership>,
    pub membership_type: String,
}

impl MemberOverview {
    pub fn from_row(row: MemberOverviewRow, today: Date) -> Self {
        let current_membership = match (row.plan_name, row.plan_start, row.plan_end, row.plan_status) {
            (Some(plan_name), Some(start_date), Some(end_date), Some(status)) => Some(CurrentMembership {
                display_status: display_status(&status, start_date, end_date, today),
                plan_name,
                start_date,
                end_date,
                status,
            }),
            _ => None,
        };
        let membership_type = membership_label(
            current_membership.as_ref().map(|c| c.plan_name.as_str()),
            current_membership.as_ref().map(|c| c.display_status),
        );
        Self {
            member: MemberView::from_row(row.member, today),
            height_cm: row.height_cm,
            weight_kg: row.weight_kg,
            bmi: row.bmi,
            attendance_percentage: attendance_percentage(row.visit_days, ATTENDANCE_WINDOW_DAYS),
            last_check_in: row.last_check_in,
            current_membership,
            membership_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub overview: MemberOverview,
    pub membership_history: Vec<SubscriptionView>,
    pub physical_metrics: Vec<Metric>,
    pub workout_plans: Vec<AssignedPlan>,
    pub diet_plans: Vec<AssignedPlan>,
}

#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<MemberOverview>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct MemberDetailResponse {
    pub member: MemberDetail,
}

#[derive(Debug, Serialize)]
pub struct MemberSavedResponse {
    pub message: &'static str,
    pub member: MemberOverview,
}

#[derive(Debug, Serialize)]
pub struct MetricResponse {
    pub message: &'static str,
    pub metric: Metric,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub message: &'static str,
    pub member_id: Uuid,
    pub plans: Vec<AssignedPlan>,
}

#[derive(Debug, Serialize)]
pub struct PlanNamesResponse {
    pub plans: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn row() -> MemberRow {
        MemberRow {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            first_name: Some("Asha".into()),
            last_name: Some("Rao".into()),
            dob: Some(date!(2000 - 06 - 15)),
            gender: None,
            joined_on: date!(2024 - 01 - 01),
            emergency_contact: None,
            is_active: true,
            created_at: datetime!(2024-01-01 0:00 UTC),
            email: "asha@gym.test".into(),
            phone: None,
            street_name: None,
            city_name: Some("Pune".into()),
            state_name: None,
            postal_code: None,
        }
    }

    #[test]
    fn view_derives_age_and_address() {
        let view = MemberView::from_row(row(), date!(2024 - 06 - 14));
        assert_eq!(view.age, Some(23));
        assert_eq!(view.full_name, "Asha Rao");
        assert_eq!(view.address.and_then(|a| a.city_name).as_deref(), Some("Pune"));
    }

    #[test]
    fn overview_uses_display_status() {
        let overview = MemberOverview::from_row(
            MemberOverviewRow {
                member: row(),
                height_cm: None,
                weight_kg: None,
                bmi: None,
                visit_days: 15,
                last_check_in: None,
                plan_name: Some("Monthly".into()),
                plan_start: Some(date!(2024 - 01 - 01)),
                plan_end: Some(date!(2024 - 01 - 31)),
                plan_status: Some("active".into()),
            },
            date!(2024 - 02 - 01),
        );
        assert_eq!(overview.attendance_percentage, 50.0);
        assert_eq!(overview.membership_type, "Monthly (Expired)");
        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["current_membership"]["status"], "active");
        assert_eq!(json["current_membership"]["display_status"], "expired");
        assert_eq!(json["email"], "asha@gym.test");
    }
}
