use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Member profile joined with its login email, first phone and address.
#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<Date>,
    pub gender: Option<String>,
    pub joined_on: Date,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub email: String,
    pub phone: Option<String>,
    pub street_name: Option<String>,
    pub city_name: Option<String>,
    pub state_name: Option<String>,
    pub postal_code: Option<String>,
}

/// [`MemberRow`] plus the figures shown on list and detail screens.
#[derive(Debug, Clone, FromRow)]
pub struct MemberOverviewRow {
    #[sqlx(flatten)]
    pub member: MemberRow,
    pub height_cm: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
    pub bmi: Option<Decimal>,
    pub visit_days: i64,
    pub last_check_in: Option<OffsetDateTime>,
    pub plan_name: Option<String>,
    pub plan_start: Option<Date>,
    pub plan_end: Option<Date>,
    pub plan_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Metric {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub measured_at: OffsetDateTime,
    pub height_cm: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
    pub bmi: Option<Decimal>,
}

/// Lightweight row for assignment pickers.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberPick {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<Date>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
}

/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub dob: Option<Date>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub street_name: Option<String>,
    pub city_name: Option<String>,
    pub state_name: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressPatch {
    pub fn is_empty(&self) -> bool {
        self.street_name.is_none()
            && self.city_name.is_none()
            && self.state_name.is_none()
            && self.postal_code.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub plan: Option<String>,
    pub only_active: bool,
}
