use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{repo_types::TrainerRow, services::split_specialties};
use crate::{common::iso_date, memberships::services::full_name};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainerSummary {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub is_active: bool,
}

/// Specialties arrive either as a list or as one comma separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Specialties {
    List(Vec<String>),
    Joined(String),
}

impl Specialties {
    pub fn into_list(self) -> Vec<String> {
        match self {
            Specialties::List(items) => items,
            Specialties::Joined(s) => split_specialties(Some(&s)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrainerListQuery {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrainerRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub specialties: Option<Specialties>,
    pub experience: Option<i32>,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub salary: Option<i64>,
    pub rating: Option<f64>,
    pub total_clients: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrainerRequest {
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    #[serde(alias = "specialties")]
    pub specialization: Option<Specialties>,
    #[serde(alias = "experience")]
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub phone: Option<String>,
    pub salary: Option<i64>,
    pub rating: Option<f64>,
    #[serde(alias = "totalClients")]
    pub total_clients: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SalaryRequest {
    pub salary: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainerView {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub specialties: Vec<String>,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub rating: f64,
    pub total_clients: i32,
    /// Only present for admins and the trainer themself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<i64>,
    pub status: &'static str,
    pub is_active: bool,
    #[serde(with = "iso_date")]
    pub join_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TrainerView {
    pub fn from_row(row: TrainerRow, show_salary: bool) -> Self {
        Self {
            full_name: full_name(row.first_name.as_deref(), row.last_name.as_deref()),
            specialties: split_specialties(row.specialization.as_deref()),
            salary: show_salary.then_some(row.salary),
            status: if row.is_active { "active" } else { "inactive" },
            join_date: row.created_at.date(),
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            gender: row.gender,
            experience_years: row.experience_years,
            bio: row.bio,
            availability: row.availability,
            rating: row.rating,
            total_clients: row.total_clients,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrainerListResponse {
    pub trainers: Vec<TrainerView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct TrainerResponse {
    pub trainer: TrainerView,
}

#[derive(Debug, Serialize)]
pub struct TrainerSavedResponse {
    pub message: &'static str,
    pub trainer: TrainerView,
}

#[derive(Debug, Serialize)]
pub struct TrainerStats {
    pub active_trainers: i64,
    pub avg_rating: f64,
    pub sessions_today: i64,
    pub total_clients: i64,
}

#[derive(Debug, Serialize)]
pub struct TrainerStatsResponse {
    pub stats: TrainerStats,
}

#[derive(Debug, Serialize)]
pub struct SpecialtiesResponse {
    pub specialties: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row() -> TrainerRow {
        TrainerRow {
            id: Uuid::nil(),
            user_id: None,
            first_name: Some("Ravi".into()),
            last_name: Some("K".into()),
            gender: None,
            specialization: Some("Yoga, HIIT".into()),
            experience_years: 4,
            bio: None,
            availability: Some("Mornings".into()),
            salary: 40000,
            rating: 4.5,
            total_clients: 12,
            is_active: true,
            created_at: datetime!(2023-03-05 10:00 UTC),
            email: None,
            phone: None,
        }
    }

    #[test]
    fn salary_hidden_unless_allowed() {
        let json = serde_json::to_value(TrainerView::from_row(row(), false)).unwrap();
        assert!(json.get("salary").is_none());
        assert_eq!(json["specialties"], serde_json::json!(["Yoga", "HIIT"]));
        assert_eq!(json["join_date"], "2023-03-05");

        let json = serde_json::to_value(TrainerView::from_row(row(), true)).unwrap();
        assert_eq!(json["salary"], 40000);
    }

    #[test]
    fn specialties_accept_string_or_list() {
        let req: CreateTrainerRequest =
            serde_json::from_str(r#"{"firstName":"A","lastName":"B","specialties":"Yoga, Boxing"}"#).unwrap();
        assert_eq!(req.specialties.map(Specialties::into_list).unwrap(), vec!["Yoga", "Boxing"]);
    }
}
