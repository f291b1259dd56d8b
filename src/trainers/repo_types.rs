use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct TrainerRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub salary: i64,
    pub rating: f64,
    pub total_clients: i32,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTrainer {
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub salary: i64,
    pub rating: f64,
    pub total_clients: i32,
}

/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct TrainerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub availability: Option<String>,
    pub salary: Option<i64>,
    pub rating: Option<f64>,
    pub total_clients: Option<i32>,
    pub is_active: Option<bool>,
}

impl TrainerPatch {
    /// Compensation and standing fields only an admin may set.
    pub fn touches_admin_fields(&self) -> bool {
        self.salary.is_some() || self.rating.is_some() || self.total_clients.is_some() || self.is_active.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrainerFilter {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TrainerTotals {
    pub active_trainers: i64,
    pub avg_rating: f64,
    pub total_clients: i64,
}
