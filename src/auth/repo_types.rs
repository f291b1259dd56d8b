use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record joined with its role name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 hash, not exposed in JSON
    pub role: String,               // lower-case role name
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Everything authorization needs about the caller, re-read on every request.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub role: String,
    pub member_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
}
