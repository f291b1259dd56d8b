use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;
use crate::{members::dto::MemberSummary, trainers::dto::TrainerSummary};

/// Request body for account signup. Field names follow the web client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub experience: Option<i32>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Member(MemberSummary),
    Trainer(TrainerSummary),
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

/// Response returned after signup, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
}
