use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub plan_type: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal_count: Option<i32>,
    pub created_by: Option<Uuid>,
    pub trainer_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A member linked to a plan; `plan_id` says which plan when loaded in bulk.
#[derive(Debug, Clone, FromRow)]
pub struct LinkedMember {
    pub plan_id: Uuid,
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkedEquipment {
    pub plan_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
}

/// A plan as seen from the member it is assigned to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedPlan {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub plan_type: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal_count: Option<i32>,
    pub created_by: Option<Uuid>,
    pub trainer_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub owner: Option<Uuid>,
    pub search: Option<String>,
    pub plan_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlanFields {
    pub name: String,
    pub plan_type: Option<String>,
    pub description: Option<String>,
    pub kcal_count: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TypeCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainerPlanCount {
    pub trainer_name: String,
    pub plan_count: i64,
}
