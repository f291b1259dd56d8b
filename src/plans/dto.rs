use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use uuid::Uuid;

use super::{
    repo_types::{PlanRow, TrainerPlanCount, TypeCount},
    services::PlanKind,
};
use crate::{common::PageMeta, members::repo_types::MemberPick};

/// Members may be referenced by bare id or by `{ "id": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Plain(String),
    Object { id: String },
}

impl IdRef {
    pub fn into_raw(self) -> String {
        match self {
            IdRef::Plain(id) | IdRef::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub plan_type: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "total_calories")]
    pub kcal_count: Option<i32>,
    pub created_by: Option<String>,
    pub assigned_members: Option<Vec<IdRef>>,
    pub equipment_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub plan_type: Option<String>,
    pub created_by: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MemberSearchQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanMemberView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEquipmentView {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: PlanRow,
    pub assigned_members: Vec<PlanMemberView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<Vec<PlanEquipmentView>>,
}

/// One plan under its kind's key, e.g. `{"workout_plan": {...}}`.
pub struct PlanEnvelope {
    pub kind: PlanKind,
    pub message: Option<&'static str>,
    pub plan: PlanView,
}

impl Serialize for PlanEnvelope {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(None)?;
        if let Some(message) = self.message {
            map.serialize_entry("message", message)?;
        }
        map.serialize_entry(self.kind.key(), &self.plan)?;
        map.end()
    }
}

pub struct PlanPage {
    pub kind: PlanKind,
    pub plans: Vec<PlanView>,
    pub meta: PageMeta,
}

impl Serialize for PlanPage {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(5))?;
        map.serialize_entry(self.kind.plural_key(), &self.plans)?;
        map.serialize_entry("total", &self.meta.total)?;
        map.serialize_entry("page", &self.meta.page)?;
        map.serialize_entry("limit", &self.meta.limit)?;
        map.serialize_entry("pages", &self.meta.pages)?;
        map.end()
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PlanTypesResponse {
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanStatistics {
    pub total_plans: i64,
    pub plans_by_type: Vec<TypeCount>,
    pub total_assigned_members: i64,
    pub avg_members_per_plan: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_calories: Option<f64>,
    pub by_trainer: Vec<TrainerPlanCount>,
}

#[derive(Debug, Serialize)]
pub struct PlanStatisticsResponse {
    pub statistics: PlanStatistics,
}

#[derive(Debug, Serialize)]
pub struct AvailableMembersResponse {
    pub members: Vec<MemberPick>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn view() -> PlanView {
        PlanView {
            plan: PlanRow {
                id: Uuid::nil(),
                name: "Push day".into(),
                plan_type: Some("strength".into()),
                description: None,
                kcal_count: None,
                created_by: None,
                trainer_name: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            assigned_members: vec![],
            equipment: None,
        }
    }

    #[test]
    fn envelope_uses_kind_key() {
        let json = serde_json::to_value(PlanEnvelope {
            kind: PlanKind::Workout,
            message: Some("Workout plan created successfully"),
            plan: view(),
        })
        .unwrap();
        assert_eq!(json["workout_plan"]["name"], "Push day");
        assert_eq!(json["workout_plan"]["type"], "strength");
        assert!(json["workout_plan"].get("kcal_count").is_none());
        assert_eq!(json["message"], "Workout plan created successfully");
    }

    #[test]
    fn page_flattens_meta() {
        let json = serde_json::to_value(PlanPage {
            kind: PlanKind::Diet,
            plans: vec![view()],
            meta: PageMeta { total: 1, page: 1, limit: 20, pages: 1 },
        })
        .unwrap();
        assert_eq!(json["diet_plans"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["pages"], 1);
    }

    #[test]
    fn member_refs_accept_both_shapes() {
        let refs: Vec<IdRef> = serde_json::from_str(r#"["a", {"id": "b"}]"#).unwrap();
        let raw: Vec<String> = refs.into_iter().map(IdRef::into_raw).collect();
        assert_eq!(raw, vec!["a", "b"]);
    }
}
