use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::EquipmentRow,
    services::{maintenance_status, EquipmentStatus, StatusCounts},
};
use crate::common::{iso_date, PageMeta};

/// Keeps an explicit `null` apart from an absent key.
fn present<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(d).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct EquipmentQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i32>,
    pub purchase_date: Option<String>,
    pub last_maintenance_date: Option<String>,
    pub next_maintenance_date: Option<String>,
}

/// Dates sent as `null` are cleared; absent keys are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
    pub quantity: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    pub purchase_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_maintenance_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub next_maintenance_date: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceRequest {
    pub maintenance_date: Option<String>,
    pub next_maintenance_date: Option<String>,
    pub next_offset_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EquipmentView {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i32,
    #[serde(with = "iso_date::option")]
    pub purchase_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub last_maintenance_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub next_maintenance_date: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: EquipmentStatus,
}

impl EquipmentView {
    pub fn from_row(row: EquipmentRow, today: Date, window_days: i64) -> Self {
        Self {
            status: maintenance_status(row.next_maintenance_date, today, window_days),
            id: row.id,
            name: row.name,
            category: row.category,
            quantity: row.quantity,
            purchase_date: row.purchase_date,
            last_maintenance_date: row.last_maintenance_date,
            next_maintenance_date: row.next_maintenance_date,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EquipmentListResponse {
    pub equipment: Vec<EquipmentView>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct EquipmentResponse {
    pub equipment: EquipmentView,
}

#[derive(Debug, Serialize)]
pub struct EquipmentSavedResponse {
    pub message: &'static str,
    pub equipment: EquipmentView,
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub name: Option<String>,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Serialize)]
pub struct EquipmentStatsResponse {
    pub stats: StatusCounts,
    pub maintenance_window_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent() {
        let req: UpdateEquipmentRequest =
            serde_json::from_str(r#"{"purchase_date": null, "next_maintenance_date": "2024-09-01"}"#).unwrap();
        assert_eq!(req.purchase_date, Some(None));
        assert_eq!(req.next_maintenance_date, Some(Some("2024-09-01".into())));
        assert_eq!(req.last_maintenance_date, None);
        assert_eq!(req.category, None);
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(EquipmentStatus::DueSoon).unwrap(), "due-soon");
    }
}
