use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct EquipmentRow {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub purchase_date: Option<Date>,
    pub last_maintenance_date: Option<Date>,
    pub next_maintenance_date: Option<Date>,
    pub created_at: OffsetDateTime,
}

/// Column values written on insert and on a full update.
#[derive(Debug, Clone)]
pub struct EquipmentFields {
    pub name: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub purchase_date: Option<Date>,
    pub last_maintenance_date: Option<Date>,
    pub next_maintenance_date: Option<Date>,
}

impl From<EquipmentRow> for EquipmentFields {
    fn from(row: EquipmentRow) -> Self {
        Self {
            name: row.name,
            category: row.category,
            quantity: row.quantity,
            purchase_date: row.purchase_date,
            last_maintenance_date: row.last_maintenance_date,
            next_maintenance_date: row.next_maintenance_date,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CategoryCount {
    pub name: Option<String>,
    pub count: i64,
}
