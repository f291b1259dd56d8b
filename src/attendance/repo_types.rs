use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// One attendance row with the member and trainer names joined in.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceRow {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub member_first_name: Option<String>,
    pub member_last_name: Option<String>,
    pub trainer_id: Option<Uuid>,
    pub trainer_first_name: Option<String>,
    pub trainer_last_name: Option<String>,
    pub check_in: OffsetDateTime,
    pub check_out: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub member_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub from: Option<OffsetDateTime>,
    /// Exclusive.
    pub until: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct Session {
    pub check_in: OffsetDateTime,
    pub check_out: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberVisits {
    pub member_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub visit_count: i64,
    pub total_minutes: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyCount {
    pub day: Date,
    pub visits: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct HourlyCount {
    pub hour: i32,
    pub visits: i64,
}
