use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::AttendanceRow,
    services::{elapsed_label, whole_minutes},
};
use crate::{
    common::{iso_date, DateRange, PageMeta},
    memberships::services::full_name,
};

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub member_id: Option<String>,
    pub trainer_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    pub member_id: Option<String>,
    pub trainer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceStatsQuery {
    pub period: Option<String>,
    pub member_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn names(first: Option<&str>, last: Option<&str>, id: Option<Uuid>) -> Option<String> {
    id.map(|_| full_name(first, last))
}

#[derive(Debug, Serialize)]
pub struct AttendanceView {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub member_name: Option<String>,
    pub trainer_id: Option<Uuid>,
    pub trainer_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub check_out: Option<OffsetDateTime>,
    pub duration_minutes: Option<i64>,
    /// Still checked in.
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AttendanceView {
    pub fn from_row(row: AttendanceRow) -> Self {
        Self {
            member_name: names(row.member_first_name.as_deref(), row.member_last_name.as_deref(), row.member_id),
            trainer_name: names(row.trainer_first_name.as_deref(), row.trainer_last_name.as_deref(), row.trainer_id),
            duration_minutes: row.check_out.map(|out| whole_minutes(row.check_in, out)),
            is_active: row.check_out.is_none(),
            id: row.id,
            member_id: row.member_id,
            trainer_id: row.trainer_id,
            check_in: row.check_in,
            check_out: row.check_out,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttendanceListResponse {
    pub attendance: Vec<AttendanceView>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct CheckInView {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub member_name: Option<String>,
    pub trainer_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub message: &'static str,
    pub attendance: CheckInView,
}

#[derive(Debug, Serialize)]
pub struct CheckOutView {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub check_out: OffsetDateTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckOutResponse {
    pub message: &'static str,
    pub attendance: CheckOutView,
}

#[derive(Debug, Serialize)]
pub struct CurrentMember {
    pub attendance_id: Uuid,
    pub member_id: Option<Uuid>,
    pub member_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    pub time_since_checkin: String,
    pub trainer_name: Option<String>,
}

impl CurrentMember {
    pub fn from_row(row: AttendanceRow, now: OffsetDateTime) -> Self {
        Self {
            attendance_id: row.id,
            member_name: names(row.member_first_name.as_deref(), row.member_last_name.as_deref(), row.member_id),
            trainer_name: names(row.trainer_first_name.as_deref(), row.trainer_last_name.as_deref(), row.trainer_id),
            time_since_checkin: elapsed_label(now - row.check_in),
            member_id: row.member_id,
            check_in: row.check_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    pub current_members: Vec<CurrentMember>,
    pub total_current: usize,
}

#[derive(Debug, Serialize)]
pub struct MostActiveDay {
    #[serde(with = "iso_date::option")]
    pub date: Option<Date>,
    pub visits: i64,
}

#[derive(Debug, Serialize)]
pub struct MemberRateInfo {
    pub member_name: String,
    pub unique_visit_days: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct AttendanceStatsResponse {
    pub period: &'static str,
    pub date_range: DateRange,
    pub total_visits: usize,
    pub total_workout_hours: f64,
    pub average_session_minutes: f64,
    pub most_active_day: MostActiveDay,
    pub weekly_pattern: BTreeMap<String, i64>,
    /// Keyed by `YYYY-MM-DD`.
    pub daily_visits: BTreeMap<String, i64>,
    pub member_info: Option<MemberRateInfo>,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub total_visits: i64,
    pub unique_members: usize,
    pub total_workout_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct MemberVisitSummary {
    pub member_id: Uuid,
    pub member_name: String,
    pub visit_count: i64,
    pub total_hours: f64,
    pub avg_session_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct DailyAttendance {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub visits: i64,
}

#[derive(Debug, Serialize)]
pub struct PeakHour {
    pub hour: i32,
    pub visits: i64,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReportResponse {
    pub report_period: DateRange,
    pub summary: ReportSummary,
    pub member_summary: Vec<MemberVisitSummary>,
    pub daily_attendance: Vec<DailyAttendance>,
    pub peak_hours: Vec<PeakHour>,
}

#[derive(Debug, Serialize)]
pub struct OverallStatsResponse {
    pub average_attendance: f64,
    pub total_active_members: i64,
    pub members_attended_last_30_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(check_out: Option<OffsetDateTime>) -> AttendanceRow {
        AttendanceRow {
            id: Uuid::nil(),
            member_id: Some(Uuid::nil()),
            member_first_name: Some("Asha".into()),
            member_last_name: Some("Rao".into()),
            trainer_id: None,
            trainer_first_name: None,
            trainer_last_name: None,
            check_in: datetime!(2024-01-01 9:00 UTC),
            check_out,
            created_at: datetime!(2024-01-01 9:00 UTC),
        }
    }

    #[test]
    fn open_rows_are_active_without_duration() {
        let json = serde_json::to_value(AttendanceView::from_row(row(None))).unwrap();
        assert_eq!(json["is_active"], true);
        assert!(json["duration_minutes"].is_null());
        assert!(json["trainer_name"].is_null());
        assert_eq!(json["member_name"], "Asha Rao");
    }

    #[test]
    fn closed_rows_carry_minutes() {
        let view = AttendanceView::from_row(row(Some(datetime!(2024-01-01 10:30:45 UTC))));
        assert_eq!(view.duration_minutes, Some(90));
        assert!(!view.is_active);
    }

    #[test]
    fn current_member_elapsed() {
        let current = CurrentMember::from_row(row(None), datetime!(2024-01-01 11:15 UTC));
        assert_eq!(current.time_since_checkin, "2h 15m");
    }
}
