use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AttendanceListResponse, AttendanceQuery, AttendanceReportResponse, AttendanceStatsQuery,
        AttendanceStatsResponse, AttendanceView, CheckInResponse, CheckInView, CheckOutResponse,
        CheckOutView, CheckRequest, CurrentMember, CurrentResponse, DailyAttendance, MemberRateInfo,
        MemberVisitSummary, MostActiveDay, OverallStatsResponse, PeakHour, ReportQuery, ReportSummary,
    },
    repo::{self, AttendanceFilter},
    services::{round1, whole_minutes, SessionSummary},
};
use crate::{
    auth::{CurrentUser, Role},
    common::{
        clean, dates::format_date, parse_date, parse_id, today, ApiJson, ApiQuery, DateRange, Page,
    },
    error::{AppError, AppResult},
    members::{repo as member_repo, services::attendance_percentage},
    memberships::services::full_name,
    payments::services::{end_of_day_exclusive, start_of_day, Period},
    state::AppState,
    trainers::repo as trainer_repo,
};

/// Window used by the overall attendance figure.
const OVERALL_WINDOW_DAYS: i64 = 30;
const REPORT_DEFAULT_DAYS: i64 = 30;

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attendance))
        .route("/check-in", post(check_in))
        .route("/check-out", post(check_out))
        .route("/current", get(current_attendance))
        .route("/stats", get(attendance_stats))
        .route("/report", get(attendance_report))
        .route("/overall-stats", get(overall_stats))
}

/// Members act on themselves; staff must name the member.
fn target_member(user: &CurrentUser, requested: Option<String>) -> AppResult<Uuid> {
    let requested = clean(requested).map(|s| parse_id(&s, "member")).transpose()?;
    match user.role {
        Role::Member => {
            let own = user.own_member_id()?;
            if requested.is_some_and(|id| id != own) {
                warn!(user_id = %user.user_id, "member tried to act on another member");
                return Err(AppError::forbidden());
            }
            Ok(own)
        }
        Role::Admin | Role::Trainer => requested.ok_or_else(|| AppError::validation("member_id is required")),
    }
}

fn date_param(raw: Option<String>, field: &str) -> AppResult<Option<time::Date>> {
    clean(raw)
        .map(|s| parse_date(&s))
        .transpose()
        .map_err(|_| AppError::validation(format!("Invalid {field} format. Use YYYY-MM-DD")))
}

#[instrument(skip(state, user))]
pub async fn list_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<AttendanceQuery>,
) -> AppResult<Json<AttendanceListResponse>> {
    let member_id = clean(q.member_id).map(|s| parse_id(&s, "member")).transpose()?;
    let trainer_id = clean(q.trainer_id).map(|s| parse_id(&s, "trainer")).transpose()?;

    let mut filter = AttendanceFilter {
        member_id,
        trainer_id,
        from: date_param(q.start_date, "start_date")?.map(start_of_day),
        until: date_param(q.end_date, "end_date")?.map(end_of_day_exclusive),
    };
    match user.role {
        Role::Member => {
            let own = user.own_member_id()?;
            if member_id.is_some_and(|id| id != own) {
                return Err(AppError::forbidden());
            }
            filter.member_id = Some(own);
        }
        // Without an explicit filter a trainer sees the sessions they supervised.
        Role::Trainer if member_id.is_none() && trainer_id.is_none() => {
            filter.trainer_id = Some(user.own_trainer_id()?);
        }
        Role::Trainer | Role::Admin => {}
    }
    let page = Page::new(q.page, q.limit);

    let mut conn = state.db.acquire().await?;
    let (rows, total) = repo::list(&mut conn, &filter, page.limit, page.offset()).await?;

    Ok(Json(AttendanceListResponse {
        attendance: rows.into_iter().map(AttendanceView::from_row).collect(),
        meta: page.meta(total),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn check_in(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Option<ApiJson<CheckRequest>>,
) -> AppResult<(StatusCode, Json<CheckInResponse>)> {
    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();
    let member_id = target_member(&user, payload.member_id)?;
    let trainer_id = clean(payload.trainer_id).map(|s| parse_id(&s, "trainer")).transpose()?;

    let mut tx = state.db.begin().await?;
    if !member_repo::exists(&mut tx, member_id).await? {
        return Err(AppError::not_found("Member not found"));
    }
    if let Some(open) = repo::open_session(&mut tx, member_id).await? {
        warn!(member_id = %member_id, since = %open.check_in, "member already checked in");
        return Err(AppError::conflict("Member is already checked in"));
    }
    if let Some(trainer_id) = trainer_id {
        if !trainer_repo::exists(&mut tx, trainer_id).await? {
            return Err(AppError::not_found("Trainer not found"));
        }
    }

    let id = repo::insert_check_in(&mut tx, member_id, trainer_id, OffsetDateTime::now_utc()).await?;
    let row = repo::find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))?;
    tx.commit().await?;

    info!(attendance_id = %id, member_id = %member_id, "member checked in");
    let view = AttendanceView::from_row(row);
    Ok((
        StatusCode::CREATED,
        Json(CheckInResponse {
            message: "Check-in recorded successfully",
            attendance: CheckInView {
                id: view.id,
                member_id: view.member_id,
                member_name: view.member_name,
                trainer_name: view.trainer_name,
                check_in: view.check_in,
            },
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn check_out(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Option<ApiJson<CheckRequest>>,
) -> AppResult<Json<CheckOutResponse>> {
    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();
    let member_id = target_member(&user, payload.member_id)?;

    let mut tx = state.db.begin().await?;
    let open = repo::open_session(&mut tx, member_id)
        .await?
        .ok_or_else(|| AppError::not_found("No active check-in found for this member"))?;
    let now = OffsetDateTime::now_utc();
    repo::close_session(&mut tx, open.id, now).await?;
    tx.commit().await?;

    let duration_minutes = whole_minutes(open.check_in, now);
    info!(attendance_id = %open.id, member_id = %member_id, duration_minutes, "member checked out");
    Ok(Json(CheckOutResponse {
        message: "Check-out recorded successfully",
        attendance: CheckOutView {
            id: open.id,
            member_id: open.member_id,
            check_in: open.check_in,
            check_out: now,
            duration_minutes,
        },
    }))
}

#[instrument(skip(state, user))]
pub async fn current_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<CurrentResponse>> {
    user.require(&[Role::Admin, Role::Trainer])?;

    let mut conn = state.db.acquire().await?;
    let now = OffsetDateTime::now_utc();
    let current_members: Vec<CurrentMember> = repo::open_sessions(&mut conn)
        .await?
        .into_iter()
        .map(|row| CurrentMember::from_row(row, now))
        .collect();

    Ok(Json(CurrentResponse {
        total_current: current_members.len(),
        current_members,
    }))
}

#[instrument(skip(state, user))]
pub async fn attendance_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<AttendanceStatsQuery>,
) -> AppResult<Json<AttendanceStatsResponse>> {
    let member_id = if user.is(Role::Member) {
        Some(user.own_member_id()?)
    } else {
        clean(q.member_id).map(|s| parse_id(&s, "member")).transpose()?
    };
    let period = Period::parse(q.period.as_deref())?;
    let today = today();
    let start_date = period.start_from(today);

    let mut conn = state.db.acquire().await?;
    let sessions = repo::sessions_since(&mut conn, member_id, start_of_day(start_date)).await?;
    let summary = SessionSummary::from_sessions(&sessions);

    let member_info = match member_id {
        Some(id) => member_repo::find(&mut conn, id).await?.map(|m| MemberRateInfo {
            member_name: full_name(m.first_name.as_deref(), m.last_name.as_deref()),
            unique_visit_days: summary.unique_days(),
            attendance_rate: attendance_percentage(summary.unique_days(), period.days()),
        }),
        None => None,
    };
    let most_active = summary.most_active_day();
    let weekly_pattern = match period {
        Period::Week => Default::default(),
        Period::Month | Period::Year => summary.weekday_visits.clone(),
    };

    Ok(Json(AttendanceStatsResponse {
        period: period.as_str(),
        date_range: DateRange {
            start_date,
            end_date: today,
        },
        total_visits: summary.total_visits,
        total_workout_hours: round1(summary.total_hours()),
        average_session_minutes: round1(summary.average_minutes()),
        most_active_day: MostActiveDay {
            date: most_active.map(|(day, _)| day),
            visits: most_active.map(|(_, visits)| visits).unwrap_or(0),
        },
        weekly_pattern,
        daily_visits: summary
            .daily_visits
            .iter()
            .map(|(day, visits)| (format_date(*day), *visits))
            .collect(),
        member_info,
    }))
}

#[instrument(skip(state, user))]
pub async fn attendance_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<ReportQuery>,
) -> AppResult<Json<AttendanceReportResponse>> {
    user.require(&[Role::Admin])?;

    let today = today();
    let start_date = date_param(q.start_date, "start_date")?.unwrap_or(today - Duration::days(REPORT_DEFAULT_DAYS));
    let end_date = date_param(q.end_date, "end_date")?.unwrap_or(today);
    if end_date < start_date {
        return Err(AppError::validation("end_date must not be before start_date"));
    }
    let (from, until) = (start_of_day(start_date), end_of_day_exclusive(end_date));

    let mut conn = state.db.acquire().await?;
    let visits = repo::visits_by_member(&mut conn, from, until).await?;
    let daily = repo::daily_counts(&mut conn, from, until).await?;
    let hourly = repo::hourly_counts(&mut conn, from, until).await?;

    let total_minutes: f64 = visits.iter().map(|v| v.total_minutes).sum();
    let summary = ReportSummary {
        total_visits: visits.iter().map(|v| v.visit_count).sum(),
        unique_members: visits.len(),
        total_workout_hours: round1(total_minutes / 60.0),
    };
    let member_summary = visits
        .into_iter()
        .map(|v| {
            let hours = v.total_minutes / 60.0;
            MemberVisitSummary {
                member_id: v.member_id,
                member_name: full_name(v.first_name.as_deref(), v.last_name.as_deref()),
                visit_count: v.visit_count,
                total_hours: round1(hours),
                avg_session_hours: if v.visit_count > 0 {
                    round1(hours / v.visit_count as f64)
                } else {
                    0.0
                },
            }
        })
        .collect();

    Ok(Json(AttendanceReportResponse {
        report_period: DateRange { start_date, end_date },
        summary,
        member_summary,
        daily_attendance: daily
            .into_iter()
            .map(|d| DailyAttendance {
                date: d.day,
                visits: d.visits,
            })
            .collect(),
        peak_hours: hourly
            .into_iter()
            .map(|h| PeakHour {
                hour: h.hour,
                visits: h.visits,
            })
            .collect(),
    }))
}

#[instrument(skip(state, _user))]
pub async fn overall_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<OverallStatsResponse>> {
    let mut conn = state.db.acquire().await?;
    let total_active_members = repo::active_member_count(&mut conn).await?;
    let since = OffsetDateTime::now_utc() - Duration::days(OVERALL_WINDOW_DAYS);
    let attended = repo::distinct_members_since(&mut conn, since).await?;

    Ok(Json(OverallStatsResponse {
        average_attendance: attendance_percentage(attended, total_active_members),
        total_active_members,
        members_attended_last_30_days: attended,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            user_id: Uuid::new_v4(),
            email: "x@gym.test".into(),
            role,
            member_id: (role == Role::Member).then(Uuid::new_v4),
            trainer_id: (role == Role::Trainer).then(Uuid::new_v4),
        }
    }

    #[test]
    fn members_target_themselves() {
        let member = user(Role::Member);
        let own = member.member_id.unwrap();
        assert_eq!(target_member(&member, None).unwrap(), own);
        assert_eq!(target_member(&member, Some(own.to_string())).unwrap(), own);
        assert!(matches!(
            target_member(&member, Some(Uuid::new_v4().to_string())),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn staff_must_name_a_member() {
        let trainer = user(Role::Trainer);
        assert!(matches!(target_member(&trainer, None), Err(AppError::Validation(_))));
        assert!(matches!(
            target_member(&trainer, Some("nope".into())),
            Err(AppError::Validation(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(target_member(&user(Role::Admin), Some(id.to_string())).unwrap(), id);
    }
}
