use serde::Serialize;
use time::{Date, Duration};

use crate::error::{AppError, AppResult};

pub const DEFAULT_NEXT_OFFSET_DAYS: i64 = 90;
pub const MAX_NEXT_OFFSET_DAYS: i64 = 3650;

/// Maintenance state, derived from `next_maintenance_date` on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentStatus {
    Operational,
    DueSoon,
    Overdue,
}

impl EquipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentStatus::Operational => "operational",
            EquipmentStatus::DueSoon => "due-soon",
            EquipmentStatus::Overdue => "overdue",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operational" => Ok(EquipmentStatus::Operational),
            "due-soon" => Ok(EquipmentStatus::DueSoon),
            "overdue" => Ok(EquipmentStatus::Overdue),
            _ => Err(AppError::validation("Status must be one of: operational, due-soon, overdue")),
        }
    }
}

/// Overdue once the date has passed; due soon within `window_days` of it.
pub fn maintenance_status(next: Option<Date>, today: Date, window_days: i64) -> EquipmentStatus {
    match next {
        Some(next) if next < today => EquipmentStatus::Overdue,
        Some(next) if (next - today).whole_days() <= window_days => EquipmentStatus::DueSoon,
        _ => EquipmentStatus::Operational,
    }
}

/// Dates written by a maintenance record. An explicit next date wins over the offset.
pub fn maintenance_dates(
    performed_on: Option<Date>,
    explicit_next: Option<Date>,
    offset_days: Option<i64>,
    today: Date,
) -> AppResult<(Date, Date)> {
    let last = performed_on.unwrap_or(today);
    let next = match explicit_next {
        Some(next) => next,
        None => {
            let offset = offset_days.unwrap_or(DEFAULT_NEXT_OFFSET_DAYS);
            if offset <= 0 {
                return Err(AppError::validation("next_offset_days must be positive"));
            }
            if offset > MAX_NEXT_OFFSET_DAYS {
                return Err(AppError::validation(format!(
                    "next_offset_days must be at most {MAX_NEXT_OFFSET_DAYS}"
                )));
            }
            last
                .checked_add(Duration::days(offset))
                .ok_or_else(|| AppError::validation("next_maintenance_date out of range"))?
        }
    };
    if next < last {
        return Err(AppError::validation(
            "next_maintenance_date must not precede the maintenance date",
        ));
    }
    Ok((last, next))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub operational: usize,
    pub due_soon: usize,
    pub overdue: usize,
}

pub fn count_statuses(next_dates: &[Option<Date>], today: Date, window_days: i64) -> StatusCounts {
    next_dates.iter().fold(
        StatusCounts {
            total: next_dates.len(),
            ..Default::default()
        },
        |mut counts, next| {
            match maintenance_status(*next, today, window_days) {
                EquipmentStatus::Operational => counts.operational += 1,
                EquipmentStatus::DueSoon => counts.due_soon += 1,
                EquipmentStatus::Overdue => counts.overdue += 1,
            }
            counts
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const TODAY: Date = date!(2024 - 06 - 10);

    #[test]
    fn status_boundaries() {
        assert_eq!(maintenance_status(None, TODAY, 7), EquipmentStatus::Operational);
        assert_eq!(maintenance_status(Some(date!(2024 - 06 - 09)), TODAY, 7), EquipmentStatus::Overdue);
        assert_eq!(maintenance_status(Some(TODAY), TODAY, 7), EquipmentStatus::DueSoon);
        assert_eq!(maintenance_status(Some(date!(2024 - 06 - 17)), TODAY, 7), EquipmentStatus::DueSoon);
        assert_eq!(maintenance_status(Some(date!(2024 - 06 - 18)), TODAY, 7), EquipmentStatus::Operational);
        assert_eq!(maintenance_status(Some(date!(2024 - 06 - 18)), TODAY, 30), EquipmentStatus::DueSoon);
    }

    #[test]
    fn explicit_next_date_wins() {
        let (last, next) = maintenance_dates(None, Some(date!(2024 - 07 - 01)), Some(10), TODAY).unwrap();
        assert_eq!(last, TODAY);
        assert_eq!(next, date!(2024 - 07 - 01));
    }

    #[test]
    fn offset_defaults_to_ninety_days() {
        let (last, next) = maintenance_dates(Some(date!(2024 - 01 - 01)), None, None, TODAY).unwrap();
        assert_eq!(last, date!(2024 - 01 - 01));
        assert_eq!(next, date!(2024 - 03 - 31));
        let (_, next) = maintenance_dates(None, None, Some(14), TODAY).unwrap();
        assert_eq!(next, date!(2024 - 06 - 24));
    }

    #[test]
    fn rejects_backwards_schedule() {
        assert!(maintenance_dates(None, Some(date!(2024 - 06 - 01)), None, TODAY).is_err());
        assert!(maintenance_dates(None, None, Some(0), TODAY).is_err());
    }

    #[test]
    fn oversized_offsets_are_validation_errors() {
        let err = maintenance_dates(None, None, Some(10_000_000), TODAY).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = maintenance_dates(Some(date!(9999 - 12 - 31)), None, None, TODAY).unwrap_err();
        assert_eq!(err.to_string(), "next_maintenance_date out of range");
        let (_, next) = maintenance_dates(None, None, Some(MAX_NEXT_OFFSET_DAYS), TODAY).unwrap();
        assert!(next > TODAY);
    }

    #[test]
    fn counts_by_status() {
        let dates = [None, Some(date!(2024 - 06 - 01)), Some(date!(2024 - 06 - 12)), Some(date!(2025 - 01 - 01))];
        let counts = count_statuses(&dates, TODAY, 7);
        assert_eq!(
            counts,
            StatusCounts {
                total: 4,
                operational: 2,
                due_soon: 1,
                overdue: 1
            }
        );
    }

    #[test]
    fn status_parse() {
        assert_eq!(EquipmentStatus::parse("Due-Soon").unwrap(), EquipmentStatus::DueSoon);
        assert!(EquipmentStatus::parse("broken").is_err());
    }
}
