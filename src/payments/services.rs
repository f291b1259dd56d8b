use std::collections::BTreeSet;

use time::{Date, Duration, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const COMMON_MODES: [&str; 6] = ["Cash", "Credit Card", "Debit Card", "Bank Transfer", "UPI", "Check"];

/// First eight hex digits of the payment id, upper-cased.
pub fn receipt_number(id: Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Year,
}

impl Period {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim).unwrap_or("month") {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            _ => Err(AppError::validation("Invalid period. Use week, month, or year")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
        }
    }

    pub fn start_from(self, today: Date) -> Date {
        today - Duration::days(self.days())
    }
}

pub fn start_of_day(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

/// Exclusive upper bound covering all of `date`. The last calendar day
/// ends at its final representable instant.
pub fn end_of_day_exclusive(date: Date) -> OffsetDateTime {
    match date.next_day() {
        Some(next) => start_of_day(next),
        None => date.with_time(Time::MAX).assume_utc(),
    }
}

/// Stored modes plus the common ones, sorted and de-duplicated.
pub fn merge_modes(stored: Vec<String>) -> Vec<String> {
    let mut all: BTreeSet<String> = stored.into_iter().collect();
    all.extend(COMMON_MODES.iter().map(|m| m.to_string()));
    all.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn receipt_is_first_eight_hex_upper() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        assert_eq!(receipt_number(id), "A1B2C3D4");
    }

    #[test]
    fn periods() {
        assert_eq!(Period::parse(None).unwrap(), Period::Month);
        assert_eq!(Period::parse(Some("year")).unwrap().days(), 365);
        assert!(Period::parse(Some("decade")).is_err());
        assert_eq!(Period::Week.start_from(date!(2024 - 03 - 08)), date!(2024 - 03 - 01));
    }

    #[test]
    fn day_bounds() {
        assert_eq!(start_of_day(date!(2024 - 03 - 08)), datetime!(2024-03-08 0:00 UTC));
        assert_eq!(end_of_day_exclusive(date!(2024 - 03 - 08)), datetime!(2024-03-09 0:00 UTC));
        assert_eq!(end_of_day_exclusive(Date::MAX).date(), Date::MAX);
    }

    #[test]
    fn modes_merge_without_duplicates() {
        let merged = merge_modes(vec!["Cash".into(), "Wallet".into()]);
        assert_eq!(merged.iter().filter(|m| *m == "Cash").count(), 1);
        assert!(merged.contains(&"Wallet".to_string()));
        assert!(merged.contains(&"UPI".to_string()));
        let mut sorted = merged.clone();
        sorted.sort();
        assert_eq!(merged, sorted);
    }
}
