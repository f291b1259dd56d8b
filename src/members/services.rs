use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    memberships::services::MembershipStatus,
};

/// Days looked back when computing a member's attendance percentage.
pub const ATTENDANCE_WINDOW_DAYS: i64 = 30;

/// Metrics rows returned with a member's detail view.
pub const DETAIL_METRICS: i64 = 10;

/// weight / (height in metres)^2, two decimals. Needs both measurements.
pub fn bmi(height_cm: Option<Decimal>, weight_kg: Option<Decimal>) -> Option<Decimal> {
    let (height, weight) = (height_cm?, weight_kg?);
    if height <= Decimal::ZERO {
        return None;
    }
    let metres = height / Decimal::ONE_HUNDRED;
    Some((weight / (metres * metres)).round_dp(2))
}

pub fn validate_metrics(height_cm: Option<Decimal>, weight_kg: Option<Decimal>) -> AppResult<()> {
    if height_cm.is_none() && weight_kg.is_none() {
        return Err(AppError::validation("At least height or weight is required"));
    }
    if height_cm.is_some_and(|h| h <= Decimal::ZERO) || weight_kg.is_some_and(|w| w <= Decimal::ZERO) {
        return Err(AppError::validation("Height and weight must be positive"));
    }
    Ok(())
}

/// Share of days in the window with at least one visit, one decimal.
pub fn attendance_percentage(visit_days: i64, window_days: i64) -> f64 {
    if window_days <= 0 {
        return 0.0;
    }
    (visit_days as f64 / window_days as f64 * 1000.0).round() / 10.0
}

/// "Gold" for a running plan, "Gold (Expired)" otherwise.
pub fn membership_label(plan_name: Option<&str>, status: Option<MembershipStatus>) -> String {
    match (plan_name, status) {
        (Some(name), Some(MembershipStatus::Active)) => name.to_string(),
        (Some(name), Some(status)) => {
            let s = status.as_str();
            let mut chars = s.chars();
            let title = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            format!("{name} ({title})")
        }
        (Some(name), None) => name.to_string(),
        (None, _) => "No Plan History".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn bmi_needs_both_values() {
        assert_eq!(bmi(Some(dec("180")), Some(dec("81"))), Some(dec("25.00")));
        assert_eq!(bmi(Some(dec("175")), Some(dec("70"))), Some(dec("22.86")));
        assert_eq!(bmi(None, Some(dec("70"))), None);
        assert_eq!(bmi(Some(dec("0")), Some(dec("70"))), None);
    }

    #[test]
    fn metrics_validation() {
        assert!(validate_metrics(None, None).is_err());
        assert!(validate_metrics(Some(dec("-1")), None).is_err());
        assert!(validate_metrics(None, Some(dec("60"))).is_ok());
    }

    #[test]
    fn attendance_rounds_to_one_decimal() {
        assert_eq!(attendance_percentage(10, 30), 33.3);
        assert_eq!(attendance_percentage(30, 30), 100.0);
        assert_eq!(attendance_percentage(0, 30), 0.0);
        assert_eq!(attendance_percentage(3, 0), 0.0);
    }

    #[test]
    fn labels() {
        assert_eq!(membership_label(None, None), "No Plan History");
        assert_eq!(membership_label(Some("Gold"), Some(MembershipStatus::Active)), "Gold");
        assert_eq!(
            membership_label(Some("Gold"), Some(MembershipStatus::Expired)),
            "Gold (Expired)"
        );
    }
}
