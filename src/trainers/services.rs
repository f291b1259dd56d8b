use std::collections::BTreeSet;

use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::error::{AppError, AppResult};

const DEFAULT_SPECIALTIES: [&str; 13] = [
    "Boxing",
    "Cardio",
    "CrossFit",
    "Dance Fitness",
    "HIIT",
    "MMA",
    "Nutrition",
    "Pilates",
    "Rehabilitation",
    "Strength Training",
    "Weight Training",
    "Yoga",
    "Zumba",
];

/// Splits a stored "Yoga, HIIT" specialization into its parts.
pub fn split_specialties(specialization: Option<&str>) -> Vec<String> {
    specialization
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_specialties(items: &[String]) -> Option<String> {
    let joined = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// Every specialty in use plus the defaults, sorted and unique.
pub fn merge_specialties(stored: Vec<String>) -> Vec<String> {
    stored
        .iter()
        .flat_map(|s| split_specialties(Some(s)))
        .chain(DEFAULT_SPECIALTIES.iter().map(|s| s.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Salary is stored as a whole amount; fractions are dropped.
pub fn salary_from(raw: Decimal) -> AppResult<i64> {
    if raw.is_sign_negative() && !raw.is_zero() {
        return Err(AppError::validation("Salary must be non-negative"));
    }
    raw.trunc()
        .to_i64()
        .ok_or_else(|| AppError::validation("Invalid salary format"))
}

pub fn validate_rating(rating: f64) -> AppResult<()> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(AppError::validation("Rating must be between 0 and 5"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialties_split_and_join() {
        assert_eq!(split_specialties(Some("Yoga, HIIT,,")), vec!["Yoga", "HIIT"]);
        assert!(split_specialties(None).is_empty());
        assert_eq!(
            join_specialties(&["Yoga".into(), " ".into(), "Boxing".into()]).as_deref(),
            Some("Yoga, Boxing")
        );
        assert_eq!(join_specialties(&[]), None);
    }

    #[test]
    fn merged_specialties_are_unique() {
        let merged = merge_specialties(vec!["Yoga, Kettlebell".into()]);
        assert!(merged.contains(&"Kettlebell".to_string()));
        assert_eq!(merged.iter().filter(|s| *s == "Yoga").count(), 1);
    }

    #[test]
    fn salary_rules() {
        assert_eq!(salary_from("45000.75".parse().unwrap()).unwrap(), 45000);
        assert_eq!(salary_from(Decimal::ZERO).unwrap(), 0);
        assert!(salary_from("-1".parse().unwrap()).is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(4.5).is_ok());
        assert!(validate_rating(5.5).is_err());
    }
}
