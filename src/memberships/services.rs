use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::{fmt, str::FromStr};
use time::{Date, Duration};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo,
    repo_types::{MemberBrief, NewSubscription, Plan, Subscription},
};
use crate::{
    common::dates::format_date,
    error::{AppError, AppResult},
    payments::repo::{self as payment_repo, NewPayment},
};

pub const DEFAULT_PAYMENT_MODE: &str = "Cash";

/// Longest plan a gym sells; keeps every end date inside the calendar.
pub const MAX_PLAN_DURATION_DAYS: i32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Upcoming,
    Expired,
    Cancelled,
    Suspended,
}

impl MembershipStatus {
    pub const ALL: [MembershipStatus; 5] = [
        MembershipStatus::Active,
        MembershipStatus::Expired,
        MembershipStatus::Cancelled,
        MembershipStatus::Suspended,
        MembershipStatus::Upcoming,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Upcoming => "upcoming",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Cancelled => "cancelled",
            MembershipStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MembershipStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let allowed: Vec<&str> = MembershipStatus::ALL.iter().map(|s| s.as_str()).collect();
                AppError::validation(format!("Status must be one of: {}", allowed.join(", ")))
            })
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a date range against `today`.
pub fn date_status(start: Date, end: Date, today: Date) -> MembershipStatus {
    if end < today {
        MembershipStatus::Expired
    } else if start <= today {
        MembershipStatus::Active
    } else {
        MembershipStatus::Upcoming
    }
}

/// Status shown to clients. Cancelled and suspended are explicit admin
/// decisions and are shown as stored; everything else follows the dates.
pub fn display_status(stored: &str, start: Date, end: Date, today: Date) -> MembershipStatus {
    match stored.parse::<MembershipStatus>() {
        Ok(s @ (MembershipStatus::Cancelled | MembershipStatus::Suspended)) => s,
        _ => date_status(start, end, today),
    }
}

pub fn end_date_for(start: Date, duration_days: i32) -> AppResult<Date> {
    start
        .checked_add(Duration::days(duration_days as i64))
        .ok_or_else(|| AppError::validation("End date out of range"))
}

pub fn days_remaining(end: Date, today: Date) -> i64 {
    (end - today).whole_days().max(0)
}

/// `price * (1 - discount/100)` rounded to cents. Discount is a percentage in 0..=100.
pub fn amount_after_discount(price: Decimal, discount: Decimal) -> AppResult<Decimal> {
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(AppError::validation("Discount must be between 0 and 100"));
    }
    Ok((price * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED).round_dp(2))
}

pub fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string()
}

pub struct SubscribeInput<'a> {
    pub member_id: Uuid,
    pub plan: &'a Plan,
    pub start_date: Date,
    pub discount: Decimal,
    pub payment_mode: Option<&'a str>,
}

#[derive(Debug)]
pub struct Subscribed {
    pub subscription: Subscription,
    pub member: MemberBrief,
    pub payment_id: Uuid,
}

/// Creates a subscription and its payment on `conn`, which must be inside a
/// transaction. The member row stays locked until that transaction ends.
pub async fn subscribe(conn: &mut PgConnection, input: SubscribeInput<'_>) -> AppResult<Subscribed> {
    let amount_paid = amount_after_discount(input.plan.price, input.discount)?;

    let member = repo::lock_member(&mut *conn, input.member_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;

    if let Some(until) = repo::active_overlap(&mut *conn, input.member_id, input.start_date).await? {
        warn!(member_id = %input.member_id, until = %format_date(until), "overlapping membership");
        return Err(AppError::conflict(format!(
            "Member has an active membership until {}",
            format_date(until)
        )));
    }

    let subscription = repo::insert_subscription(
        &mut *conn,
        &NewSubscription {
            member_id: input.member_id,
            plan_id: input.plan.id,
            start_date: input.start_date,
            end_date: end_date_for(input.start_date, input.plan.duration_days)?,
            status: MembershipStatus::Active.as_str(),
            amount_paid,
            discount: input.discount,
        },
    )
    .await?;

    let payment_id = payment_repo::insert_payment(
        &mut *conn,
        &NewPayment {
            member_id: input.member_id,
            membership_id: Some(subscription.id),
            amount: amount_paid,
            date: None,
            mode: Some(input.payment_mode.unwrap_or(DEFAULT_PAYMENT_MODE).to_string()),
        },
    )
    .await?;

    info!(
        membership_id = %subscription.id,
        member_id = %input.member_id,
        plan = %input.plan.name,
        "membership created"
    );
    Ok(Subscribed {
        subscription,
        member,
        payment_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn thirty_day_plan_scenario() {
        let start = date!(2024 - 01 - 01);
        let end = end_date_for(start, 30).unwrap();
        assert_eq!(end, date!(2024 - 01 - 31));
        assert_eq!(date_status(start, end, start), MembershipStatus::Active);
        assert_eq!(date_status(start, end, date!(2024 - 01 - 31)), MembershipStatus::Active);
        assert_eq!(date_status(start, end, date!(2024 - 02 - 01)), MembershipStatus::Expired);
        assert_eq!(date_status(start, end, date!(2023 - 12 - 31)), MembershipStatus::Upcoming);
    }

    #[test]
    fn end_date_outside_calendar_is_rejected() {
        let err = end_date_for(date!(2024 - 01 - 01), i32::MAX).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "End date out of range");
        assert!(end_date_for(date!(9999 - 12 - 31), 30).is_err());
        assert_eq!(
            end_date_for(date!(2024 - 01 - 01), MAX_PLAN_DURATION_DAYS).unwrap(),
            date!(2033 - 12 - 29)
        );
    }

    #[test]
    fn display_keeps_admin_states() {
        let (start, end) = (date!(2024 - 01 - 01), date!(2024 - 01 - 31));
        let today = date!(2024 - 01 - 10);
        assert_eq!(display_status("cancelled", start, end, today), MembershipStatus::Cancelled);
        assert_eq!(display_status("suspended", start, end, today), MembershipStatus::Suspended);
        assert_eq!(display_status("active", start, end, date!(2024 - 03 - 01)), MembershipStatus::Expired);
        assert_eq!(display_status("expired", start, end, today), MembershipStatus::Active);
    }

    #[test]
    fn discount_math() {
        let price = Decimal::new(1999, 0);
        assert_eq!(
            amount_after_discount(price, Decimal::new(10, 0)).unwrap(),
            Decimal::new(179910, 2)
        );
        assert_eq!(amount_after_discount(price, Decimal::ZERO).unwrap(), price);
        assert_eq!(
            amount_after_discount(price, Decimal::ONE_HUNDRED).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            amount_after_discount(Decimal::new(3333, 2), Decimal::new(333, 1)).unwrap(),
            Decimal::new(2223, 2)
        );
        assert!(amount_after_discount(price, Decimal::new(101, 0)).is_err());
        assert!(amount_after_discount(price, Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn status_parsing() {
        assert_eq!("Active".parse::<MembershipStatus>().unwrap(), MembershipStatus::Active);
        let err = "paused".parse::<MembershipStatus>().unwrap_err();
        assert!(err.to_string().starts_with("Status must be one of"));
    }

    #[test]
    fn remaining_days_never_negative() {
        assert_eq!(days_remaining(date!(2024 - 01 - 31), date!(2024 - 01 - 21)), 10);
        assert_eq!(days_remaining(date!(2024 - 01 - 31), date!(2024 - 02 - 05)), 0);
    }

    #[test]
    fn names_join_cleanly() {
        assert_eq!(full_name(Some("Ada"), Some("Lovelace")), "Ada Lovelace");
        assert_eq!(full_name(Some("Ada"), None), "Ada");
        assert_eq!(full_name(None, None), "");
    }
}
