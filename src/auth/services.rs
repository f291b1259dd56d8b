use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgConnection;
use time::Date;
use uuid::Uuid;

use super::{dto::Profile, jwt::JwtKeys, roles::Role};
use crate::{members, trainers};

pub const MINIMUM_SIGNUP_AGE: i32 = 16;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex");
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn digit_count(phone: &str) -> usize {
    phone.chars().filter(char::is_ascii_digit).count()
}

/// Signup phones carry exactly ten digits once punctuation is stripped.
pub fn is_valid_signup_phone(phone: &str) -> bool {
    digit_count(phone) == 10
}

/// Staff-entered phones may carry a country prefix.
pub fn is_valid_phone(phone: &str) -> bool {
    digit_count(phone) >= 10
}

/// Whole years between `dob` and `today`, one less when the birthday has not come yet.
pub fn age_on(dob: Date, today: Date) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
        age -= 1;
    }
    age
}

/// Role-specific profile of a user, if one exists.
pub async fn load_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: Role,
) -> anyhow::Result<Option<Profile>> {
    let profile = match role {
        Role::Member => members::repo::summary_by_user(conn, user_id)
            .await?
            .map(Profile::Member),
        Role::Trainer => trainers::repo::summary_by_user(conn, user_id)
            .await?
            .map(Profile::Trainer),
        Role::Admin => None,
    };
    Ok(profile)
}

pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn issue_tokens(keys: &JwtKeys, user_id: Uuid, role: Role, email: &str) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        access: keys.sign_access(user_id, role, email)?,
        refresh: keys.sign_refresh(user_id, role, email)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane.doe+gym@example.com"));
        assert!(!is_valid_email("jane@"));
        assert!(!is_valid_email("no at sign.com"));
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn phone_rules() {
        assert!(is_valid_signup_phone("(555) 123-4567"));
        assert!(!is_valid_signup_phone("+1 555 123 4567"));
        assert!(is_valid_phone("+1 555 123 4567"));
        assert!(!is_valid_phone("12345"));
    }

    #[test]
    fn age_uses_month_day_tie_break() {
        let today = date!(2024 - 06 - 15);
        assert_eq!(age_on(date!(2008 - 06 - 15), today), 16);
        assert_eq!(age_on(date!(2008 - 06 - 16), today), 15);
        assert_eq!(age_on(date!(2008 - 07 - 01), today), 15);
        assert_eq!(age_on(date!(2008 - 05 - 31), today), 16);
    }
}
