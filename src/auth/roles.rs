use serde::Serialize;
use std::{fmt, str::FromStr};

/// Stored role of an account. The database keeps lower-case names,
/// clients see upper-case ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Trainer,
    Member,
}

impl Role {
    pub fn db_name(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trainer => "trainer",
            Role::Member => "member",
        }
    }

    pub fn client_name(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Trainer => "TRAINER",
            Role::Member => "MEMBER",
        }
    }

    /// Signup fallback: anything unrecognised becomes a member.
    pub fn from_signup(raw: Option<&str>) -> Role {
        raw.and_then(|r| r.parse().ok()).unwrap_or(Role::Member)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "trainer" => Ok(Role::Trainer),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.client_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Trainer ".parse::<Role>().unwrap(), Role::Trainer);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn signup_defaults_to_member() {
        assert_eq!(Role::from_signup(None), Role::Member);
        assert_eq!(Role::from_signup(Some("superuser")), Role::Member);
        assert_eq!(Role::from_signup(Some("trainer")), Role::Trainer);
    }

    #[test]
    fn names() {
        assert_eq!(Role::Admin.db_name(), "admin");
        assert_eq!(Role::Member.client_name(), "MEMBER");
        assert_eq!(serde_json::to_value(Role::Trainer).unwrap(), "TRAINER");
    }
}
