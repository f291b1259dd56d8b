//! Pieces shared by every resource module: request decoding, dates and paging.

pub mod dates;
pub mod extract;
pub mod pagination;

pub use dates::{iso_date, parse_date, parse_optional_date, today};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use pagination::{Page, PageMeta};

use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Inclusive window echoed back by report endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DateRange {
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
}

/// Parses an identifier supplied inside a body or query string.
pub fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("Invalid {what} ID format")))
}

/// Trims and drops empty strings.
pub fn clean(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        let err = parse_id("not-a-uuid", "member").unwrap_err();
        assert_eq!(err.to_string(), "Invalid member ID format");
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {id} "), "member").unwrap(), id);
    }

    #[test]
    fn clean_drops_blank() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" a ".into())), Some("a".into()));
        assert_eq!(clean(None), None);
    }
}
