use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};

use crate::error::{AppError, AppResult};

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `YYYY-MM-DD` serde for `Date` fields, used with `#[serde(with = "iso_date")]`.
pub mod iso_date {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        Date::parse(&raw, &super::ISO_DATE).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            #[derive(Deserialize)]
            struct Wrap(#[serde(with = "super")] Date);
            Ok(Option::<Wrap>::deserialize(d)?.map(|Wrap(date)| date))
        }
    }
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn parse_date(raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), &ISO_DATE)
        .map_err(|_| AppError::validation("Invalid date format. Use YYYY-MM-DD"))
}

/// Blank strings count as absent.
pub fn parse_optional_date(raw: Option<&str>) -> AppResult<Option<Date>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_date(s).map(Some),
        None => Ok(None),
    }
}

pub fn format_date(date: Date) -> String {
    date.format(&ISO_DATE).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2024-01-31").unwrap(), date!(2024 - 01 - 31));
        assert!(parse_date("31/01/2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(parse_optional_date(Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_date(None).unwrap(), None);
        assert!(parse_optional_date(Some("nope")).is_err());
    }

    #[test]
    fn formats_back() {
        assert_eq!(format_date(date!(2024 - 03 - 05)), "2024-03-05");
    }
}
