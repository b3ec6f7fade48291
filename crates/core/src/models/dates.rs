//! Lenient deserialisers for form input.
//!
//! Date pickers post either `YYYY-MM-DD` or a full ISO timestamp, and cleared
//! inputs post `""`. These helpers accept all of those shapes.

use chrono::{Local, NaiveDate};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Deserializer};

/// Parses the leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_date_prefix(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    let prefix = input.get(0..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Today's date in the server's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_date_prefix(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("expected YYYY-MM-DD date, got '{}'", s)))
}

pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date_prefix(v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected YYYY-MM-DD date, got '{}'", v))),
    }
}

pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<DocumentId>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => DocumentId::parse(v).map(Some).map_err(serde::de::Error::custom),
    }
}
