//! Generic attribute-map representation used by the document store.
//!
//! Every record is an [`Item`]: a flat map of attribute names to typed
//! [`AttributeValue`]s. Entities convert to and from items through their
//! `to_item` / `from_item` functions; the helpers here do the typed reads and
//! report a [`DecodeError`] naming the attribute when a payload is malformed.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored record.
pub type Item = BTreeMap<String, AttributeValue>;

/// A typed attribute value.
///
/// Numbers travel as decimal text, the way document stores carry them, so
/// integers such as `version` survive a round trip exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
    Null,
    M(Item),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        Self::N(value.to_string())
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Self::S(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }
}

/// A stored item could not be mapped back to an entity.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("cannot decode attribute \"{field}\": {reason}")]
pub struct DecodeError {
    pub field: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn get_str<'a>(item: &'a Item, field: &str) -> Result<&'a str, DecodeError> {
    match item.get(field) {
        Some(AttributeValue::S(value)) => Ok(value),
        Some(_) => Err(DecodeError::new(field, "expected a string")),
        None => Err(DecodeError::new(field, "missing")),
    }
}

pub(crate) fn get_string(item: &Item, field: &str) -> Result<String, DecodeError> {
    get_str(item, field).map(ToString::to_string)
}

pub(crate) fn get_f64(item: &Item, field: &str) -> Result<f64, DecodeError> {
    let raw = get_number(item, field)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| DecodeError::new(field, format!("\"{raw}\" is not a number")))?;
    if !value.is_finite() {
        return Err(DecodeError::new(field, "number is not finite"));
    }
    Ok(value)
}

pub(crate) fn get_u64(item: &Item, field: &str) -> Result<u64, DecodeError> {
    let raw = get_number(item, field)?;
    raw.parse::<u64>()
        .map_err(|_| DecodeError::new(field, format!("\"{raw}\" is not an unsigned integer")))
}

fn get_number<'a>(item: &'a Item, field: &str) -> Result<&'a str, DecodeError> {
    match item.get(field) {
        Some(AttributeValue::N(value)) => Ok(value),
        Some(_) => Err(DecodeError::new(field, "expected a number")),
        None => Err(DecodeError::new(field, "missing")),
    }
}

/// Read a timestamp written either as RFC 3339 or as a bare `YYYY-MM-DD` date.
///
/// An absent attribute reads as "now"; a present but unparsable one is an error.
pub(crate) fn get_timestamp(item: &Item, field: &str) -> Result<DateTime<Utc>, DecodeError> {
    match item.get(field) {
        None | Some(AttributeValue::Null) => Ok(Utc::now()),
        Some(AttributeValue::S(raw)) => parse_timestamp(raw)
            .ok_or_else(|| DecodeError::new(field, format!("\"{raw}\" is not a date"))),
        Some(_) => Err(DecodeError::new(field, "expected a string")),
    }
}

/// Parse either wire format of a timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
