//! Field extraction helpers for raw exchange JSON records.
//!
//! Hyperliquid encodes decimals as strings and timestamps as integers. Some archived
//! payloads carry numbers where strings are expected, so both forms are accepted.

use crate::domain::{Decimal, TimeMs};
use serde_json::Value;
use thiserror::Error;

/// A single raw record could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("invalid decimal in {field}: {value}")]
    InvalidDecimal { field: &'static str, value: String },
    #[error("invalid side: {0}")]
    InvalidSide(String),
    #[error("expected a JSON object")]
    NotAnObject,
}

pub(crate) fn time_field(json: &Value, field: &'static str) -> Result<TimeMs, ParseError> {
    json.get(field)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(TimeMs::new)
        .ok_or(ParseError::MissingField(field))
}

pub(crate) fn str_field<'a>(json: &'a Value, field: &'static str) -> Result<&'a str, ParseError> {
    json.get(field)
        .and_then(|v| v.as_str())
        .ok_or(ParseError::MissingField(field))
}

pub(crate) fn decimal_field(json: &Value, field: &'static str) -> Result<Decimal, ParseError> {
    let raw = json.get(field).ok_or(ParseError::MissingField(field))?;
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ParseError::MissingField(field)),
    };
    Decimal::from_str_canonical(&text).map_err(|_| ParseError::InvalidDecimal {
        field,
        value: text,
    })
}

/// Like [`decimal_field`], but an absent field yields `None` instead of an error.
pub(crate) fn optional_decimal_field(
    json: &Value,
    field: &'static str,
) -> Result<Option<Decimal>, ParseError> {
    match json.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => decimal_field(json, field).map(Some),
    }
}
