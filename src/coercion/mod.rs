//! Parameter coercion.
//!
//! [`coerce`] turns an application value into the representation the declared parameter type
//! requires. The rule is picked by the type's [`TypeCategory`]; large-object targets do not
//! convert in place but hand back a [`CoercedValue::PendingLob`] for the statement's LOB pass.

use serde_json::Value as JsonValue;

use crate::engine::EngineValue;
use crate::error::SqlDriverError;
use crate::lob::{LobKind, LobPayload};
use crate::types::{CalendarContext, SqlType, SqlValue, TypeCategory};

mod binary;
mod numeric;
mod temporal;

pub use binary::{decode_hex, encode_hex};

/// Result of coercing one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    /// Ready to send as is.
    Ready(EngineValue),
    /// Client-side large-object content that needs an engine handle first.
    PendingLob(LobPayload),
}

impl CoercedValue {
    #[must_use]
    pub fn into_ready(self) -> Option<EngineValue> {
        match self {
            CoercedValue::Ready(value) => Some(value),
            CoercedValue::PendingLob(_) => None,
        }
    }
}

/// Convert `value` for a parameter declared as `declared`.
///
/// `calendar` supplies the zone for unzoned temporal inputs; without one the offset is zero.
///
/// ```rust
/// use sql_driver_core::coercion::{coerce, CoercedValue};
/// use sql_driver_core::engine::EngineValue;
/// use sql_driver_core::prelude::*;
///
/// let value = coerce(&SqlType::BigInt, &SqlValue::SmallInt(7), None).unwrap();
/// assert_eq!(value, CoercedValue::Ready(EngineValue::BigInt(7)));
/// ```
///
/// # Errors
/// Returns [`SqlDriverError::TypeConversion`] naming the declared type and the value's kind when
/// no rule accepts the value.
pub fn coerce(
    declared: &SqlType,
    value: &SqlValue,
    calendar: Option<&CalendarContext>,
) -> Result<CoercedValue, SqlDriverError> {
    if value.is_null() {
        return Ok(CoercedValue::Ready(EngineValue::Null));
    }
    let ready = match declared.category() {
        TypeCategory::Binary => binary::to_binary(declared, value)?,
        TypeCategory::LargeObject => return large_object(declared, value),
        TypeCategory::Temporal => temporal::to_temporal(declared, value, calendar)?,
        TypeCategory::Integral | TypeCategory::Floating | TypeCategory::Decimal => {
            numeric::to_numeric(declared, value)?
        }
        TypeCategory::Generic => default_representation(declared, value)?,
    };
    Ok(CoercedValue::Ready(ready))
}

fn large_object(declared: &SqlType, value: &SqlValue) -> Result<CoercedValue, SqlDriverError> {
    let kind = if *declared == SqlType::Blob {
        LobKind::Binary
    } else {
        LobKind::Character
    };
    match (kind, value) {
        (_, SqlValue::Lob(lob)) if lob.kind == kind => {
            Ok(CoercedValue::Ready(EngineValue::Lob(*lob)))
        }
        (LobKind::Binary, SqlValue::Bytes(bytes)) => {
            Ok(CoercedValue::PendingLob(LobPayload::Binary(bytes.clone())))
        }
        (LobKind::Binary, SqlValue::Text(text)) => decode_hex(text)
            .map(|bytes| CoercedValue::PendingLob(LobPayload::Binary(bytes)))
            .ok_or_else(|| SqlDriverError::conversion(declared.name(), value.kind())),
        (LobKind::Character, _) => character_representation(value)
            .map(|text| CoercedValue::PendingLob(LobPayload::Character(text)))
            .ok_or_else(|| SqlDriverError::conversion(declared.name(), value.kind())),
        _ => Err(SqlDriverError::conversion(declared.name(), value.kind())),
    }
}

/// The generic rule for types without a dedicated category.
fn default_representation(
    declared: &SqlType,
    value: &SqlValue,
) -> Result<EngineValue, SqlDriverError> {
    let fail = || SqlDriverError::conversion(declared.name(), value.kind());
    match declared {
        SqlType::Boolean => boolean(value).map(EngineValue::Boolean).ok_or_else(fail),
        SqlType::Json => json(value).map(EngineValue::Json).ok_or_else(fail),
        _ => character_representation(value)
            .map(EngineValue::Text)
            .ok_or_else(fail),
    }
}

fn boolean(value: &SqlValue) -> Option<bool> {
    if let Some(text) = value.as_text() {
        return match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(true),
            "false" | "f" | "0" => Some(false),
            _ => None,
        };
    }
    value.as_bool()
}

fn json(value: &SqlValue) -> Option<JsonValue> {
    match value {
        SqlValue::Json(json) => Some(json.clone()),
        SqlValue::Text(text) => serde_json::from_str(text).ok(),
        SqlValue::Bool(b) => Some(JsonValue::Bool(*b)),
        SqlValue::Float(_) | SqlValue::Double(_) => value
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        other => other.as_i64().map(JsonValue::from),
    }
}

/// Text form of a scalar value, as the character types and CLOBs store it.
///
/// Bytes render as lowercase hex; large-object handles have no text form.
#[must_use]
pub fn character_representation(value: &SqlValue) -> Option<String> {
    let text = match value {
        SqlValue::Null | SqlValue::Lob(_) => return None,
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::TinyInt(v) => v.to_string(),
        SqlValue::SmallInt(v) => v.to_string(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::BigInt(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Double(v) => v.to_string(),
        SqlValue::Text(text) => text.clone(),
        SqlValue::Bytes(bytes) => encode_hex(bytes),
        SqlValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        SqlValue::Time(time) => time.format("%H:%M:%S%.f").to_string(),
        SqlValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        SqlValue::Json(json) => json.to_string(),
    };
    Some(text)
}
