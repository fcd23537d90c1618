use std::sync::LazyLock;

use regex::Regex;

use crate::engine::EngineValue;
use crate::error::SqlDriverError;
use crate::types::{SqlType, SqlValue};

static DECIMAL_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("decimal pattern compiles")
});

/// Integral, floating and decimal targets.
///
/// Integers widen but never narrow. `REAL` takes up to 16-bit integers, `DOUBLE PRECISION` up to
/// 32-bit ones; wider integers are rejected rather than rounded. Text is parsed by the target.
pub(super) fn to_numeric(
    declared: &SqlType,
    value: &SqlValue,
) -> Result<EngineValue, SqlDriverError> {
    let fail = || SqlDriverError::conversion(declared.name(), value.kind());
    if let SqlValue::Text(text) = value {
        return parse_text(declared, text.trim()).ok_or_else(fail);
    }
    let converted = match (declared, value) {
        (SqlType::TinyInt, SqlValue::TinyInt(v)) => EngineValue::TinyInt(*v),
        (SqlType::SmallInt, SqlValue::TinyInt(v)) => EngineValue::SmallInt(i16::from(*v)),
        (SqlType::SmallInt, SqlValue::SmallInt(v)) => EngineValue::SmallInt(*v),
        (SqlType::Integer, SqlValue::TinyInt(v)) => EngineValue::Integer(i32::from(*v)),
        (SqlType::Integer, SqlValue::SmallInt(v)) => EngineValue::Integer(i32::from(*v)),
        (SqlType::Integer, SqlValue::Int(v)) => EngineValue::Integer(*v),
        (SqlType::BigInt, other) => EngineValue::BigInt(other.as_i64().ok_or_else(fail)?),
        (SqlType::Real, SqlValue::TinyInt(v)) => EngineValue::Real(f32::from(*v)),
        (SqlType::Real, SqlValue::SmallInt(v)) => EngineValue::Real(f32::from(*v)),
        (SqlType::Real, SqlValue::Float(v)) => EngineValue::Real(*v),
        (SqlType::Double, SqlValue::TinyInt(v)) => EngineValue::Double(f64::from(*v)),
        (SqlType::Double, SqlValue::SmallInt(v)) => EngineValue::Double(f64::from(*v)),
        (SqlType::Double, SqlValue::Int(v)) => EngineValue::Double(f64::from(*v)),
        (SqlType::Double, SqlValue::Float(v)) => EngineValue::Double(f64::from(*v)),
        (SqlType::Double, SqlValue::Double(v)) => EngineValue::Double(*v),
        (SqlType::Decimal, other) => EngineValue::Decimal(decimal_text(other).ok_or_else(fail)?),
        _ => return Err(fail()),
    };
    Ok(converted)
}

fn decimal_text(value: &SqlValue) -> Option<String> {
    if let Some(v) = value.as_i64() {
        return Some(v.to_string());
    }
    match value {
        SqlValue::Float(v) if v.is_finite() => Some(v.to_string()),
        SqlValue::Double(v) if v.is_finite() => Some(v.to_string()),
        _ => None,
    }
}

fn parse_text(declared: &SqlType, text: &str) -> Option<EngineValue> {
    match declared {
        SqlType::TinyInt => text.parse().ok().map(EngineValue::TinyInt),
        SqlType::SmallInt => text.parse().ok().map(EngineValue::SmallInt),
        SqlType::Integer => text.parse().ok().map(EngineValue::Integer),
        SqlType::BigInt => text.parse().ok().map(EngineValue::BigInt),
        SqlType::Real => text.parse().ok().map(EngineValue::Real),
        SqlType::Double => text.parse().ok().map(EngineValue::Double),
        SqlType::Decimal if DECIMAL_TEXT.is_match(text) => {
            Some(EngineValue::Decimal(text.to_owned()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_widen() {
        assert_eq!(
            to_numeric(&SqlType::Integer, &SqlValue::TinyInt(-3)).unwrap(),
            EngineValue::Integer(-3)
        );
        assert_eq!(
            to_numeric(&SqlType::BigInt, &SqlValue::Int(9)).unwrap(),
            EngineValue::BigInt(9)
        );
    }

    #[test]
    fn integers_do_not_narrow() {
        assert!(to_numeric(&SqlType::SmallInt, &SqlValue::Int(1)).is_err());
        assert!(to_numeric(&SqlType::TinyInt, &SqlValue::BigInt(1)).is_err());
    }

    #[test]
    fn floating_width_limits() {
        assert_eq!(
            to_numeric(&SqlType::Real, &SqlValue::SmallInt(300)).unwrap(),
            EngineValue::Real(300.0)
        );
        assert!(to_numeric(&SqlType::Real, &SqlValue::Int(1)).is_err());
        assert!(to_numeric(&SqlType::Real, &SqlValue::Double(1.0)).is_err());
        assert_eq!(
            to_numeric(&SqlType::Double, &SqlValue::Int(i32::MAX)).unwrap(),
            EngineValue::Double(f64::from(i32::MAX))
        );
        assert!(to_numeric(&SqlType::Double, &SqlValue::BigInt(1)).is_err());
    }

    #[test]
    fn decimal_accepts_numbers_and_numeric_text() {
        assert_eq!(
            to_numeric(&SqlType::Decimal, &SqlValue::BigInt(-12)).unwrap(),
            EngineValue::Decimal("-12".into())
        );
        assert_eq!(
            to_numeric(&SqlType::Decimal, &SqlValue::Text(" 1.50 ".into())).unwrap(),
            EngineValue::Decimal("1.50".into())
        );
        assert!(to_numeric(&SqlType::Decimal, &SqlValue::Text("1.2.3".into())).is_err());
        assert!(to_numeric(&SqlType::Decimal, &SqlValue::Double(f64::NAN)).is_err());
    }

    #[test]
    fn text_is_parsed_by_target() {
        assert_eq!(
            to_numeric(&SqlType::SmallInt, &SqlValue::Text("42".into())).unwrap(),
            EngineValue::SmallInt(42)
        );
        assert!(to_numeric(&SqlType::TinyInt, &SqlValue::Text("300".into())).is_err());
    }

    #[test]
    fn booleans_are_rejected() {
        assert!(to_numeric(&SqlType::Integer, &SqlValue::Bool(true)).is_err());
    }
}
