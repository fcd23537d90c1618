use chrono::{FixedOffset, NaiveTime, TimeDelta, TimeZone};

use crate::engine::EngineValue;
use crate::types::{SqlType, SqlValue};

/// Decode an engine value of a column declared as `sql_type`.
///
/// Zoned timestamps come back as [`SqlValue::TimestampTz`] in their stored offset; zoned times
/// are shifted to their local wall-clock time. Decimal text stays text.
#[must_use]
pub fn decode_value(sql_type: &SqlType, value: EngineValue) -> SqlValue {
    match value {
        EngineValue::Null => SqlValue::Null,
        EngineValue::Boolean(v) => SqlValue::Bool(v),
        EngineValue::TinyInt(v) => SqlValue::TinyInt(v),
        EngineValue::SmallInt(v) => SqlValue::SmallInt(v),
        EngineValue::Integer(v) => SqlValue::Int(v),
        EngineValue::BigInt(v) => SqlValue::BigInt(v),
        EngineValue::Real(v) => SqlValue::Float(v),
        EngineValue::Double(v) => SqlValue::Double(v),
        EngineValue::Decimal(text) | EngineValue::Text(text) => SqlValue::Text(text),
        EngineValue::Binary(bytes) => SqlValue::Bytes(bytes),
        EngineValue::Date(date) => SqlValue::Date(date),
        EngineValue::Time {
            time,
            offset_seconds,
        } => SqlValue::Time(local_time(time, offset_seconds)),
        EngineValue::Timestamp {
            instant,
            offset_seconds,
        } => match FixedOffset::east_opt(offset_seconds) {
            Some(offset) if sql_type.is_zoned() => {
                SqlValue::TimestampTz(offset.from_utc_datetime(&instant))
            }
            _ => SqlValue::Timestamp(instant),
        },
        EngineValue::Json(json) => SqlValue::Json(json),
        EngineValue::Lob(lob) => SqlValue::Lob(lob),
    }
}

fn local_time(time: NaiveTime, offset_seconds: i32) -> NaiveTime {
    let (local, _) = time.overflowing_add_signed(TimeDelta::seconds(i64::from(offset_seconds)));
    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn zoned_timestamp_keeps_offset() {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let value = decode_value(
            &SqlType::TimestampTz,
            EngineValue::Timestamp {
                instant,
                offset_seconds: 7200,
            },
        );
        let SqlValue::TimestampTz(dt) = value else {
            panic!("expected zoned timestamp, got {value:?}");
        };
        assert_eq!(dt.naive_utc(), instant);
        assert_eq!(dt.offset().local_minus_utc(), 7200);
        assert_eq!(dt.naive_local().time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn unzoned_timestamp_is_naive() {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let value = decode_value(
            &SqlType::Timestamp,
            EngineValue::Timestamp {
                instant,
                offset_seconds: 0,
            },
        );
        assert_eq!(value, SqlValue::Timestamp(instant));
    }
}
