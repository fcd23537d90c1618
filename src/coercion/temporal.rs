use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::engine::EngineValue;
use crate::error::SqlDriverError;
use crate::types::{CalendarContext, SqlType, SqlValue};

use super::character_representation;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const ZONED_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];

/// Wall-clock value together with the offset it was observed in.
#[derive(Debug, Clone, Copy)]
enum Observed {
    Date(NaiveDate, i32),
    Time(NaiveTime, i32),
    DateTime(NaiveDateTime, i32),
}

/// Date, time and timestamp targets.
///
/// Unzoned inputs are read in the calendar's offset (zero without one). Unzoned targets store
/// the instant with the offset folded in; zoned targets keep the offset next to the instant.
/// Text goes through the target's own parser and ignores the calendar.
pub(super) fn to_temporal(
    declared: &SqlType,
    value: &SqlValue,
    calendar: Option<&CalendarContext>,
) -> Result<EngineValue, SqlDriverError> {
    let fail = || SqlDriverError::conversion(declared.name(), value.kind());
    let offset = calendar.map_or(0, CalendarContext::offset_seconds);
    let observed = match value {
        SqlValue::Date(date) => Observed::Date(*date, offset),
        SqlValue::Time(time) => Observed::Time(*time, offset),
        SqlValue::Timestamp(ts) => Observed::DateTime(*ts, offset),
        SqlValue::TimestampTz(ts) => {
            Observed::DateTime(ts.naive_local(), ts.offset().local_minus_utc())
        }
        SqlValue::Text(_) => {
            let text = character_representation(value).ok_or_else(fail)?;
            return parse_native(declared, text.trim()).ok_or_else(fail);
        }
        _ => return Err(fail()),
    };
    store(declared, observed).ok_or_else(fail)
}

fn shift_back(local: NaiveDateTime, offset_seconds: i32) -> Option<NaiveDateTime> {
    local.checked_sub_signed(TimeDelta::seconds(i64::from(offset_seconds)))
}

fn store(declared: &SqlType, observed: Observed) -> Option<EngineValue> {
    let zoned = declared.is_zoned();
    match (declared, observed) {
        // A calendar date names a day, not an instant.
        (SqlType::Date, Observed::Date(date, _)) => Some(EngineValue::Date(date)),
        (SqlType::Date, Observed::DateTime(local, offset)) => {
            Some(EngineValue::Date(shift_back(local, offset)?.date()))
        }
        (SqlType::Time | SqlType::TimeTz, Observed::Time(time, offset)) => {
            let (utc, _) =
                time.overflowing_sub_signed(TimeDelta::seconds(i64::from(offset)));
            Some(EngineValue::Time {
                time: utc,
                offset_seconds: if zoned { offset } else { 0 },
            })
        }
        (SqlType::Time | SqlType::TimeTz, Observed::DateTime(local, offset)) => {
            Some(EngineValue::Time {
                time: shift_back(local, offset)?.time(),
                offset_seconds: if zoned { offset } else { 0 },
            })
        }
        (SqlType::Timestamp | SqlType::TimestampTz, Observed::Date(date, offset)) => {
            Some(EngineValue::Timestamp {
                instant: shift_back(date.and_time(NaiveTime::MIN), offset)?,
                offset_seconds: if zoned { offset } else { 0 },
            })
        }
        (SqlType::Timestamp | SqlType::TimestampTz, Observed::DateTime(local, offset)) => {
            Some(EngineValue::Timestamp {
                instant: shift_back(local, offset)?,
                offset_seconds: if zoned { offset } else { 0 },
            })
        }
        _ => None,
    }
}

/// The target's own text parser.
fn parse_native(declared: &SqlType, text: &str) -> Option<EngineValue> {
    match declared {
        SqlType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .map(EngineValue::Date),
        SqlType::Time => NaiveTime::parse_from_str(text, TIME_FORMAT)
            .ok()
            .map(|time| EngineValue::Time {
                time,
                offset_seconds: 0,
            }),
        SqlType::TimeTz => {
            let anchored = format!("1970-01-01 {text}");
            let parsed = DateTime::parse_from_str(&anchored, ZONED_TIMESTAMP_FORMATS[0]).ok()?;
            Some(EngineValue::Time {
                time: parsed.naive_utc().time(),
                offset_seconds: parsed.offset().local_minus_utc(),
            })
        }
        SqlType::Timestamp => parse_timestamp(text).map(|instant| EngineValue::Timestamp {
            instant,
            offset_seconds: 0,
        }),
        SqlType::TimestampTz => {
            let parsed = ZONED_TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
                .or_else(|| DateTime::parse_from_rfc3339(text).ok())?;
            Some(EngineValue::Timestamp {
                instant: parsed.naive_utc(),
                offset_seconds: parsed.offset().local_minus_utc(),
            })
        }
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}
