use crate::engine::EngineValue;
use crate::error::SqlDriverError;
use crate::types::{SqlType, SqlValue};

/// Decode hexadecimal text, with or without a `0x` prefix.
///
/// Returns `None` for odd lengths or non-hex characters.
#[must_use]
pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).ok()
}

/// Lowercase hexadecimal rendering of `bytes`.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub(super) fn to_binary(
    declared: &SqlType,
    value: &SqlValue,
) -> Result<EngineValue, SqlDriverError> {
    match value {
        SqlValue::Bytes(bytes) => Ok(EngineValue::Binary(bytes.clone())),
        SqlValue::Text(text) => decode_hex(text)
            .map(EngineValue::Binary)
            .ok_or_else(|| SqlDriverError::conversion(declared.name(), value.kind())),
        _ => Err(SqlDriverError::conversion(declared.name(), value.kind())),
    }
}
