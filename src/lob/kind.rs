use crate::error::SqlDriverError;

use super::{LobKind, LobPayload};

/// Content carried by a [`LargeObject`](super::LargeObject).
pub trait ContentKind: Send + Sync + 'static {
    const KIND: LobKind;
    /// SQL name used when a handle of the other kind is supplied.
    const TYPE_NAME: &'static str;
    type Slice: ?Sized;
    type Owned;

    /// Length of `data` in positional units.
    fn units(data: &Self::Slice) -> u64;

    fn to_payload(data: &Self::Slice) -> LobPayload;

    /// # Errors
    /// Returns [`SqlDriverError::Protocol`] when the backend answers with the other kind.
    fn from_payload(payload: LobPayload) -> Result<Self::Owned, SqlDriverError>;
}

/// Byte content (BLOB).
#[derive(Debug, Clone, Copy)]
pub struct Binary;

/// Character content (CLOB).
#[derive(Debug, Clone, Copy)]
pub struct Character;

impl ContentKind for Binary {
    const KIND: LobKind = LobKind::Binary;
    const TYPE_NAME: &'static str = "BLOB";
    type Slice = [u8];
    type Owned = Vec<u8>;

    fn units(data: &[u8]) -> u64 {
        data.len() as u64
    }

    fn to_payload(data: &[u8]) -> LobPayload {
        LobPayload::Binary(data.to_vec())
    }

    fn from_payload(payload: LobPayload) -> Result<Vec<u8>, SqlDriverError> {
        match payload {
            LobPayload::Binary(bytes) => Ok(bytes),
            LobPayload::Character(_) => Err(SqlDriverError::unexpected_response(
                "binary LOB data",
                "character LOB data",
            )),
        }
    }
}

impl ContentKind for Character {
    const KIND: LobKind = LobKind::Character;
    const TYPE_NAME: &'static str = "CLOB";
    type Slice = str;
    type Owned = String;

    fn units(data: &str) -> u64 {
        data.chars().count() as u64
    }

    fn to_payload(data: &str) -> LobPayload {
        LobPayload::Character(data.to_owned())
    }

    fn from_payload(payload: LobPayload) -> Result<String, SqlDriverError> {
        match payload {
            LobPayload::Character(text) => Ok(text),
            LobPayload::Binary(_) => Err(SqlDriverError::unexpected_response(
                "character LOB data",
                "binary LOB data",
            )),
        }
    }
}
