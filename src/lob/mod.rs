//! Large-object handles and the duplicate-on-write update protocol.
//!
//! A [`LargeObject`] starts out aliasing a value the engine already holds (Shared). The first
//! write or truncate asks the backend for a private duplicate and every later mutation in the
//! same update cycle goes to that duplicate. [`LargeObject::clear_updates`] drops the duplicate
//! and hands back the original handle; [`LargeObject::commit_updates`] makes it the new baseline.
//!
//! Binary and character objects share all of this through the [`ContentKind`] parameter; the
//! [`Blob`] and [`Clob`] aliases add the usual byte/string accessors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SqlDriverError;

mod bounds;
mod dirty;
mod handle;
mod kind;
mod memory;

pub use bounds::check_range;
pub use dirty::{DirtyColumns, DirtyMark};
pub use handle::{Blob, Clob, LargeObject, LobState};
pub use kind::{Binary, Character, ContentKind};
pub use memory::MemoryLobStore;

/// Engine-assigned large-object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LobId(pub u64);

impl fmt::Display for LobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lob#{}", self.0)
    }
}

/// Content kind of a large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobKind {
    /// Byte run (BLOB); lengths and positions count bytes.
    Binary,
    /// Character run (CLOB); lengths and positions count characters.
    Character,
}

/// Opaque reference to an engine-held large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobRef {
    pub id: LobId,
    pub kind: LobKind,
    /// Declared length in units of the kind.
    pub length: u64,
}

/// Large-object content moving between client and engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobPayload {
    Binary(Vec<u8>),
    Character(String),
}

impl LobPayload {
    #[must_use]
    pub fn kind(&self) -> LobKind {
        match self {
            LobPayload::Binary(_) => LobKind::Binary,
            LobPayload::Character(_) => LobKind::Character,
        }
    }

    /// Length in units of the kind: bytes or characters.
    #[must_use]
    pub fn units(&self) -> u64 {
        let units = match self {
            LobPayload::Binary(bytes) => bytes.len(),
            LobPayload::Character(text) => text.chars().count(),
        };
        units as u64
    }
}

/// Storage a [`LargeObject`] reads from and mutates through.
///
/// A session implements this with LOB requests to the engine; [`MemoryLobStore`] keeps the
/// content in process.
pub trait LobBackend: Send + Sync {
    /// Store `payload` as a new object.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if the object cannot be allocated.
    fn create_lob(&self, payload: LobPayload) -> Result<LobRef, SqlDriverError>;

    /// Copy `lob` into a new object with its own id.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if `lob` is unknown or the copy cannot be allocated.
    fn duplicate_lob(&self, lob: LobRef) -> Result<LobRef, SqlDriverError>;

    /// Read `length` units starting at the 0-based `position`.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if `lob` is unknown or the range is invalid.
    fn read_lob(&self, lob: LobRef, position: u64, length: u64)
    -> Result<LobPayload, SqlDriverError>;

    /// Overwrite from `position`, extending the object if needed. Returns the new length.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if `lob` is unknown or the payload kind does not match.
    fn write_lob(
        &self,
        lob: LobRef,
        position: u64,
        payload: LobPayload,
    ) -> Result<u64, SqlDriverError>;

    /// Cut the object down to `length` units.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if `lob` is unknown.
    fn truncate_lob(&self, lob: LobRef, length: u64) -> Result<(), SqlDriverError>;

    /// Release the object.
    ///
    /// # Errors
    /// Returns [`SqlDriverError`] if the backend rejects the release.
    fn free_lob(&self, lob: LobRef) -> Result<(), SqlDriverError>;
}
