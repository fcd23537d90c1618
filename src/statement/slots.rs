use std::fmt;
use std::io::Read;

use crate::error::SqlDriverError;
use crate::lob::LobKind;
use crate::types::SqlValue;

/// One-shot parameter source, read completely when the statement executes.
pub struct ParameterStream {
    kind: LobKind,
    reader: Box<dyn Read + Send>,
}

impl ParameterStream {
    /// Byte stream, bound as binary content.
    pub fn binary(reader: impl Read + Send + 'static) -> Self {
        Self {
            kind: LobKind::Binary,
            reader: Box::new(reader),
        }
    }

    /// UTF-8 character stream, bound as text.
    pub fn character(reader: impl Read + Send + 'static) -> Self {
        Self {
            kind: LobKind::Character,
            reader: Box::new(reader),
        }
    }

    #[must_use]
    pub fn kind(&self) -> LobKind {
        self.kind
    }

    /// Drain the stream into a value.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::Stream`] if reading fails or character data is not UTF-8.
    pub(crate) fn consume(mut self) -> Result<SqlValue, SqlDriverError> {
        match self.kind {
            LobKind::Binary => {
                let mut bytes = Vec::new();
                self.reader.read_to_end(&mut bytes)?;
                Ok(SqlValue::Bytes(bytes))
            }
            LobKind::Character => {
                let mut text = String::new();
                self.reader.read_to_string(&mut text)?;
                Ok(SqlValue::Text(text))
            }
        }
    }
}

impl fmt::Debug for ParameterStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStream")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Binding state of one parameter slot.
#[derive(Debug, Default)]
pub enum SlotState {
    #[default]
    Unset,
    /// Reusable value, kept across executions.
    Bound(SqlValue),
    /// One-shot stream waiting for the next execution.
    Streamed(ParameterStream),
    /// The stream was consumed by an execution and must be supplied again.
    StreamPendingRebind,
}

impl SlotState {
    /// Short name for logs and assertions.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SlotState::Unset => "unset",
            SlotState::Bound(_) => "bound",
            SlotState::Streamed(_) => "streamed",
            SlotState::StreamPendingRebind => "stream pending rebind",
        }
    }

    /// Whether an execution can take a value from this slot.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, SlotState::Bound(_) | SlotState::Streamed(_))
    }
}
