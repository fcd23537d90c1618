use thiserror::Error;

use crate::engine::{BatchOutcome, EngineError, TransportError};

/// Malformed `{...}` escape syntax found while translating SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid escape syntax at position {position}: {fragment}")]
pub struct EscapeSyntaxError {
    /// The offending text, starting at the open brace.
    pub fragment: String,
    /// Byte offset of the open brace in the original SQL.
    pub position: usize,
}

#[derive(Debug, Error)]
pub enum SqlDriverError {
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("statement is closed")]
    StatementClosed,

    #[error("parameter index {index} out of range (statement declares {count} parameters)")]
    ParameterIndexOutOfRange { index: usize, count: usize },

    #[error("parameter {index} is not set")]
    ParameterNotSet { index: usize },

    #[error("cannot convert {value_kind} to {type_name}")]
    TypeConversion {
        type_name: String,
        value_kind: &'static str,
    },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("batch failed after {} of its entries", outcomes.len())]
    BatchPartialFailure {
        /// Outcomes for the entries the engine did execute, in submission order.
        outcomes: Vec<BatchOutcome>,
        /// Engine error that stopped the batch, when one was reported.
        cause: Option<EngineError>,
    },

    #[error(transparent)]
    EscapeSyntax(#[from] EscapeSyntaxError),

    #[error("LOB range out of bounds: position {position}, length {length}, total {total}")]
    LobBounds {
        position: i64,
        length: i64,
        total: u64,
    },

    #[error("LOB is closed")]
    LobClosed,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("parameter stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlDriverError {
    pub(crate) fn conversion(type_name: impl Into<String>, value_kind: &'static str) -> Self {
        SqlDriverError::TypeConversion {
            type_name: type_name.into(),
            value_kind,
        }
    }

    pub(crate) fn unexpected_response(expected: &str, actual: &str) -> Self {
        SqlDriverError::Protocol(format!(
            "expected {expected} response, engine sent {actual}"
        ))
    }
}
