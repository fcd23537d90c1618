//! Convenient imports for common functionality.
//!
//! This module re-exports the types most programs touch when preparing, binding and
//! executing statements.

pub use crate::batch::{Batch, BatchEntry};
pub use crate::engine::{BatchOutcome, Engine, EngineError, SqlWarning};
pub use crate::error::{EscapeSyntaxError, SqlDriverError};
pub use crate::lob::{Blob, Clob, LargeObject, LobKind, LobRef, LobState};
pub use crate::results::{ResultSet, Row};
pub use crate::session::{Session, SessionOptions, SessionOptionsBuilder};
pub use crate::statement::{
    ExecutionResult, ParameterStream, PreparedStatement, SlotState, StatementState,
};
pub use crate::translation::{EscapeMode, PrepareOptions, translate_escapes};
pub use crate::types::{CalendarContext, ParameterMode, SqlType, SqlValue};
