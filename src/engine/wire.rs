use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::lob::{LobPayload, LobRef};
use crate::statement::{ColumnDescriptor, ParameterDescriptor, ResultDescriptor};

/// Engine-assigned prepared statement identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// Engine-side cursor over a row-producing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorId(pub u64);

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// A parameter or column value in the engine's own representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    /// Canonical decimal text
    Decimal(String),
    Text(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    /// Time of day; unzoned values carry offset 0
    Time {
        time: NaiveTime,
        offset_seconds: i32,
    },
    /// UTC instant; unzoned values carry offset 0
    Timestamp {
        instant: NaiveDateTime,
        offset_seconds: i32,
    },
    Json(JsonValue),
    Lob(LobRef),
}

/// Error reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error(
    "engine error {code}{}: {message}",
    sql_state.as_deref().map(|s| format!(" [{s}]")).unwrap_or_default()
)]
pub struct EngineError {
    pub code: i32,
    pub sql_state: Option<String>,
    pub message: String,
}

/// Non-fatal condition reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlWarning {
    pub code: i32,
    pub sql_state: Option<String>,
    pub message: String,
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOutcome {
    /// Rows affected by the entry.
    Count(u64),
    /// The entry succeeded but the engine did not report a count.
    SuccessNoInfo,
}

/// Extra results chained onto a primary response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecondaryResult {
    Warning(SqlWarning),
    Error(EngineError),
    GeneratedKeys {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<EngineValue>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Prepare {
        sql: String,
    },
    Execute {
        statement: StatementId,
        parameters: Vec<EngineValue>,
    },
    BatchExecute {
        statement: StatementId,
        entries: Vec<Vec<EngineValue>>,
    },
    FreeStatement {
        statement: StatementId,
    },
    LobCreate {
        payload: LobPayload,
    },
    /// Positioned update of one row of an open cursor; `None` leaves the column unchanged.
    UpdateResultRow {
        cursor: CursorId,
        row: u64,
        columns: Vec<Option<EngineValue>>,
    },
    LobDuplicate {
        lob: LobRef,
    },
    LobRead {
        lob: LobRef,
        position: u64,
        length: u64,
    },
    LobWrite {
        lob: LobRef,
        position: u64,
        payload: LobPayload,
    },
    LobTruncate {
        lob: LobRef,
        length: u64,
    },
    LobFree {
        lob: LobRef,
    },
    Ping,
    CloseSession,
}

impl Request {
    /// Wire name of the request kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Prepare { .. } => "PREPARE",
            Request::Execute { .. } => "EXECUTE",
            Request::BatchExecute { .. } => "BATCH_EXECUTE",
            Request::FreeStatement { .. } => "FREE_STATEMENT",
            Request::LobCreate { .. } => "LOB_CREATE",
            Request::UpdateResultRow { .. } => "UPDATE_RESULT_ROW",
            Request::LobDuplicate { .. } => "LOB_DUPLICATE",
            Request::LobRead { .. } => "LOB_READ",
            Request::LobWrite { .. } => "LOB_WRITE",
            Request::LobTruncate { .. } => "LOB_TRUNCATE",
            Request::LobFree { .. } => "LOB_FREE",
            Request::Ping => "PING",
            Request::CloseSession => "CLOSE_SESSION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Prepared {
        statement: StatementId,
        parameters: Vec<ParameterDescriptor>,
        result: ResultDescriptor,
    },
    Rows {
        cursor: CursorId,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<EngineValue>>,
        secondary: Vec<SecondaryResult>,
    },
    UpdateCount {
        count: u64,
        secondary: Vec<SecondaryResult>,
    },
    /// One outcome per executed entry; fewer outcomes than entries means the batch stopped.
    BatchCounts {
        outcomes: Vec<BatchOutcome>,
        secondary: Vec<SecondaryResult>,
    },
    Lob(LobRef),
    LobData(LobPayload),
    LobLength(u64),
    Ack,
    Error(EngineError),
}

impl Response {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Prepared { .. } => "Prepared",
            Response::Rows { .. } => "Rows",
            Response::UpdateCount { .. } => "UpdateCount",
            Response::BatchCounts { .. } => "BatchCounts",
            Response::Lob(_) => "Lob",
            Response::LobData(_) => "LobData",
            Response::LobLength(_) => "LobLength",
            Response::Ack => "Ack",
            Response::Error(_) => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display_includes_state() {
        let err = EngineError {
            code: 23505,
            sql_state: Some("23505".into()),
            message: "duplicate key".into(),
        };
        assert_eq!(err.to_string(), "engine error 23505 [23505]: duplicate key");
        let bare = EngineError {
            sql_state: None,
            ..err
        };
        assert_eq!(bare.to_string(), "engine error 23505: duplicate key");
    }

    #[test]
    fn request_serializes_with_kind_tag() {
        let json = serde_json::to_value(Request::FreeStatement {
            statement: StatementId(7),
        })
        .unwrap();
        assert_eq!(json["FreeStatement"]["statement"], 7);
    }
}
