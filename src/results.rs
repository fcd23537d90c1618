//! Decoded query results.
//!
//! Rows arrive from the engine as [`EngineValue`](crate::engine::EngineValue)s and are decoded
//! against the column types into [`SqlValue`](crate::types::SqlValue)s.

mod decode;
mod result_set;
mod row;

pub use decode::decode_value;
pub use result_set::ResultSet;
pub use row::Row;
