use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::{CursorId, EngineValue};
use crate::statement::ColumnDescriptor;
use crate::types::{SqlType, SqlValue};

use super::decode::decode_value;
use super::row::{Row, build_index};

/// A result set from a row-producing execution
///
/// Holds the decoded rows in engine order together with the column metadata and, when the
/// engine opened one, the cursor the rows came from (needed for positioned updates).
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Row>,
    /// Number of rows decoded into this result set
    pub rows_affected: usize,
    cursor: Option<CursorId>,
    column_names: Arc<Vec<String>>,
    column_types: Arc<Vec<SqlType>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Decode engine rows against `columns`.
    #[must_use]
    pub fn from_engine(
        cursor: Option<CursorId>,
        columns: &[ColumnDescriptor],
        rows: Vec<Vec<EngineValue>>,
    ) -> ResultSet {
        let mut result_set = ResultSet::with_columns(cursor, columns, rows.len());
        for row in rows {
            let values = row
                .into_iter()
                .zip(result_set.column_types.iter())
                .map(|(value, sql_type)| decode_value(sql_type, value))
                .collect();
            result_set.add_row_values(values);
        }
        result_set
    }

    /// Empty result set with known columns and preallocated capacity.
    #[must_use]
    pub fn with_columns(
        cursor: Option<CursorId>,
        columns: &[ColumnDescriptor],
        capacity: usize,
    ) -> ResultSet {
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let column_types: Vec<SqlType> = columns.iter().map(|c| c.sql_type.clone()).collect();
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            cursor,
            column_index_cache: Arc::new(build_index(&column_names)),
            column_names: Arc::new(column_names),
            column_types: Arc::new(column_types),
        }
    }

    /// Engine cursor the rows were read from.
    #[must_use]
    pub fn cursor(&self) -> Option<CursorId> {
        self.cursor
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn column_types(&self) -> &[SqlType] {
        &self.column_types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Row at the 0-based `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.results.get(index)
    }

    /// Forward iteration over the rows in engine order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.results.iter()
    }

    /// Add a row to the result set
    ///
    /// # Arguments
    ///
    /// * `values` - The values for this row, in column order
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        let row = Row {
            column_names: Arc::clone(&self.column_names),
            values,
            column_index_cache: Arc::clone(&self.column_index_cache),
        };
        self.results.push(row);
        self.rows_affected += 1;
    }
}
