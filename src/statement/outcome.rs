use std::sync::{Mutex, MutexGuard};

use crate::engine::{EngineError, SecondaryResult, SqlWarning};
use crate::results::ResultSet;

/// What one execution produced.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Rows(ResultSet),
    Count(u64),
}

impl ExecutionResult {
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            ExecutionResult::Rows(rows) => Some(rows),
            ExecutionResult::Count(_) => None,
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            ExecutionResult::Rows(rows) => Some(rows),
            ExecutionResult::Count(_) => None,
        }
    }

    #[must_use]
    pub fn update_count(&self) -> Option<u64> {
        match self {
            ExecutionResult::Count(count) => Some(*count),
            ExecutionResult::Rows(_) => None,
        }
    }
}

/// Lifecycle of a prepared statement.
///
/// `Prepared`, `RowResult`, `CountResult` and `Errored` all accept a new execution; `Closed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Prepared,
    Executing,
    RowResult,
    CountResult,
    Errored,
    Closed,
}

/// What a statement may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementCapabilities {
    pub supports_batch: bool,
    pub returns_rows: bool,
}

#[derive(Debug, Default)]
struct Chain {
    warnings: Vec<SqlWarning>,
    errors: Vec<EngineError>,
    generated_keys: Option<ResultSet>,
}

/// Secondary results collected from the most recent execution, in arrival order.
#[derive(Debug, Default)]
pub struct ChainedResults {
    inner: Mutex<Chain>,
}

impl ChainedResults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        *self.lock() = Chain::default();
    }

    /// Append everything the engine chained onto a response.
    pub fn record(&self, secondary: Vec<SecondaryResult>) {
        if secondary.is_empty() {
            return;
        }
        let mut chain = self.lock();
        for item in secondary {
            match item {
                SecondaryResult::Warning(warning) => {
                    tracing::warn!(
                        code = warning.code,
                        sql_state = warning.sql_state.as_deref().unwrap_or(""),
                        "engine warning: {}",
                        warning.message
                    );
                    chain.warnings.push(warning);
                }
                SecondaryResult::Error(error) => {
                    tracing::debug!(code = error.code, "secondary engine error: {}", error.message);
                    chain.errors.push(error);
                }
                SecondaryResult::GeneratedKeys { columns, rows } => {
                    chain.generated_keys = Some(ResultSet::from_engine(None, &columns, rows));
                }
            }
        }
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<SqlWarning> {
        self.lock().warnings.clone()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<EngineError> {
        self.lock().errors.clone()
    }

    /// Last secondary error, used as the cause of a stopped batch.
    #[must_use]
    pub fn last_error(&self) -> Option<EngineError> {
        self.lock().errors.last().cloned()
    }

    #[must_use]
    pub fn generated_keys(&self) -> Option<ResultSet> {
        self.lock().generated_keys.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineValue;
    use crate::statement::ColumnDescriptor;
    use crate::types::{SqlType, SqlValue};

    fn warning(code: i32) -> SqlWarning {
        SqlWarning {
            code,
            sql_state: None,
            message: format!("w{code}"),
        }
    }

    #[test]
    fn keeps_arrival_order_and_clears() {
        let chain = ChainedResults::new();
        chain.record(vec![
            SecondaryResult::Warning(warning(1)),
            SecondaryResult::Warning(warning(2)),
        ]);
        let codes: Vec<i32> = chain.warnings().iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![1, 2]);
        chain.clear();
        assert!(chain.warnings().is_empty());
    }

    #[test]
    fn decodes_generated_keys() {
        let chain = ChainedResults::new();
        chain.record(vec![SecondaryResult::GeneratedKeys {
            columns: vec![ColumnDescriptor::new("id", SqlType::BigInt)],
            rows: vec![vec![EngineValue::BigInt(41)]],
        }]);
        let keys = chain.generated_keys().expect("keys");
        assert_eq!(keys.results[0].get("id"), Some(&SqlValue::BigInt(41)));
    }

    #[test]
    fn execution_result_accessors() {
        assert_eq!(ExecutionResult::Count(3).update_count(), Some(3));
        assert!(ExecutionResult::Count(3).rows().is_none());
    }
}
