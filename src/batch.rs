//! Batched execution of one prepared statement over many parameter sets.

use crate::engine::{BatchOutcome, EngineValue, Request, Response, StatementId};
use crate::error::SqlDriverError;
use crate::statement::{PreparedStatement, SlotState, StatementState, Target};
use crate::types::{ParameterMode, SqlValue};

/// Snapshot of the parameter values at the time of [`PreparedStatement::add_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    values: Vec<SqlValue>,
}

impl BatchEntry {
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Entries waiting for the next [`PreparedStatement::execute_batch`].
#[derive(Debug, Clone, Default)]
pub struct Batch {
    entries: Vec<BatchEntry>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub(crate) fn push(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn take(&mut self) -> Vec<BatchEntry> {
        std::mem::take(&mut self.entries)
    }
}

impl PreparedStatement {
    /// Copy the current bindings into the batch. Later rebinding does not touch the copy.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::ParameterNotSet`] for an unbound IN or INOUT parameter and
    /// [`SqlDriverError::UnsupportedOperation`] for streamed parameters, for statements that
    /// cannot batch, or when the session's `max_batch_entries` is reached.
    pub fn add_batch(&mut self) -> Result<(), SqlDriverError> {
        self.ensure_open()?;
        if !self.capabilities.supports_batch {
            return Err(SqlDriverError::UnsupportedOperation(
                "statement does not support batches".into(),
            ));
        }
        if let Some(max) = self.session.options().max_batch_entries {
            if self.batch.len() >= max {
                return Err(SqlDriverError::UnsupportedOperation(format!(
                    "batch is limited to {max} entries"
                )));
            }
        }

        let mut values = Vec::with_capacity(self.slots.len());
        for (position, (slot, descriptor)) in self.slots.iter().zip(&self.parameters).enumerate() {
            let value = match slot {
                SlotState::Bound(value) => value.clone(),
                SlotState::Streamed(_) => {
                    return Err(SqlDriverError::UnsupportedOperation(format!(
                        "parameter {} is a stream; batches need reusable values",
                        position + 1
                    )));
                }
                SlotState::Unset | SlotState::StreamPendingRebind
                    if descriptor.mode == ParameterMode::Out =>
                {
                    SqlValue::Null
                }
                SlotState::Unset | SlotState::StreamPendingRebind => {
                    return Err(SqlDriverError::ParameterNotSet {
                        index: position + 1,
                    });
                }
            };
            values.push(value);
        }
        self.batch.push(BatchEntry { values });
        Ok(())
    }

    /// Number of entries waiting in the batch.
    #[must_use]
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Drop the pending entries; bound parameters stay as they are.
    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }

    /// Send every pending entry in one BATCH_EXECUTE and return one outcome per entry.
    ///
    /// The batch is emptied whether or not the request succeeds. An empty batch returns an
    /// empty result without contacting the engine.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::BatchPartialFailure`] carrying the outcomes of the entries that
    /// ran when the engine stops early or rejects the whole request, and otherwise the errors of
    /// [`PreparedStatement::execute`].
    pub fn execute_batch(&mut self) -> Result<Vec<BatchOutcome>, SqlDriverError> {
        self.ensure_open()?;
        let entries = self.batch.take();
        let Target::Statement(statement) = self.target else {
            return Err(SqlDriverError::UnsupportedOperation(
                "row updaters cannot batch".into(),
            ));
        };
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.chained.clear();
        self.state = StatementState::Executing;
        let outcome = self.send_batch(statement, entries);
        self.state = if outcome.is_ok() {
            StatementState::CountResult
        } else {
            StatementState::Errored
        };
        outcome
    }

    fn send_batch(
        &self,
        statement: StatementId,
        entries: Vec<BatchEntry>,
    ) -> Result<Vec<BatchOutcome>, SqlDriverError> {
        let submitted = entries.len();
        let mut rows = Vec::with_capacity(submitted);
        for entry in entries {
            let inputs = entry.values.into_iter().map(Some).collect();
            let values = self.engine_values(inputs)?;
            rows.push(
                values
                    .into_iter()
                    .map(|value| value.unwrap_or(EngineValue::Null))
                    .collect(),
            );
        }

        tracing::debug!(%statement, entries = submitted, "batch execute");
        let response = match self.session.roundtrip(Request::BatchExecute {
            statement,
            entries: rows,
        }) {
            Ok(response) => response,
            Err(SqlDriverError::Engine(cause)) => {
                return Err(SqlDriverError::BatchPartialFailure {
                    outcomes: Vec::new(),
                    cause: Some(cause),
                });
            }
            Err(other) => return Err(other),
        };

        let Response::BatchCounts {
            outcomes,
            secondary,
        } = response
        else {
            return Err(SqlDriverError::unexpected_response(
                "BatchCounts",
                response.kind(),
            ));
        };
        self.chained.record(secondary);
        if outcomes.len() > submitted {
            return Err(SqlDriverError::Protocol(format!(
                "engine reported {} outcomes for {submitted} entries",
                outcomes.len()
            )));
        }
        if outcomes.len() < submitted {
            tracing::debug!(
                %statement,
                executed = outcomes.len(),
                submitted,
                "batch stopped early"
            );
            return Err(SqlDriverError::BatchPartialFailure {
                outcomes,
                cause: self.chained.last_error(),
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_empties_the_batch() {
        let mut batch = Batch::default();
        batch.push(BatchEntry {
            values: vec![SqlValue::Int(1)],
        });
        assert_eq!(batch.len(), 1);
        let taken = batch.take();
        assert_eq!(taken.len(), 1);
        assert!(batch.is_empty());
    }

    #[test]
    fn entries_are_independent_copies() {
        let mut live = vec![SqlValue::Text("a".into())];
        let mut batch = Batch::default();
        batch.push(BatchEntry {
            values: live.clone(),
        });
        live[0] = SqlValue::Text("b".into());
        assert_eq!(batch.entries()[0].values(), &[SqlValue::Text("a".into())]);
    }
}
