use std::fmt;
use std::sync::Arc;

use crate::batch::Batch;
use crate::coercion::{CoercedValue, coerce};
use crate::engine::{
    CursorId, EngineError, EngineValue, Request, Response, SqlWarning, StatementId,
};
use crate::error::SqlDriverError;
use crate::lob::{ContentKind, DirtyColumns, DirtyMark, LargeObject, LobBackend};
use crate::results::ResultSet;
use crate::session::SessionShared;
use crate::types::{CalendarContext, ParameterMode, SqlValue, TypeCategory};

use super::descriptor::{ColumnDescriptor, ParameterDescriptor, ResultDescriptor, StatementHandle};
use super::outcome::{ChainedResults, ExecutionResult, StatementCapabilities, StatementState};
use super::slots::{ParameterStream, SlotState};

/// Where an execution goes.
#[derive(Debug)]
pub(crate) enum Target {
    /// An engine-prepared statement.
    Statement(StatementId),
    /// One row of an open cursor, updated in place.
    ResultRow {
        cursor: CursorId,
        row: u64,
        dirty: DirtyColumns,
    },
}

/// A statement prepared on a [`Session`](crate::session::Session).
///
/// Parameters are bound through 1-based indices and keep their values across executions,
/// except one-shot streams which are consumed by the execution that reads them.
///
/// ```rust
/// use sql_driver_core::prelude::*;
/// use sql_driver_core::test_utils::{ScriptedEngine, StatementScript};
///
/// let engine = ScriptedEngine::new().with_statement(
///     "insert into t values (?)",
///     StatementScript::update(1).with_parameters(vec![SqlType::Integer]),
/// );
/// let session = Session::open(engine, SessionOptions::default());
/// let mut stmt = session.prepare("insert into t values (?)").unwrap();
/// stmt.set(1, 42).unwrap();
/// assert_eq!(stmt.execute_update().unwrap(), 1);
/// ```
pub struct PreparedStatement {
    pub(crate) session: Arc<SessionShared>,
    pub(crate) target: Target,
    sql: Arc<String>,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    result: ResultDescriptor,
    pub(crate) slots: Vec<SlotState>,
    pub(crate) state: StatementState,
    pub(crate) capabilities: StatementCapabilities,
    pub(crate) batch: Batch,
    pub(crate) chained: ChainedResults,
    calendar: Option<CalendarContext>,
}

impl PreparedStatement {
    pub(crate) fn prepared(
        session: Arc<SessionShared>,
        sql: String,
        handle: StatementHandle,
    ) -> Self {
        let capabilities = StatementCapabilities {
            supports_batch: !handle.result.returns_rows(),
            returns_rows: handle.result.returns_rows(),
        };
        Self::build(
            session,
            Target::Statement(handle.id),
            sql,
            handle.parameters,
            handle.result,
            capabilities,
        )
    }

    /// Updater for one row of a result set; parameter `i` is column `i`.
    pub(crate) fn row_updater(
        session: Arc<SessionShared>,
        cursor: CursorId,
        row: u64,
        columns: &[ColumnDescriptor],
    ) -> Self {
        let parameters = columns
            .iter()
            .map(|column| ParameterDescriptor::new(column.sql_type.clone()))
            .collect();
        let sql = format!("<update {cursor} row {row}>");
        Self::build(
            session,
            Target::ResultRow {
                cursor,
                row,
                dirty: DirtyColumns::new(),
            },
            sql,
            parameters,
            ResultDescriptor::default(),
            StatementCapabilities {
                supports_batch: false,
                returns_rows: false,
            },
        )
    }

    fn build(
        session: Arc<SessionShared>,
        target: Target,
        sql: String,
        parameters: Vec<ParameterDescriptor>,
        result: ResultDescriptor,
        capabilities: StatementCapabilities,
    ) -> Self {
        let calendar = session
            .options()
            .calendar_offset_seconds
            .and_then(CalendarContext::from_offset_seconds);
        let slots = parameters.iter().map(|_| SlotState::Unset).collect();
        Self {
            session,
            target,
            sql: Arc::new(sql),
            parameters,
            result,
            slots,
            state: StatementState::Prepared,
            capabilities,
            batch: Batch::default(),
            chained: ChainedResults::new(),
            calendar,
        }
    }

    /// SQL text as sent to the engine, after escape translation.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql.as_str()
    }

    /// Engine id, `None` for row updaters.
    #[must_use]
    pub fn id(&self) -> Option<StatementId> {
        match self.target {
            Target::Statement(id) => Some(id),
            Target::ResultRow { .. } => None,
        }
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    #[must_use]
    pub fn result_descriptor(&self) -> &ResultDescriptor {
        &self.result
    }

    #[must_use]
    pub fn state(&self) -> StatementState {
        self.state
    }

    #[must_use]
    pub fn capabilities(&self) -> StatementCapabilities {
        self.capabilities
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == StatementState::Closed
    }

    /// Zone applied to unzoned temporal parameters. Defaults to the session's calendar.
    pub fn set_calendar(&mut self, calendar: Option<CalendarContext>) {
        self.calendar = calendar;
    }

    /// Binding state of the 1-based parameter `index`.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::ParameterIndexOutOfRange`] for an index outside `1..=N`.
    pub fn slot_state(&self, index: usize) -> Result<&SlotState, SqlDriverError> {
        let position = self.position(index)?;
        Ok(&self.slots[position])
    }

    /// Bind a reusable value to the 1-based parameter `index`.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::StatementClosed`], [`SqlDriverError::ConnectionClosed`] or
    /// [`SqlDriverError::ParameterIndexOutOfRange`].
    pub fn set(&mut self, index: usize, value: impl Into<SqlValue>) -> Result<(), SqlDriverError> {
        *self.slot_mut(index)? = SlotState::Bound(value.into());
        Ok(())
    }

    /// Bind SQL NULL.
    ///
    /// # Errors
    /// Same as [`PreparedStatement::set`].
    pub fn set_null(&mut self, index: usize) -> Result<(), SqlDriverError> {
        self.set(index, SqlValue::Null)
    }

    /// Bind the current handle of a large object.
    ///
    /// # Errors
    /// Same as [`PreparedStatement::set`], plus [`SqlDriverError::LobClosed`] for a freed object.
    pub fn set_lob<K: ContentKind>(
        &mut self,
        index: usize,
        lob: &LargeObject<K>,
    ) -> Result<(), SqlDriverError> {
        if lob.is_freed() {
            return Err(SqlDriverError::LobClosed);
        }
        self.set(index, SqlValue::Lob(lob.handle()))
    }

    /// Bind a one-shot stream, read in full by the next execution.
    ///
    /// # Errors
    /// Same as [`PreparedStatement::set`].
    pub fn set_stream(
        &mut self,
        index: usize,
        stream: ParameterStream,
    ) -> Result<(), SqlDriverError> {
        *self.slot_mut(index)? = SlotState::Streamed(stream);
        Ok(())
    }

    /// Return every slot to `Unset`.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::StatementClosed`] or [`SqlDriverError::ConnectionClosed`].
    pub fn clear_parameters(&mut self) -> Result<(), SqlDriverError> {
        self.ensure_open()?;
        self.slots.iter_mut().for_each(|slot| *slot = SlotState::Unset);
        Ok(())
    }

    /// Ownership mark for a large object edited in place in column `column` of the row this
    /// statement updates. Pending duplicates are sent with the next execution for columns left
    /// unbound.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::UnsupportedOperation`] for ordinary statements and
    /// [`SqlDriverError::ParameterIndexOutOfRange`] for an unknown column.
    pub fn lob_owner(&self, column: usize) -> Result<DirtyMark, SqlDriverError> {
        let Target::ResultRow { dirty, .. } = &self.target else {
            return Err(SqlDriverError::UnsupportedOperation(
                "only row updaters own large objects".into(),
            ));
        };
        let position = self.position(column)?;
        if self.parameters[position].sql_type.category() != TypeCategory::LargeObject {
            return Err(SqlDriverError::UnsupportedOperation(format!(
                "column {column} is not a large object"
            )));
        }
        Ok(dirty.mark(column))
    }

    /// Run the statement with the current bindings.
    ///
    /// # Errors
    /// Misuse is reported before anything is sent: [`SqlDriverError::StatementClosed`],
    /// [`SqlDriverError::ConnectionClosed`], [`SqlDriverError::ParameterNotSet`] or
    /// [`SqlDriverError::TypeConversion`]. Engine failures surface as
    /// [`SqlDriverError::Engine`] and leave the statement `Errored` but reusable.
    pub fn execute(&mut self) -> Result<ExecutionResult, SqlDriverError> {
        self.ensure_open()?;
        self.chained.clear();
        let inputs = self.take_inputs()?;
        self.state = StatementState::Executing;
        let outcome = self.run(inputs);
        self.state = match &outcome {
            Ok(ExecutionResult::Rows(_)) => StatementState::RowResult,
            Ok(ExecutionResult::Count(_)) => StatementState::CountResult,
            Err(_) => StatementState::Errored,
        };
        outcome
    }

    /// Execute a row-producing statement.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::UnsupportedOperation`] if the statement returns no rows,
    /// otherwise as [`PreparedStatement::execute`].
    pub fn execute_query(&mut self) -> Result<ResultSet, SqlDriverError> {
        if !self.capabilities.returns_rows {
            return Err(SqlDriverError::UnsupportedOperation(
                "statement does not return rows".into(),
            ));
        }
        match self.execute()? {
            ExecutionResult::Rows(rows) => Ok(rows),
            ExecutionResult::Count(_) => {
                Err(SqlDriverError::unexpected_response("Rows", "UpdateCount"))
            }
        }
    }

    /// Execute a statement that reports an update count.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::UnsupportedOperation`] if the statement returns rows,
    /// otherwise as [`PreparedStatement::execute`].
    pub fn execute_update(&mut self) -> Result<u64, SqlDriverError> {
        if self.capabilities.returns_rows {
            return Err(SqlDriverError::UnsupportedOperation(
                "statement returns rows".into(),
            ));
        }
        match self.execute()? {
            ExecutionResult::Count(count) => Ok(count),
            ExecutionResult::Rows(_) => {
                Err(SqlDriverError::unexpected_response("UpdateCount", "Rows"))
            }
        }
    }

    /// Warnings from the most recent execution, oldest first.
    #[must_use]
    pub fn warnings(&self) -> Vec<SqlWarning> {
        self.chained.warnings()
    }

    pub fn clear_warnings(&self) {
        self.chained.clear();
    }

    /// Errors the engine chained onto the most recent response without failing it.
    #[must_use]
    pub fn secondary_errors(&self) -> Vec<EngineError> {
        self.chained.errors()
    }

    /// Keys generated by the most recent execution, if the engine reported any.
    #[must_use]
    pub fn generated_keys(&self) -> Option<ResultSet> {
        self.chained.generated_keys()
    }

    /// Release the engine-side statement. Further calls do nothing.
    ///
    /// No request is sent while the session is closing; the engine reclaims the statement with
    /// the session.
    ///
    /// # Errors
    /// Returns the engine or transport error from FREE_STATEMENT; the statement is closed
    /// regardless.
    pub fn close(&mut self) -> Result<(), SqlDriverError> {
        if self.state == StatementState::Closed {
            return Ok(());
        }
        self.state = StatementState::Closed;
        self.batch.clear();
        self.slots.iter_mut().for_each(|slot| *slot = SlotState::Unset);
        let Target::Statement(statement) = self.target else {
            return Ok(());
        };
        if self.session.is_closing() {
            tracing::debug!(%statement, "session closing, statement left to the engine");
            return Ok(());
        }
        match self.session.roundtrip(Request::FreeStatement { statement })? {
            Response::Ack => Ok(()),
            other => Err(SqlDriverError::unexpected_response("Ack", other.kind())),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SqlDriverError> {
        if self.state == StatementState::Closed {
            return Err(SqlDriverError::StatementClosed);
        }
        if self.session.is_closed() {
            return Err(SqlDriverError::ConnectionClosed);
        }
        Ok(())
    }

    fn position(&self, index: usize) -> Result<usize, SqlDriverError> {
        let count = self.slots.len();
        if index == 0 || index > count {
            return Err(SqlDriverError::ParameterIndexOutOfRange { index, count });
        }
        Ok(index - 1)
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut SlotState, SqlDriverError> {
        self.ensure_open()?;
        let position = self.position(index)?;
        Ok(&mut self.slots[position])
    }

    /// Values for the next execution; `None` leaves a row column unchanged.
    ///
    /// Every slot is checked before any stream is consumed, so a missing binding leaves the
    /// streams in place.
    fn take_inputs(&mut self) -> Result<Vec<Option<SqlValue>>, SqlDriverError> {
        let row_update = matches!(self.target, Target::ResultRow { .. });
        for (position, (slot, descriptor)) in self.slots.iter().zip(&self.parameters).enumerate() {
            if !slot.is_ready() && descriptor.mode.requires_input() && !row_update {
                return Err(SqlDriverError::ParameterNotSet {
                    index: position + 1,
                });
            }
        }

        let mut inputs = Vec::with_capacity(self.slots.len());
        for (slot, descriptor) in self.slots.iter_mut().zip(&self.parameters) {
            let input = match std::mem::take(slot) {
                SlotState::Bound(value) => {
                    *slot = SlotState::Bound(value.clone());
                    Some(value)
                }
                SlotState::Streamed(stream) => {
                    *slot = SlotState::StreamPendingRebind;
                    Some(stream.consume()?)
                }
                idle => {
                    *slot = idle;
                    (descriptor.mode == ParameterMode::Out).then_some(SqlValue::Null)
                }
            };
            inputs.push(input);
        }
        Ok(inputs)
    }

    /// Coerce every value and give client-side large objects an engine handle.
    pub(crate) fn engine_values(
        &self,
        inputs: Vec<Option<SqlValue>>,
    ) -> Result<Vec<Option<EngineValue>>, SqlDriverError> {
        let coerced = inputs
            .iter()
            .zip(&self.parameters)
            .map(|(input, descriptor)| {
                input
                    .as_ref()
                    .map(|value| coerce(&descriptor.sql_type, value, self.calendar.as_ref()))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        coerced
            .into_iter()
            .map(|value| match value {
                Some(CoercedValue::Ready(value)) => Ok(Some(value)),
                Some(CoercedValue::PendingLob(payload)) => {
                    let lob = self.session.create_lob(payload)?;
                    Ok(Some(EngineValue::Lob(lob)))
                }
                None => Ok(None),
            })
            .collect()
    }

    fn run(&self, inputs: Vec<Option<SqlValue>>) -> Result<ExecutionResult, SqlDriverError> {
        let values = self.engine_values(inputs)?;
        match &self.target {
            Target::Statement(statement) => {
                let statement = *statement;
                tracing::debug!(%statement, parameters = values.len(), "execute");
                let parameters = values
                    .into_iter()
                    .map(|value| value.unwrap_or(EngineValue::Null))
                    .collect();
                let response = self.session.roundtrip(Request::Execute {
                    statement,
                    parameters,
                })?;
                self.accept(response)
            }
            Target::ResultRow { cursor, row, dirty } => {
                let columns = values
                    .into_iter()
                    .enumerate()
                    .map(|(position, value)| {
                        value.or_else(|| dirty.get(position + 1).map(EngineValue::Lob))
                    })
                    .collect();
                let request = Request::UpdateResultRow {
                    cursor: *cursor,
                    row: *row,
                    columns,
                };
                tracing::debug!(%cursor, row, "update result row");
                let response = self.session.roundtrip(request)?;
                dirty.clear();
                match response {
                    Response::Ack => Ok(ExecutionResult::Count(1)),
                    other => self.accept(other),
                }
            }
        }
    }

    fn accept(&self, response: Response) -> Result<ExecutionResult, SqlDriverError> {
        match response {
            Response::Rows {
                cursor,
                columns,
                rows,
                secondary,
            } => {
                self.chained.record(secondary);
                Ok(ExecutionResult::Rows(ResultSet::from_engine(
                    Some(cursor),
                    &columns,
                    rows,
                )))
            }
            Response::UpdateCount { count, secondary } => {
                self.chained.record(secondary);
                Ok(ExecutionResult::Count(count))
            }
            other => Err(SqlDriverError::unexpected_response(
                "Rows or UpdateCount",
                other.kind(),
            )),
        }
    }
}

impl fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("target", &self.target)
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("slots", &self.slots)
            .field("batch", &self.batch.len())
            .finish_non_exhaustive()
    }
}

impl Drop for PreparedStatement {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "closing dropped statement failed");
        }
    }
}
