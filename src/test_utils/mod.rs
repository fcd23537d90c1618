//! In-memory engine for tests, doctests and the simulator.
//!
//! [`ScriptedEngine`] answers PREPARE for SQL it was given a [`StatementScript`] for, replays
//! the scripted outcome on every EXECUTE, keeps large objects in a [`MemoryLobStore`] and
//! records every request in a shared [`RequestJournal`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::engine::{
    BatchOutcome, CursorId, Engine, EngineError, EngineValue, Request, Response,
    SecondaryResult, StatementId, TransportError,
};
use crate::error::SqlDriverError;
use crate::lob::{LobBackend, MemoryLobStore};
use crate::statement::{ColumnDescriptor, ParameterDescriptor, ResultDescriptor};
use crate::types::SqlType;

/// What the engine does when a scripted statement executes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Count(u64),
    Rows(Vec<Vec<EngineValue>>),
    Fail(EngineError),
}

/// Canned behaviour for one SQL text.
#[derive(Debug, Clone)]
pub struct StatementScript {
    parameters: Vec<ParameterDescriptor>,
    columns: Vec<ColumnDescriptor>,
    outcome: ScriptedOutcome,
    secondary: Vec<SecondaryResult>,
    batch_fail_at: Option<usize>,
    reject_batches: Option<EngineError>,
}

impl StatementScript {
    /// Statement reporting `count` affected rows.
    #[must_use]
    pub fn update(count: u64) -> Self {
        Self::with_outcome(Vec::new(), ScriptedOutcome::Count(count))
    }

    /// Statement returning `rows` under `columns`.
    #[must_use]
    pub fn query(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<EngineValue>>) -> Self {
        Self::with_outcome(columns, ScriptedOutcome::Rows(rows))
    }

    /// Statement whose executions fail with `error`.
    #[must_use]
    pub fn failing(error: EngineError) -> Self {
        Self::with_outcome(Vec::new(), ScriptedOutcome::Fail(error))
    }

    fn with_outcome(columns: Vec<ColumnDescriptor>, outcome: ScriptedOutcome) -> Self {
        Self {
            parameters: Vec::new(),
            columns,
            outcome,
            secondary: Vec::new(),
            batch_fail_at: None,
            reject_batches: None,
        }
    }

    /// Nullable IN parameters of the given types.
    #[must_use]
    pub fn with_parameters(self, types: Vec<SqlType>) -> Self {
        self.with_parameter_descriptors(types.into_iter().map(ParameterDescriptor::new).collect())
    }

    #[must_use]
    pub fn with_parameter_descriptors(mut self, parameters: Vec<ParameterDescriptor>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Secondary results chained onto every response.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Vec<SecondaryResult>) -> Self {
        self.secondary = secondary;
        self
    }

    /// Stop batches at the 0-based entry `index`, reporting outcomes for the entries before it.
    #[must_use]
    pub fn failing_batch_at(mut self, index: usize) -> Self {
        self.batch_fail_at = Some(index);
        self
    }

    /// Reject every batch request as a whole.
    #[must_use]
    pub fn rejecting_batches(mut self, error: EngineError) -> Self {
        self.reject_batches = Some(error);
        self
    }
}

/// Shared log of the requests an engine received, in order.
#[derive(Debug, Clone, Default)]
pub struct RequestJournal {
    inner: Arc<Mutex<Vec<Request>>>,
}

impl RequestJournal {
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.lock().clone()
    }

    /// Wire names of the recorded requests.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.lock().iter().map(Request::kind).collect()
    }

    /// How many requests of the wire kind `kind` were recorded.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.lock().iter().filter(|r| r.kind() == kind).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, request: Request) {
        self.lock().push(request);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Request>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Engine double answering from scripts.
#[derive(Debug)]
pub struct ScriptedEngine {
    scripts: HashMap<String, StatementScript>,
    prepared: HashMap<StatementId, String>,
    next_statement: u64,
    next_cursor: u64,
    lobs: Arc<MemoryLobStore>,
    journal: RequestJournal,
    ping_delay: Option<Duration>,
    closed: bool,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            prepared: HashMap::new(),
            next_statement: 1,
            next_cursor: 1,
            lobs: Arc::new(MemoryLobStore::new()),
            journal: RequestJournal::default(),
            ping_delay: None,
            closed: false,
        }
    }

    /// Answer PREPARE of exactly `sql` with `script`.
    #[must_use]
    pub fn with_statement(mut self, sql: impl Into<String>, script: StatementScript) -> Self {
        self.scripts.insert(sql.into(), script);
        self
    }

    /// Delay every PING answer, for probe timeouts.
    #[must_use]
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    /// Handle on the request log; stays valid after the engine moves into a session.
    #[must_use]
    pub fn journal(&self) -> RequestJournal {
        self.journal.clone()
    }

    /// Handle on the large-object storage.
    #[must_use]
    pub fn lob_store(&self) -> Arc<MemoryLobStore> {
        Arc::clone(&self.lobs)
    }

    fn script(&self, statement: StatementId) -> Result<&StatementScript, EngineError> {
        self.prepared
            .get(&statement)
            .and_then(|sql| self.scripts.get(sql))
            .ok_or_else(|| engine_error(404, format!("unknown statement {statement}")))
    }

    fn answer(&mut self, request: Request) -> Result<Response, EngineError> {
        match request {
            Request::Prepare { sql } => {
                let script = self
                    .scripts
                    .get(&sql)
                    .ok_or_else(|| engine_error(42, format!("cannot prepare: {sql}")))?;
                let statement = StatementId(self.next_statement);
                self.next_statement += 1;
                let response = Response::Prepared {
                    statement,
                    parameters: script.parameters.clone(),
                    result: ResultDescriptor::new(script.columns.clone()),
                };
                self.prepared.insert(statement, sql);
                Ok(response)
            }
            Request::Execute {
                statement,
                parameters,
            } => {
                let script = self.script(statement)?.clone();
                if parameters.len() != script.parameters.len() {
                    return Err(engine_error(
                        7,
                        format!(
                            "expected {} parameters, got {}",
                            script.parameters.len(),
                            parameters.len()
                        ),
                    ));
                }
                match script.outcome {
                    ScriptedOutcome::Count(count) => Ok(Response::UpdateCount {
                        count,
                        secondary: script.secondary,
                    }),
                    ScriptedOutcome::Rows(rows) => {
                        let cursor = CursorId(self.next_cursor);
                        self.next_cursor += 1;
                        Ok(Response::Rows {
                            cursor,
                            columns: script.columns,
                            rows,
                            secondary: script.secondary,
                        })
                    }
                    ScriptedOutcome::Fail(error) => Err(error),
                }
            }
            Request::BatchExecute { statement, entries } => {
                let script = self.script(statement)?;
                if let Some(error) = &script.reject_batches {
                    return Err(error.clone());
                }
                let per_entry = match script.outcome {
                    ScriptedOutcome::Count(count) => BatchOutcome::Count(count),
                    _ => BatchOutcome::SuccessNoInfo,
                };
                let executed = script
                    .batch_fail_at
                    .map_or(entries.len(), |index| index.min(entries.len()));
                let mut secondary = script.secondary.clone();
                if executed < entries.len() {
                    secondary.push(SecondaryResult::Error(engine_error(
                        23,
                        format!("batch entry {executed} failed"),
                    )));
                }
                Ok(Response::BatchCounts {
                    outcomes: vec![per_entry; executed],
                    secondary,
                })
            }
            Request::FreeStatement { statement } => self
                .prepared
                .remove(&statement)
                .map(|_| Response::Ack)
                .ok_or_else(|| engine_error(404, format!("unknown statement {statement}"))),
            Request::LobCreate { payload } => self
                .lobs
                .create_lob(payload)
                .map(Response::Lob)
                .map_err(lob_error),
            Request::LobDuplicate { lob } => self
                .lobs
                .duplicate_lob(lob)
                .map(Response::Lob)
                .map_err(lob_error),
            Request::LobRead {
                lob,
                position,
                length,
            } => self
                .lobs
                .read_lob(lob, position, length)
                .map(Response::LobData)
                .map_err(lob_error),
            Request::LobWrite {
                lob,
                position,
                payload,
            } => self
                .lobs
                .write_lob(lob, position, payload)
                .map(Response::LobLength)
                .map_err(lob_error),
            Request::LobTruncate { lob, length } => self
                .lobs
                .truncate_lob(lob, length)
                .map(|()| Response::Ack)
                .map_err(lob_error),
            Request::LobFree { lob } => self
                .lobs
                .free_lob(lob)
                .map(|()| Response::Ack)
                .map_err(lob_error),
            Request::UpdateResultRow { .. } => Ok(Response::Ack),
            Request::Ping => {
                if let Some(delay) = self.ping_delay {
                    thread::sleep(delay);
                }
                Ok(Response::Ack)
            }
            Request::CloseSession => {
                self.closed = true;
                Ok(Response::Ack)
            }
        }
    }
}

impl Engine for ScriptedEngine {
    fn exchange(&mut self, request: Request) -> Result<Response, TransportError> {
        if self.closed {
            return Err(TransportError("session already closed".into()));
        }
        self.journal.push(request.clone());
        Ok(self.answer(request).unwrap_or_else(Response::Error))
    }
}

fn engine_error(code: i32, message: String) -> EngineError {
    EngineError {
        code,
        sql_state: None,
        message,
    }
}

fn lob_error(err: SqlDriverError) -> EngineError {
    engine_error(90, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sql_is_an_engine_error() {
        let mut engine = ScriptedEngine::new();
        let response = engine
            .exchange(Request::Prepare {
                sql: "select 1".into(),
            })
            .unwrap();
        assert!(matches!(response, Response::Error(EngineError { code: 42, .. })));
    }

    #[test]
    fn batch_stops_at_scripted_entry() {
        let mut engine = ScriptedEngine::new()
            .with_statement("ins", StatementScript::update(1).failing_batch_at(2));
        let Response::Prepared { statement, .. } =
            engine.exchange(Request::Prepare { sql: "ins".into() }).unwrap()
        else {
            panic!("expected prepared");
        };
        let response = engine
            .exchange(Request::BatchExecute {
                statement,
                entries: vec![Vec::new(); 4],
            })
            .unwrap();
        let Response::BatchCounts {
            outcomes,
            secondary,
        } = response
        else {
            panic!("expected batch counts, got {response:?}");
        };
        assert_eq!(outcomes.len(), 2);
        assert_eq!(secondary.len(), 1);
    }

    #[test]
    fn journal_records_in_order() {
        let mut engine = ScriptedEngine::new();
        let journal = engine.journal();
        engine.exchange(Request::Ping).unwrap();
        engine.exchange(Request::CloseSession).unwrap();
        assert_eq!(journal.kinds(), vec!["PING", "CLOSE_SESSION"]);
        assert!(engine.exchange(Request::Ping).is_err());
    }
}
