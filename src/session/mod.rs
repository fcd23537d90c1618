//! Sessions: the engine handle, escape translation before PREPARE, statement creation and
//! large-object allocation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::{Engine, Request, Response};
use crate::error::SqlDriverError;
use crate::lob::{Blob, Clob, LobBackend, LobPayload, LobRef};
use crate::results::ResultSet;
use crate::statement::{ColumnDescriptor, PreparedStatement, StatementHandle};
use crate::translation::{PrepareOptions, translate_escapes};

mod config;
mod probe;

pub use config::{SessionOptions, SessionOptionsBuilder};

/// State shared by a session and every statement and large object created from it.
pub(crate) struct SessionShared {
    engine: Mutex<Box<dyn Engine>>,
    closing: AtomicBool,
    closed: AtomicBool,
    options: SessionOptions,
}

impl SessionShared {
    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether statements should skip releasing themselves on the engine.
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire) || self.is_closed()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// One request/response exchange. Engine-reported failures become
    /// [`SqlDriverError::Engine`].
    pub(crate) fn roundtrip(&self, request: Request) -> Result<Response, SqlDriverError> {
        if self.is_closed() {
            return Err(SqlDriverError::ConnectionClosed);
        }
        self.exchange(request)
    }

    fn exchange(&self, request: Request) -> Result<Response, SqlDriverError> {
        let kind = request.kind();
        tracing::debug!(request = kind, "engine exchange");
        let response = self.lock_engine().exchange(request)?;
        match response {
            Response::Error(err) => {
                tracing::debug!(request = kind, code = err.code, "engine reported error");
                Err(SqlDriverError::Engine(err))
            }
            other => Ok(other),
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, Box<dyn Engine>> {
        match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl LobBackend for SessionShared {
    fn create_lob(&self, payload: LobPayload) -> Result<LobRef, SqlDriverError> {
        match self.roundtrip(Request::LobCreate { payload })? {
            Response::Lob(lob) => Ok(lob),
            other => Err(SqlDriverError::unexpected_response("Lob", other.kind())),
        }
    }

    fn duplicate_lob(&self, lob: LobRef) -> Result<LobRef, SqlDriverError> {
        match self.roundtrip(Request::LobDuplicate { lob })? {
            Response::Lob(duplicate) => Ok(duplicate),
            other => Err(SqlDriverError::unexpected_response("Lob", other.kind())),
        }
    }

    fn read_lob(
        &self,
        lob: LobRef,
        position: u64,
        length: u64,
    ) -> Result<LobPayload, SqlDriverError> {
        match self.roundtrip(Request::LobRead {
            lob,
            position,
            length,
        })? {
            Response::LobData(payload) => Ok(payload),
            other => Err(SqlDriverError::unexpected_response("LobData", other.kind())),
        }
    }

    fn write_lob(
        &self,
        lob: LobRef,
        position: u64,
        payload: LobPayload,
    ) -> Result<u64, SqlDriverError> {
        match self.roundtrip(Request::LobWrite {
            lob,
            position,
            payload,
        })? {
            Response::LobLength(length) => Ok(length),
            other => Err(SqlDriverError::unexpected_response("LobLength", other.kind())),
        }
    }

    fn truncate_lob(&self, lob: LobRef, length: u64) -> Result<(), SqlDriverError> {
        match self.roundtrip(Request::LobTruncate { lob, length })? {
            Response::Ack => Ok(()),
            other => Err(SqlDriverError::unexpected_response("Ack", other.kind())),
        }
    }

    fn free_lob(&self, lob: LobRef) -> Result<(), SqlDriverError> {
        if self.is_closing() {
            return Ok(());
        }
        match self.roundtrip(Request::LobFree { lob })? {
            Response::Ack => Ok(()),
            other => Err(SqlDriverError::unexpected_response("Ack", other.kind())),
        }
    }
}

/// A conversation with the engine.
///
/// Clones share the same engine handle, so one clone may close the session while another is
/// in use; operations started afterwards fail with [`SqlDriverError::ConnectionClosed`].
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine", &"<Engine>")
            .field("options", &self.shared.options)
            .field("closing", &self.shared.closing.load(Ordering::Relaxed))
            .field("closed", &self.shared.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Session {
    /// Wrap an engine connection.
    pub fn open(engine: impl Engine + 'static, options: SessionOptions) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                engine: Mutex::new(Box::new(engine)),
                closing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                options,
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.shared.options
    }

    /// Prepare `sql`, translating escapes if the session has escape processing on.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::ConnectionClosed`], [`SqlDriverError::EscapeSyntax`] before
    /// anything is sent, or the engine's error for the PREPARE.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement, SqlDriverError> {
        self.prepare_with(sql, PrepareOptions::default())
    }

    /// Prepare `sql` with a per-call escape setting.
    ///
    /// # Errors
    /// Same as [`Session::prepare`].
    pub fn prepare_with(
        &self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<PreparedStatement, SqlDriverError> {
        self.ensure_open()?;
        let native = if options.escape.resolve(self.shared.options.escape_processing) {
            translate_escapes(sql)?.into_owned()
        } else {
            sql.to_owned()
        };
        let response = self.shared.roundtrip(Request::Prepare {
            sql: native.clone(),
        })?;
        let Response::Prepared {
            statement,
            parameters,
            result,
        } = response
        else {
            return Err(SqlDriverError::unexpected_response(
                "Prepared",
                response.kind(),
            ));
        };
        tracing::debug!(
            %statement,
            parameters = parameters.len(),
            columns = result.columns.len(),
            "statement prepared"
        );
        Ok(PreparedStatement::prepared(
            Arc::clone(&self.shared),
            native,
            StatementHandle {
                id: statement,
                parameters,
                result,
            },
        ))
    }

    /// The native form of `sql`; escapes are always translated.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::EscapeSyntax`] for malformed escapes.
    pub fn native_sql(&self, sql: &str) -> Result<String, SqlDriverError> {
        Ok(translate_escapes(sql)?.into_owned())
    }

    /// Allocate a binary large object on the engine. Freeing it releases the engine copy.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::ConnectionClosed`] or the engine's error for LOB_CREATE.
    pub fn create_blob(&self, data: &[u8]) -> Result<Blob, SqlDriverError> {
        self.ensure_open()?;
        let lob = self.shared.create_lob(LobPayload::Binary(data.to_vec()))?;
        Ok(Blob::open(self.backend(), lob)?.owned())
    }

    /// Allocate a character large object on the engine.
    ///
    /// # Errors
    /// Same as [`Session::create_blob`].
    pub fn create_clob(&self, text: &str) -> Result<Clob, SqlDriverError> {
        self.ensure_open()?;
        let lob = self.shared.create_lob(LobPayload::Character(text.to_owned()))?;
        Ok(Clob::open(self.backend(), lob)?.owned())
    }

    /// View a binary large object the engine returned, for example in a result row.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::TypeConversion`] for a character object.
    pub fn open_blob(&self, lob: LobRef) -> Result<Blob, SqlDriverError> {
        self.ensure_open()?;
        Blob::open(self.backend(), lob)
    }

    /// View a character large object the engine returned.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::TypeConversion`] for a binary object.
    pub fn open_clob(&self, lob: LobRef) -> Result<Clob, SqlDriverError> {
        self.ensure_open()?;
        Clob::open(self.backend(), lob)
    }

    /// Statement that updates row `row` (0-based) of `rows` in place. Parameter `i` is
    /// column `i`; unbound parameters leave their column unchanged.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::UnsupportedOperation`] if the result set has no cursor or the
    /// row is outside it.
    pub fn row_updater(
        &self,
        rows: &ResultSet,
        row: usize,
    ) -> Result<PreparedStatement, SqlDriverError> {
        self.ensure_open()?;
        let cursor = rows.cursor().ok_or_else(|| {
            SqlDriverError::UnsupportedOperation("result set has no engine cursor".into())
        })?;
        if row >= rows.len() {
            return Err(SqlDriverError::UnsupportedOperation(format!(
                "row {row} is outside the result set of {} rows",
                rows.len()
            )));
        }
        let columns: Vec<ColumnDescriptor> = rows
            .column_names()
            .iter()
            .zip(rows.column_types())
            .map(|(name, sql_type)| ColumnDescriptor::new(name.clone(), sql_type.clone()))
            .collect();
        Ok(PreparedStatement::row_updater(
            Arc::clone(&self.shared),
            cursor,
            row as u64,
            &columns,
        ))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Probe the engine with PING, waiting at most `timeout`.
    ///
    /// Returns `false` for a closed session, a failed ping or an expired wait.
    #[must_use]
    pub fn is_valid(&self, timeout: Duration) -> bool {
        if self.is_closed() {
            return false;
        }
        probe::probe(&self.shared, timeout)
    }

    /// [`Session::is_valid`] with the configured `probe_timeout_ms`.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_valid(Duration::from_millis(self.shared.options.probe_timeout_ms))
    }

    /// End the session. Statements and large objects created from it stop working and no
    /// longer release themselves individually. Further calls do nothing.
    ///
    /// # Errors
    /// Returns the engine or transport error for CLOSE_SESSION; the session is closed
    /// regardless.
    pub fn close(&self) -> Result<(), SqlDriverError> {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!("closing session");
        let outcome = self.shared.exchange(Request::CloseSession);
        self.shared.closed.store(true, Ordering::Release);
        match outcome? {
            Response::Ack => Ok(()),
            other => Err(SqlDriverError::unexpected_response("Ack", other.kind())),
        }
    }

    fn ensure_open(&self) -> Result<(), SqlDriverError> {
        if self.shared.is_closing() {
            Err(SqlDriverError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    fn backend(&self) -> Arc<dyn LobBackend> {
        Arc::clone(&self.shared) as Arc<dyn LobBackend>
    }
}
