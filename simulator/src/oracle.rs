use sql_driver_core::lob::Blob;
use sql_driver_core::lob::LobPayload;
use sql_driver_core::statement::PreparedStatement;

use crate::driver::SimSession;
use crate::model::SessionModel;

pub(crate) struct Oracle;

impl Oracle {
    /// Compare one session's observable state with its model.
    pub(crate) fn check(sim: &SimSession) -> Result<(), String> {
        let model = &sim.model;
        let id = sim.id;
        Self::check_journal(id, sim, model)?;
        Self::check_statement(id, sim.statement.as_ref(), model)?;
        Self::check_lob(id, sim, sim.blob.as_ref(), model)
    }

    fn check_journal(id: usize, sim: &SimSession, model: &SessionModel) -> Result<(), String> {
        let expected = [
            ("EXECUTE", model.executes),
            ("BATCH_EXECUTE", model.batches),
            ("FREE_STATEMENT", model.frees),
            ("LOB_DUPLICATE", model.duplicates),
        ];
        for (kind, count) in expected {
            let seen = sim.journal.count(kind);
            if seen != count {
                return Err(format!(
                    "session {id}: engine saw {seen} {kind} requests, expected {count}"
                ));
            }
        }
        Ok(())
    }

    fn check_statement(
        id: usize,
        statement: Option<&PreparedStatement>,
        model: &SessionModel,
    ) -> Result<(), String> {
        match (statement, &model.statement) {
            (None, None) => Ok(()),
            (Some(stmt), Some(expected)) => {
                if stmt.is_closed() {
                    return Err(format!("session {id}: live statement reports closed"));
                }
                if stmt.batch_len() != expected.batch_len {
                    return Err(format!(
                        "session {id}: batch holds {} entries, expected {}",
                        stmt.batch_len(),
                        expected.batch_len
                    ));
                }
                Ok(())
            }
            (Some(_), None) => Err(format!("session {id}: statement outlived its model")),
            (None, Some(_)) => Err(format!("session {id}: modelled statement is missing")),
        }
    }

    fn check_lob(
        id: usize,
        sim: &SimSession,
        blob: Option<&Blob>,
        model: &SessionModel,
    ) -> Result<(), String> {
        let (blob, expected) = match (blob, &model.lob) {
            (None, None) => return Ok(()),
            (Some(blob), Some(expected)) => (blob, expected),
            _ => return Err(format!("session {id}: large object presence diverged")),
        };
        let current = blob
            .read_all()
            .map_err(|err| format!("session {id}: reading large object failed: {err}"))?;
        if current != expected.current {
            return Err(format!(
                "session {id}: large object reads {current:?}, expected {:?}",
                expected.current
            ));
        }
        let baseline = sim.store.contents(blob.original().id);
        if baseline != Some(LobPayload::Binary(expected.original.clone())) {
            return Err(format!(
                "session {id}: baseline object holds {baseline:?}, expected {:?}",
                expected.original
            ));
        }
        Ok(())
    }
}
