use sql_driver_core::engine::{BatchOutcome, EngineError, EngineValue, Request};
use sql_driver_core::prelude::*;
use sql_driver_core::test_utils::{RequestJournal, ScriptedEngine, StatementScript};

const INSERT: &str = "insert into t (a, b) values (?, ?)";

fn session_with(script: StatementScript) -> (Session, RequestJournal) {
    session_with_options(script, SessionOptions::default())
}

fn session_with_options(
    script: StatementScript,
    options: SessionOptions,
) -> (Session, RequestJournal) {
    let engine = ScriptedEngine::new().with_statement(
        INSERT,
        script.with_parameters(vec![SqlType::Integer, SqlType::VarChar]),
    );
    let journal = engine.journal();
    (Session::open(engine, options), journal)
}

#[test]
fn test4_partial_failure_reports_prefix() -> Result<(), Box<dyn std::error::Error>> {
    let (session, _journal) = session_with(StatementScript::update(1).failing_batch_at(3));
    let mut stmt = session.prepare(INSERT)?;
    for i in 0..4 {
        stmt.set(1, i)?;
        stmt.set(2, format!("row {i}"))?;
        stmt.add_batch()?;
    }
    match stmt.execute_batch() {
        Err(SqlDriverError::BatchPartialFailure { outcomes, cause }) => {
            assert_eq!(outcomes.len(), 3);
            assert!(outcomes.iter().all(|o| *o == BatchOutcome::Count(1)));
            assert!(cause.is_some());
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(stmt.batch_len(), 0);
    assert_eq!(stmt.state(), StatementState::Errored);
    Ok(())
}

#[test]
fn test4_entries_are_snapshots() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal) = session_with(StatementScript::update(1));
    let mut stmt = session.prepare(INSERT)?;
    stmt.set(1, 1)?;
    stmt.set(2, "first")?;
    stmt.add_batch()?;
    stmt.set(2, "second")?;
    stmt.add_batch()?;
    stmt.set(1, 99)?;

    let outcomes = stmt.execute_batch()?;
    assert_eq!(outcomes, vec![BatchOutcome::Count(1); 2]);
    let Some(Request::BatchExecute { entries, .. }) = journal.requests().pop() else {
        panic!("expected BATCH_EXECUTE");
    };
    assert_eq!(
        entries,
        vec![
            vec![EngineValue::Integer(1), EngineValue::Text("first".into())],
            vec![EngineValue::Integer(1), EngineValue::Text("second".into())],
        ]
    );
    // Live slots are untouched by the batch.
    assert!(matches!(stmt.slot_state(1)?, SlotState::Bound(SqlValue::Int(99))));
    Ok(())
}

#[test]
fn test4_empty_batch_skips_the_engine() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal) = session_with(StatementScript::update(1));
    let mut stmt = session.prepare(INSERT)?;
    journal.clear();
    assert!(stmt.execute_batch()?.is_empty());
    assert!(journal.is_empty());
    Ok(())
}

#[test]
fn test4_add_batch_checks_slots() -> Result<(), Box<dyn std::error::Error>> {
    let (session, _journal) = session_with(StatementScript::update(1));
    let mut stmt = session.prepare(INSERT)?;
    stmt.set(1, 1)?;
    assert!(matches!(
        stmt.add_batch(),
        Err(SqlDriverError::ParameterNotSet { index: 2 })
    ));
    stmt.set_stream(
        2,
        ParameterStream::character(std::io::Cursor::new(b"abc".to_vec())),
    )?;
    assert!(matches!(
        stmt.add_batch(),
        Err(SqlDriverError::UnsupportedOperation(_))
    ));
    assert_eq!(stmt.batch_len(), 0);
    Ok(())
}

#[test]
fn test4_clear_batch_keeps_slots() -> Result<(), Box<dyn std::error::Error>> {
    let (session, _journal) = session_with(StatementScript::update(1));
    let mut stmt = session.prepare(INSERT)?;
    stmt.set(1, 1)?;
    stmt.set(2, "x")?;
    stmt.add_batch()?;
    stmt.clear_batch();
    assert_eq!(stmt.batch_len(), 0);
    assert!(stmt.slot_state(2)?.is_ready());
    Ok(())
}

#[test]
fn test4_rejected_request_is_empty_partial_failure() -> Result<(), Box<dyn std::error::Error>> {
    let error = EngineError {
        code: 55,
        sql_state: Some("40001".into()),
        message: "rejected".into(),
    };
    let (session, _journal) =
        session_with(StatementScript::update(1).rejecting_batches(error.clone()));
    let mut stmt = session.prepare(INSERT)?;
    stmt.set(1, 1)?;
    stmt.set(2, "x")?;
    stmt.add_batch()?;
    match stmt.execute_batch() {
        Err(SqlDriverError::BatchPartialFailure { outcomes, cause }) => {
            assert!(outcomes.is_empty());
            assert_eq!(cause, Some(error));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(stmt.batch_len(), 0);
    Ok(())
}

#[test]
fn test4_batch_limit_from_options() -> Result<(), Box<dyn std::error::Error>> {
    let options = SessionOptions::builder().max_batch_entries(2).finish()?;
    let (session, _journal) = session_with_options(StatementScript::update(1), options);
    let mut stmt = session.prepare(INSERT)?;
    stmt.set(1, 1)?;
    stmt.set(2, "x")?;
    stmt.add_batch()?;
    stmt.add_batch()?;
    assert!(matches!(
        stmt.add_batch(),
        Err(SqlDriverError::UnsupportedOperation(_))
    ));
    assert_eq!(stmt.execute_batch()?.len(), 2);
    Ok(())
}

#[test]
fn test4_queries_do_not_batch() -> Result<(), Box<dyn std::error::Error>> {
    use sql_driver_core::statement::ColumnDescriptor;

    let engine = ScriptedEngine::new().with_statement(
        "select a from t",
        StatementScript::query(vec![ColumnDescriptor::new("a", SqlType::Integer)], Vec::new()),
    );
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("select a from t")?;
    assert!(!stmt.capabilities().supports_batch);
    assert!(matches!(
        stmt.add_batch(),
        Err(SqlDriverError::UnsupportedOperation(_))
    ));
    Ok(())
}
