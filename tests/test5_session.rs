use std::time::Duration;

use sql_driver_core::engine::{EngineError, EngineValue, Request, SecondaryResult};
use sql_driver_core::prelude::*;
use sql_driver_core::statement::ColumnDescriptor;
use sql_driver_core::test_utils::{ScriptedEngine, StatementScript};

#[test]
fn test5_escape_processing_modes() -> Result<(), Box<dyn std::error::Error>> {
    let script = StatementScript::update(0).with_parameters(vec![SqlType::Integer]);
    let engine = ScriptedEngine::new()
        .with_statement(" CALL p(?) ", script.clone())
        .with_statement("{call p(?)}", script);
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());

    let translated = session.prepare("{call p(?)}")?;
    assert_eq!(translated.sql(), " CALL p(?) ");

    let raw = session.prepare_with(
        "{call p(?)}",
        PrepareOptions::default().with_escape(EscapeMode::ForceOff),
    )?;
    assert_eq!(raw.sql(), "{call p(?)}");
    assert_eq!(journal.count("PREPARE"), 2);
    assert_eq!(session.native_sql("{fn now()}")?, "  now() ");
    Ok(())
}

#[test]
fn test5_escape_processing_off_by_default_option() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new()
        .with_statement("{d '2020-01-02'}", StatementScript::update(0))
        .with_statement(" DATE '2020-01-02' ", StatementScript::update(0));
    let options = SessionOptions::from_json(r#"{"escape_processing": false}"#)?;
    let session = Session::open(engine, options);
    assert_eq!(session.prepare("{d '2020-01-02'}")?.sql(), "{d '2020-01-02'}");
    let forced = session.prepare_with(
        "{d '2020-01-02'}",
        PrepareOptions::default().with_escape(EscapeMode::ForceOn),
    )?;
    assert_eq!(forced.sql(), " DATE '2020-01-02' ");
    Ok(())
}

#[test]
fn test5_bad_escape_is_local() {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());
    let err = session.prepare("select {nope} from t").unwrap_err();
    assert!(matches!(err, SqlDriverError::EscapeSyntax(EscapeSyntaxError { position: 7, .. })));
    assert!(journal.is_empty());
}

#[test]
fn test5_engine_errors_are_wrapped() {
    let engine = ScriptedEngine::new();
    let session = Session::open(engine, SessionOptions::default());
    let err = session.prepare("select 1").unwrap_err();
    assert!(matches!(err, SqlDriverError::Engine(EngineError { code: 42, .. })));
}

#[test]
fn test5_close_skips_statement_release() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new().with_statement("delete from t", StatementScript::update(3));
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("delete from t")?;
    session.close()?;
    session.close()?;
    assert!(session.is_closed());
    assert!(matches!(stmt.execute(), Err(SqlDriverError::ConnectionClosed)));
    stmt.close()?;
    assert_eq!(journal.kinds(), vec!["PREPARE", "CLOSE_SESSION"]);
    assert!(matches!(session.prepare("delete from t"), Err(SqlDriverError::ConnectionClosed)));
    Ok(())
}

#[test]
fn test5_probe() {
    let session = Session::open(ScriptedEngine::new(), SessionOptions::default());
    assert!(session.is_valid(Duration::from_secs(5)));
    assert!(session.is_alive());

    let slow = Session::open(
        ScriptedEngine::new().with_ping_delay(Duration::from_millis(500)),
        SessionOptions::builder().probe_timeout_ms(20).finish().unwrap(),
    );
    assert!(!slow.is_alive());

    let closed = Session::open(ScriptedEngine::new(), SessionOptions::default());
    closed.close().unwrap();
    assert!(!closed.is_valid(Duration::from_secs(1)));
}

#[test]
fn test5_probe_without_deadline() {
    let session = Session::open(
        ScriptedEngine::new().with_ping_delay(Duration::from_millis(10)),
        SessionOptions::default(),
    );
    assert!(session.is_valid(Duration::MAX));
    assert!(session.is_valid(Duration::from_secs(u64::MAX)));
}

#[test]
fn test5_secondary_results_are_chained() -> Result<(), Box<dyn std::error::Error>> {
    let secondary = vec![
        SecondaryResult::Warning(SqlWarning {
            code: 1,
            sql_state: Some("01004".into()),
            message: "data truncated".into(),
        }),
        SecondaryResult::GeneratedKeys {
            columns: vec![ColumnDescriptor::new("id", SqlType::BigInt)],
            rows: vec![vec![EngineValue::BigInt(100)]],
        },
    ];
    let engine = ScriptedEngine::new().with_statement(
        "insert into t values (?)",
        StatementScript::update(1)
            .with_parameters(vec![SqlType::VarChar])
            .with_secondary(secondary),
    );
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("insert into t values (?)")?;
    stmt.set(1, "x")?;
    stmt.execute()?;
    assert_eq!(stmt.warnings().len(), 1);
    assert_eq!(stmt.warnings()[0].message, "data truncated");
    let keys = stmt.generated_keys().ok_or("missing generated keys")?;
    assert_eq!(keys.results[0].get("ID"), Some(&SqlValue::BigInt(100)));

    stmt.execute()?;
    assert_eq!(stmt.warnings().len(), 1, "chain is cleared per execution");
    stmt.clear_warnings();
    assert!(stmt.warnings().is_empty());
    Ok(())
}

#[test]
fn test5_query_decodes_rows() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new().with_statement(
        "select id, name from people where id > ?",
        StatementScript::query(
            vec![
                ColumnDescriptor::new("id", SqlType::BigInt),
                ColumnDescriptor::new("name", SqlType::VarChar),
            ],
            vec![
                vec![EngineValue::BigInt(1), EngineValue::Text("ann".into())],
                vec![EngineValue::BigInt(2), EngineValue::Null],
            ],
        )
        .with_parameters(vec![SqlType::BigInt]),
    );
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("select id, name from people where id > ?")?;
    stmt.set(1, 0_i64)?;
    assert!(matches!(stmt.execute_update(), Err(SqlDriverError::UnsupportedOperation(_))));
    let rows = stmt.execute_query()?;
    assert_eq!(stmt.state(), StatementState::RowResult);
    assert_eq!(rows.len(), 2);
    assert!(rows.cursor().is_some());
    assert_eq!(rows.results[0].get("name").and_then(SqlValue::as_text), Some("ann"));
    assert!(rows.results[1].get("name").is_some_and(SqlValue::is_null));
    Ok(())
}

#[test]
fn test5_failed_execution_is_reusable() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new().with_statement(
        "update t set a = 1",
        StatementScript::failing(EngineError {
            code: 1205,
            sql_state: Some("40001".into()),
            message: "deadlock".into(),
        }),
    );
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("update t set a = 1")?;
    assert!(matches!(stmt.execute(), Err(SqlDriverError::Engine(EngineError { code: 1205, .. }))));
    assert_eq!(stmt.state(), StatementState::Errored);
    assert!(stmt.execute().is_err());
    assert_eq!(journal.count("EXECUTE"), 2);
    drop(stmt);
    assert!(matches!(
        journal.requests().last(),
        Some(Request::FreeStatement { .. })
    ));
    Ok(())
}
