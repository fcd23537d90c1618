use sql_driver_core::engine::{EngineValue, Request};
use sql_driver_core::lob::LobPayload;
use sql_driver_core::prelude::*;
use sql_driver_core::statement::ColumnDescriptor;
use sql_driver_core::test_utils::{ScriptedEngine, StatementScript};

#[test]
fn test6_row_update_sends_dirty_lobs() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new();
    let store = engine.lob_store();
    let photo = {
        use sql_driver_core::lob::LobBackend;
        store.create_lob(LobPayload::Binary(vec![0; 8]))?
    };
    let engine = engine.with_statement(
        "select name, photo, note from people",
        StatementScript::query(
            vec![
                ColumnDescriptor::new("name", SqlType::VarChar),
                ColumnDescriptor::new("photo", SqlType::Blob),
                ColumnDescriptor::new("note", SqlType::VarChar),
            ],
            vec![vec![
                EngineValue::Text("ann".into()),
                EngineValue::Lob(photo),
                EngineValue::Text("hi".into()),
            ]],
        ),
    );
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());

    let rows = session.prepare("select name, photo, note from people")?.execute_query()?;
    let lob = rows.results[0]
        .get("photo")
        .and_then(SqlValue::as_lob)
        .ok_or("photo column")?;

    let mut updater = session.row_updater(&rows, 0)?;
    assert_eq!(updater.parameter_count(), 3);
    let mut blob = session.open_blob(lob)?.with_owner(updater.lob_owner(2)?);
    let private = blob.set_bytes(0, &[7, 7])?;
    assert_ne!(private.id, lob.id);
    updater.set(1, "anna")?;
    assert_eq!(updater.execute()?.update_count(), Some(1));

    let Some(Request::UpdateResultRow { row, columns, .. }) = journal.requests().pop() else {
        panic!("expected UPDATE_RESULT_ROW");
    };
    assert_eq!(row, 0);
    assert_eq!(
        columns,
        vec![
            Some(EngineValue::Text("anna".into())),
            Some(EngineValue::Lob(private)),
            None,
        ]
    );
    // The shared value read by the query was not modified.
    assert_eq!(store.contents(lob.id), Some(LobPayload::Binary(vec![0; 8])));
    Ok(())
}

#[test]
fn test6_cleared_updates_leave_column_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new().with_statement(
        "select doc from d",
        StatementScript::query(
            vec![ColumnDescriptor::new("doc", SqlType::Clob)],
            vec![vec![EngineValue::Null]],
        ),
    );
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());
    let rows = session.prepare("select doc from d")?.execute_query()?;
    let mut updater = session.row_updater(&rows, 0)?;

    let mut clob = session.create_clob("draft")?.with_owner(updater.lob_owner(1)?);
    let original = clob.handle();
    clob.set_string(0, "final")?;
    assert_eq!(clob.clear_updates()?.id, original.id);
    updater.execute()?;

    let Some(Request::UpdateResultRow { columns, .. }) = journal.requests().pop() else {
        panic!("expected UPDATE_RESULT_ROW");
    };
    assert_eq!(columns, vec![None]);
    Ok(())
}

#[test]
fn test6_row_updater_guards() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScriptedEngine::new().with_statement(
        "select a from t",
        StatementScript::query(
            vec![ColumnDescriptor::new("a", SqlType::Integer)],
            vec![vec![EngineValue::Integer(1)]],
        ),
    );
    let session = Session::open(engine, SessionOptions::default());
    let mut stmt = session.prepare("select a from t")?;
    let rows = stmt.execute_query()?;
    assert!(matches!(
        session.row_updater(&rows, 1),
        Err(SqlDriverError::UnsupportedOperation(_))
    ));
    let updater = session.row_updater(&rows, 0)?;
    assert!(matches!(updater.lob_owner(1), Err(SqlDriverError::UnsupportedOperation(_))));
    assert!(matches!(stmt.lob_owner(1), Err(SqlDriverError::UnsupportedOperation(_))));
    assert!(updater.id().is_none());
    assert!(!updater.capabilities().supports_batch);
    Ok(())
}
