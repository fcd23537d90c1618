use std::sync::Arc;

use sql_driver_core::lob::{LobPayload, MemoryLobStore, check_range};
use sql_driver_core::prelude::*;
use sql_driver_core::test_utils::{RequestJournal, ScriptedEngine};

fn session() -> (Session, RequestJournal, Arc<MemoryLobStore>) {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let store = engine.lob_store();
    (Session::open(engine, SessionOptions::default()), journal, store)
}

#[test]
fn test3_duplicate_on_write_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal, store) = session();
    let mut blob = session.create_blob(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9])?;
    let h = blob.handle();
    assert_eq!(h.length, 10);
    assert_eq!(blob.state(), LobState::Shared);

    let h1 = blob.set_bytes(2, &[0xAA, 0xBB])?;
    assert_ne!(h1.id, h.id);
    let h2 = blob.set_bytes(5, &[0xCC])?;
    assert_eq!(h2.id, h1.id);
    assert_eq!(journal.count("LOB_DUPLICATE"), 1);

    // The original is untouched by the private writes.
    assert_eq!(
        store.contents(h.id),
        Some(LobPayload::Binary((0..10).collect()))
    );

    let restored = blob.clear_updates()?;
    assert_eq!(restored.id, h.id);
    assert_eq!(blob.state(), LobState::Shared);
    assert_eq!(store.contents(h1.id), None);
    Ok(())
}

#[test]
fn test3_reads_never_duplicate() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal, _store) = session();
    let clob = session.create_clob("grüße aus köln")?;
    assert_eq!(clob.length()?, 14);
    assert_eq!(clob.substring(6, 3)?, "aus");
    assert_eq!(clob.read_all()?, "grüße aus köln");
    assert_eq!(journal.count("LOB_DUPLICATE"), 0);
    assert_eq!(clob.state(), LobState::Shared);
    Ok(())
}

#[test]
fn test3_boundary_law_is_shared_by_both_kinds() -> Result<(), Box<dyn std::error::Error>> {
    assert!(check_range(0, 10, 10).is_ok());
    assert!(matches!(
        check_range(5, 6, 10),
        Err(SqlDriverError::LobBounds { position: 5, length: 6, total: 10 })
    ));
    assert!(check_range(-1, 1, 10).is_err());
    assert!(check_range(i64::MAX, i64::MAX, 10).is_err());

    let (session, _journal, _store) = session();
    let blob = session.create_blob(&[0; 10])?;
    let clob = session.create_clob("0123456789")?;
    for (position, length, ok) in [(0, 10, true), (5, 6, false), (-1, 1, false), (10, 0, true)] {
        assert_eq!(blob.bytes(position, length).is_ok(), ok, "blob ({position}, {length})");
        assert_eq!(clob.substring(position, length).is_ok(), ok, "clob ({position}, {length})");
    }
    Ok(())
}

#[test]
fn test3_write_may_extend_truncate_may_not() -> Result<(), Box<dyn std::error::Error>> {
    let (session, _journal, _store) = session();
    let mut clob = session.create_clob("abc")?;
    let h = clob.set_string(3, "def")?;
    assert_eq!(h.length, 6);
    assert_eq!(clob.read_all()?, "abcdef");
    assert!(matches!(
        clob.set_string(7, "x"),
        Err(SqlDriverError::LobBounds { .. })
    ));
    assert!(clob.truncate(7).is_err());
    let h = clob.truncate(2)?;
    assert_eq!(h.length, 2);
    assert_eq!(clob.read_all()?, "ab");
    Ok(())
}

#[test]
fn test3_free_is_idempotent_and_final() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal, store) = session();
    let mut blob = session.create_blob(&[1, 2, 3])?;
    let h = blob.handle();
    blob.free()?;
    blob.free()?;
    assert_eq!(journal.count("LOB_FREE"), 1);
    assert_eq!(store.contents(h.id), None);
    assert!(matches!(blob.bytes(0, 1), Err(SqlDriverError::LobClosed)));
    assert!(matches!(blob.set_bytes(0, &[9]), Err(SqlDriverError::LobClosed)));
    assert!(matches!(blob.length(), Err(SqlDriverError::LobClosed)));
    Ok(())
}

#[test]
fn test3_commit_starts_a_new_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let (session, journal, _store) = session();
    let mut blob = session.create_blob(&[0; 4])?;
    let first = blob.set_bytes(0, &[1])?;
    let committed = blob.commit_updates()?;
    assert_eq!(committed.id, first.id);
    assert_eq!(blob.state(), LobState::Shared);
    let second = blob.set_bytes(1, &[2])?;
    assert_ne!(second.id, first.id);
    assert_eq!(journal.count("LOB_DUPLICATE"), 2);
    assert_eq!(blob.bytes(0, 2)?, vec![1, 2]);
    Ok(())
}

#[test]
fn test3_client_lobs_are_created_before_execute() -> Result<(), Box<dyn std::error::Error>> {
    use sql_driver_core::engine::{EngineValue, Request};
    use sql_driver_core::test_utils::StatementScript;

    let engine = ScriptedEngine::new().with_statement(
        "insert into docs values (?, ?)",
        StatementScript::update(1).with_parameters(vec![SqlType::Blob, SqlType::Clob]),
    );
    let journal = engine.journal();
    let session = Session::open(engine, SessionOptions::default());
    let existing = session.create_clob("kept")?;
    journal.clear();

    let mut stmt = session.prepare("insert into docs values (?, ?)")?;
    stmt.set(1, vec![1_u8, 2])?;
    stmt.set_lob(2, &existing)?;
    stmt.execute()?;
    assert_eq!(journal.kinds(), vec!["PREPARE", "LOB_CREATE", "EXECUTE"]);
    let Some(Request::Execute { parameters, .. }) = journal.requests().pop() else {
        panic!("last request should be EXECUTE");
    };
    assert!(matches!(
        parameters[0],
        EngineValue::Lob(lob) if lob.kind == LobKind::Binary && lob.length == 2
    ));
    assert_eq!(parameters[1], EngineValue::Lob(existing.handle()));
    Ok(())
}
