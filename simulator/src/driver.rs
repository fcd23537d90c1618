use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sql_driver_core::engine::{BatchOutcome, EngineValue};
use sql_driver_core::lob::{Blob, MemoryLobStore};
use sql_driver_core::prelude::*;
use sql_driver_core::statement::ColumnDescriptor;
use sql_driver_core::test_utils::{RequestJournal, ScriptedEngine, StatementScript};

use crate::args::SimConfig;
use crate::logging::EventLog;
use crate::model::{LobModel, Op, SessionModel, StatementKind, StatementModel};
use crate::oracle::Oracle;
use crate::scheduler::Scheduler;

const INSERT: &str = "insert into notes (id, body) values (?, ?)";
const TOTAL: &str = "{call note_total({fn ucase(?)}, ?)}";

/// One session plus the handles the workload keeps on it.
pub(crate) struct SimSession {
    pub(crate) id: usize,
    pub(crate) session: Session,
    pub(crate) journal: RequestJournal,
    pub(crate) store: Arc<MemoryLobStore>,
    pub(crate) statement: Option<PreparedStatement>,
    pub(crate) blob: Option<Blob>,
    pub(crate) model: SessionModel,
}

impl SimSession {
    fn open(id: usize, config: &SimConfig) -> Result<Self, String> {
        let total_native = translate_escapes(TOTAL)
            .map_err(|err| format!("escape translation failed during setup: {err}"))?
            .into_owned();
        let mut insert = StatementScript::update(1);
        if let Some(index) = config.fail_batch_at {
            insert = insert.failing_batch_at(index);
        }
        let engine = ScriptedEngine::new()
            .with_statement(
                INSERT,
                insert.with_parameters(vec![SqlType::BigInt, SqlType::VarChar]),
            )
            .with_statement(
                total_native,
                StatementScript::query(
                    vec![ColumnDescriptor::new("total", SqlType::BigInt)],
                    vec![vec![EngineValue::BigInt(id as i64)]],
                )
                .with_parameters(vec![SqlType::VarChar, SqlType::BigInt]),
            );
        let journal = engine.journal();
        let store = engine.lob_store();
        let options = SessionOptions::builder()
            .max_batch_entries(config.max_batch)
            .probe_timeout_ms(50)
            .finish()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            id,
            session: Session::open(engine, options),
            journal,
            store,
            statement: None,
            blob: None,
            model: SessionModel::default(),
        })
    }
}

pub(crate) fn run(config: SimConfig, rng: &mut ChaCha8Rng) {
    let mut sessions = match (0..config.sessions)
        .map(|id| SimSession::open(id, &config))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(sessions) => sessions,
        Err(reason) => {
            tracing::error!("setup failed: {}", reason);
            std::process::exit(1);
        }
    };
    let mut scheduler = Scheduler::new(config.sessions);
    let mut events = EventLog::new(config.first_steps, config.tail_steps);

    let max_steps = config.iterations.unwrap_or(u64::MAX);
    let max_time = config.duration_ms.unwrap_or(u64::MAX);

    let mut step: u64 = 0;
    while step < max_steps && scheduler.clock.now_ms <= max_time {
        let Some(id) = scheduler.next(rng) else {
            break;
        };
        let sim = &mut sessions[id];
        let op = next_op(sim, &config, rng);
        let op_display = format_op(&op);

        match apply(sim, &op, &config) {
            Ok(label) => {
                if let Op::Sleep(ms) = op {
                    scheduler.sleep(id, ms);
                } else {
                    scheduler.requeue(id);
                }
                events.record(format!(
                    "step={} time={}ms session={} op={} result={}",
                    step, scheduler.clock.now_ms, id, op_display, label
                ));
            }
            Err(reason) => {
                events.dump_failure(&format!("step={step} op={op_display}: {reason}"));
                std::process::exit(1);
            }
        }

        if let Err(reason) = Oracle::check(sim) {
            events.dump_failure(&reason);
            std::process::exit(1);
        }
        scheduler.tick();
        step += 1;
    }

    let rows: u64 = sessions.iter().map(|s| s.model.rows_written).sum();
    for sim in &sessions {
        if let Err(err) = sim.session.close() {
            tracing::warn!(session = sim.id, "close failed: {}", err);
        }
    }
    tracing::info!(
        "complete: steps={} time={}ms sessions={} rows_written={}",
        step,
        scheduler.clock.now_ms,
        config.sessions,
        rows
    );
}

fn next_op(sim: &SimSession, config: &SimConfig, rng: &mut ChaCha8Rng) -> Op {
    if rng.random::<f64>() < config.sleep_rate {
        return Op::Sleep(rng.random_range(1..=20));
    }
    if rng.random::<f64>() < config.lob_rate {
        return next_lob_op(sim, rng);
    }

    let Some(statement) = &sim.model.statement else {
        let kind = if rng.random::<f64>() < config.escape_rate {
            StatementKind::EscapedCall
        } else {
            StatementKind::Insert
        };
        return Op::Prepare(kind);
    };

    if statement.batches() && statement.batch_len >= config.max_batch {
        return Op::ExecuteBatch;
    }
    let weights = [
        (0, 0.30),
        (1, 0.25),
        (2, if statement.batches() { config.batch_rate } else { 0.0 }),
        (3, if statement.batches() { 0.10 } else { 0.0 }),
        (4, 0.05),
        (5, 0.02),
    ];
    match choose_weighted(&weights, rng) {
        0 => Op::Bind {
            id: rng.random_range(1..10_000),
            note: format!("note {}", rng.random_range(0..100)),
        },
        1 => Op::Execute,
        2 => Op::AddBatch,
        3 => Op::ExecuteBatch,
        4 => Op::CloseStatement,
        _ => Op::Probe,
    }
}

fn next_lob_op(sim: &SimSession, rng: &mut ChaCha8Rng) -> Op {
    let Some(lob) = &sim.model.lob else {
        let len = rng.random_range(0..16);
        return Op::LobCreate((0..len).map(|_| rng.random()).collect());
    };
    let len = lob.current.len();
    match rng.random_range(0..10) {
        0..=4 => {
            let data_len = rng.random_range(1..=4);
            Op::LobWrite {
                position: rng.random_range(0..=len),
                data: (0..data_len).map(|_| rng.random()).collect(),
            }
        }
        5 => Op::LobTruncate(rng.random_range(0..=len)),
        6 => Op::LobClear,
        7 | 8 => Op::LobCommit,
        _ => Op::LobFree,
    }
}

fn choose_weighted(items: &[(u8, f64)], rng: &mut ChaCha8Rng) -> u8 {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    let mut target = rng.random::<f64>() * total;
    for (choice, weight) in items {
        let w = weight.max(0.0);
        if target <= w && w > 0.0 {
            return *choice;
        }
        target -= w;
    }
    items.first().map_or(0, |(choice, _)| *choice)
}

/// Perform `op` and update the model with what the driver must have done. Returns a short
/// label for the event log, or the reason the run is broken.
fn apply(sim: &mut SimSession, op: &Op, config: &SimConfig) -> Result<String, String> {
    match op {
        Op::Prepare(kind) => {
            let sql = match kind {
                StatementKind::Insert => INSERT,
                StatementKind::EscapedCall => TOTAL,
            };
            let stmt = sim.session.prepare(sql).map_err(|err| err.to_string())?;
            sim.statement = Some(stmt);
            sim.model.statement = Some(StatementModel::new(*kind));
            Ok("Ok".into())
        }
        Op::Bind { id, note } => {
            let (stmt, model) = statement_pair(sim)?;
            match model.kind {
                StatementKind::Insert => {
                    stmt.set(1, *id).map_err(|err| err.to_string())?;
                    stmt.set(2, note.as_str()).map_err(|err| err.to_string())?;
                }
                StatementKind::EscapedCall => {
                    stmt.set(1, note.as_str()).map_err(|err| err.to_string())?;
                    stmt.set(2, *id).map_err(|err| err.to_string())?;
                }
            }
            model.bound = true;
            Ok("Ok".into())
        }
        Op::Execute => {
            let (stmt, model) = statement_pair(sim)?;
            let bound = model.bound;
            let kind = model.kind;
            match (stmt.execute(), bound) {
                (Ok(result), true) => {
                    sim.model.executes += 1;
                    match (kind, result.update_count()) {
                        (StatementKind::Insert, Some(1)) => {
                            sim.model.rows_written += 1;
                            Ok("Count(1)".into())
                        }
                        (StatementKind::EscapedCall, None) => {
                            let rows = result.rows().map_or(0, |rows| rows.len());
                            Ok(format!("Rows({rows})"))
                        }
                        (_, count) => Err(format!("unexpected execution result {count:?}")),
                    }
                }
                (Err(SqlDriverError::ParameterNotSet { index }), false) => {
                    Ok(format!("ParameterNotSet({index})"))
                }
                (Ok(_), false) => Err("execution succeeded with unbound parameters".into()),
                (Err(err), _) => Err(format!("execution failed: {err}")),
            }
        }
        Op::AddBatch => {
            let (stmt, model) = statement_pair(sim)?;
            match (stmt.add_batch(), model.bound) {
                (Ok(()), true) => {
                    model.batch_len += 1;
                    Ok(format!("len={}", model.batch_len))
                }
                (Err(SqlDriverError::ParameterNotSet { index }), false) => {
                    Ok(format!("ParameterNotSet({index})"))
                }
                (outcome, _) => Err(format!("add_batch returned {outcome:?}")),
            }
        }
        Op::ExecuteBatch => {
            let (stmt, model) = statement_pair(sim)?;
            let submitted = std::mem::take(&mut model.batch_len);
            let outcome = stmt.execute_batch();
            if submitted > 0 {
                sim.model.batches += 1;
            }
            let executed = config
                .fail_batch_at
                .map_or(submitted, |index| index.min(submitted));
            sim.model.rows_written += executed as u64;
            match outcome {
                Ok(outcomes) if executed == submitted => {
                    if outcomes != vec![BatchOutcome::Count(1); submitted] {
                        return Err(format!("batch of {submitted} returned {outcomes:?}"));
                    }
                    Ok(format!("Ok({submitted})"))
                }
                Err(SqlDriverError::BatchPartialFailure { outcomes, cause })
                    if executed < submitted =>
                {
                    if outcomes.len() != executed || cause.is_none() {
                        return Err(format!(
                            "partial failure reported {} outcomes (cause {cause:?}), expected {executed}",
                            outcomes.len()
                        ));
                    }
                    Ok(format!("Partial({executed}/{submitted})"))
                }
                other => Err(format!("batch of {submitted} returned {other:?}")),
            }
        }
        Op::CloseStatement => {
            let mut stmt = sim.statement.take().ok_or("no statement to close")?;
            sim.model.statement = None;
            stmt.close().map_err(|err| err.to_string())?;
            stmt.close().map_err(|err| format!("second close failed: {err}"))?;
            sim.model.frees += 1;
            Ok("Ok".into())
        }
        Op::LobCreate(bytes) => {
            let blob = sim.session.create_blob(bytes).map_err(|err| err.to_string())?;
            sim.blob = Some(blob);
            sim.model.lob = Some(LobModel::new(bytes.clone()));
            Ok(format!("len={}", bytes.len()))
        }
        Op::LobWrite { position, data } => {
            let (blob, model) = lob_pair(sim)?;
            blob.set_bytes(*position as i64, data)
                .map_err(|err| err.to_string())?;
            if model.write(*position, data) {
                sim.model.duplicates += 1;
            }
            Ok("Ok".into())
        }
        Op::LobTruncate(length) => {
            let (blob, model) = lob_pair(sim)?;
            blob.truncate(*length as i64).map_err(|err| err.to_string())?;
            let duplicated = model.truncate(*length);
            // Truncating past the end is refused without touching the object.
            let past_end = model.current.len() as i64 + 1;
            if !matches!(blob.truncate(past_end), Err(SqlDriverError::LobBounds { .. })) {
                return Err(format!("truncate to {past_end} past the end was accepted"));
            }
            if duplicated {
                sim.model.duplicates += 1;
            }
            Ok("Ok".into())
        }
        Op::LobClear => {
            let (blob, model) = lob_pair(sim)?;
            blob.clear_updates().map_err(|err| err.to_string())?;
            model.clear();
            Ok("Ok".into())
        }
        Op::LobCommit => {
            let (blob, model) = lob_pair(sim)?;
            blob.commit_updates().map_err(|err| err.to_string())?;
            model.commit();
            Ok("Ok".into())
        }
        Op::LobFree => {
            let mut blob = sim.blob.take().ok_or("no large object to free")?;
            sim.model.lob = None;
            blob.free().map_err(|err| err.to_string())?;
            blob.free().map_err(|err| format!("second free failed: {err}"))?;
            match blob.read_all() {
                Err(SqlDriverError::LobClosed) => {}
                other => return Err(format!("read after free returned {other:?}")),
            }
            if sim.store.live_objects() != 0 {
                return Err(format!(
                    "{} engine objects still allocated after free",
                    sim.store.live_objects()
                ));
            }
            Ok("Ok".into())
        }
        Op::Probe => {
            if sim.session.is_valid(Duration::from_millis(50)) {
                Ok("alive".into())
            } else {
                Err("probe of an open session failed".into())
            }
        }
        Op::Sleep(_) => Ok("Ok".into()),
    }
}

fn statement_pair(
    sim: &mut SimSession,
) -> Result<(&mut PreparedStatement, &mut StatementModel), String> {
    match (sim.statement.as_mut(), sim.model.statement.as_mut()) {
        (Some(stmt), Some(model)) => Ok((stmt, model)),
        _ => Err("operation needs a prepared statement".into()),
    }
}

fn lob_pair(sim: &mut SimSession) -> Result<(&mut Blob, &mut LobModel), String> {
    match (sim.blob.as_mut(), sim.model.lob.as_mut()) {
        (Some(blob), Some(model)) => Ok((blob, model)),
        _ => Err("operation needs a large object".into()),
    }
}

fn format_op(op: &Op) -> String {
    match op {
        Op::Sleep(ms) => format!("Sleep({ms}ms)"),
        Op::LobCreate(bytes) => format!("LobCreate({} bytes)", bytes.len()),
        other => format!("{other:?}"),
    }
}
