//! Statement-execution core for SQL client drivers.
//!
//! The crate sits between an application-facing statement API and an opaque database engine
//! reached through the synchronous [`Engine`](engine::Engine) trait. It covers:
//!
//! - [`translation`]: vendor-neutral `{...}` escapes rewritten to native SQL;
//! - [`coercion`]: application values converted to the declared parameter types;
//! - [`statement`] and [`batch`]: prepared and batched execution with explicit slot states;
//! - [`lob`]: binary and character large objects with duplicate-on-write updates;
//! - [`session`]: the engine handle that ties them together.
//!
//! ```rust
//! use sql_driver_core::prelude::*;
//! use sql_driver_core::test_utils::{ScriptedEngine, StatementScript};
//!
//! let engine = ScriptedEngine::new().with_statement(
//!     " CALL bump(?) ",
//!     StatementScript::update(1).with_parameters(vec![SqlType::BigInt]),
//! );
//! let session = Session::open(engine, SessionOptions::default());
//! let mut stmt = session.prepare("{call bump(?)}")?;
//! stmt.set(1, 7_i64)?;
//! assert_eq!(stmt.execute_update()?, 1);
//! # Ok::<(), SqlDriverError>(())
//! ```

pub mod batch;
pub mod coercion;
pub mod engine;
pub mod error;
pub mod lob;
pub mod prelude;
pub mod results;
pub mod session;
pub mod statement;
pub mod translation;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{EscapeSyntaxError, SqlDriverError};
pub use session::{Session, SessionOptions};
