//! Boundary to the database engine.
//!
//! The driver talks to the engine only through [`Engine::exchange`]: one request in, one
//! response out, on the calling thread. Framing and transport live behind the trait.

use std::io;

use thiserror::Error;

mod wire;

pub use wire::{
    BatchOutcome, CursorId, EngineError, EngineValue, Request, Response, SecondaryResult,
    SqlWarning, StatementId,
};

/// Failure to deliver a request or receive its response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// A synchronous request/response channel to the engine session.
pub trait Engine: Send {
    /// Send one request and block until the engine answers.
    ///
    /// Engine-side failures come back as [`Response::Error`]; `Err` is reserved for the
    /// transport itself.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the request could not be delivered or answered.
    fn exchange(&mut self, request: Request) -> Result<Response, TransportError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn exchange(&mut self, request: Request) -> Result<Response, TransportError> {
        (**self).exchange(request)
    }
}
