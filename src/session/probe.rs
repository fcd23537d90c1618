use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::{Request, Response};

use super::SessionShared;

/// Send PING from a helper thread and wait at most `timeout` for the answer.
///
/// The helper is not cancelled when the wait expires; it finishes its exchange on its own and
/// its answer is discarded.
pub(super) fn probe(shared: &Arc<SessionShared>, timeout: Duration) -> bool {
    let done = Arc::new(AtomicBool::new(false));
    let alive = Arc::new(AtomicBool::new(false));
    let caller = thread::current();

    let spawned = {
        let shared = Arc::clone(shared);
        let done = Arc::clone(&done);
        let alive = Arc::clone(&alive);
        thread::Builder::new()
            .name("session-probe".into())
            .spawn(move || {
                let answered = matches!(shared.roundtrip(Request::Ping), Ok(Response::Ack));
                alive.store(answered, Ordering::Release);
                done.store(true, Ordering::Release);
                caller.unpark();
            })
    };
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "failed to spawn session probe thread");
        return false;
    }

    // A timeout past the end of the clock waits for the answer without a deadline.
    let deadline = Instant::now().checked_add(timeout);
    while !done.load(Ordering::Acquire) {
        let Some(deadline) = deadline else {
            thread::park();
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(timeout_ms = timeout.as_millis(), "session probe timed out");
            return false;
        }
        thread::park_timeout(deadline - now);
    }
    alive.load(Ordering::Acquire)
}
