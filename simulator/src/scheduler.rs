use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Simulated time; nothing in the run reads the wall clock.
pub(crate) struct FakeClock {
    pub(crate) now_ms: u64,
}

/// Picks which session acts next. Sleeping sessions wait on a timer wheel keyed by wake time.
pub(crate) struct Scheduler {
    runnable: Vec<usize>,
    sleepers: BTreeMap<u64, Vec<usize>>,
    pub(crate) clock: FakeClock,
}

impl Scheduler {
    pub(crate) fn new(session_count: usize) -> Self {
        Self {
            runnable: (0..session_count).collect(),
            sleepers: BTreeMap::new(),
            clock: FakeClock { now_ms: 0 },
        }
    }

    pub(crate) fn sleep(&mut self, session: usize, duration_ms: u64) {
        let wake_at = self.clock.now_ms.saturating_add(duration_ms.max(1));
        self.sleepers.entry(wake_at).or_default().push(session);
    }

    pub(crate) fn tick(&mut self) {
        self.clock.now_ms = self.clock.now_ms.saturating_add(1);
        self.wake_due();
    }

    /// Remove and return a random runnable session, jumping the clock forward when every
    /// session is asleep.
    pub(crate) fn next(&mut self, rng: &mut ChaCha8Rng) -> Option<usize> {
        if self.runnable.is_empty() {
            let (&wake_at, _) = self.sleepers.first_key_value()?;
            self.clock.now_ms = wake_at;
            self.wake_due();
        }
        let idx = rng.random_range(0..self.runnable.len());
        Some(self.runnable.swap_remove(idx))
    }

    pub(crate) fn requeue(&mut self, session: usize) {
        self.runnable.push(session);
    }

    fn wake_due(&mut self) {
        let later = self.sleepers.split_off(&(self.clock.now_ms + 1));
        for (_, mut sessions) in std::mem::replace(&mut self.sleepers, later) {
            self.runnable.append(&mut sessions);
        }
    }
}
