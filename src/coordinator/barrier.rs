use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::TestSuite;
use crate::protocol::TestPhase;

#[derive(Debug)]
struct Countdown {
    remaining: watch::Sender<usize>,
    decremented: Mutex<HashSet<i32>>,
}

impl Countdown {
    fn new(count: usize) -> Self {
        let (remaining, _initial) = watch::channel(count);
        Self {
            remaining,
            decremented: Mutex::new(HashSet::new()),
        }
    }
}

/// Countdown per phase shared by every runner of one suite run.
///
/// A counter starts at the number of tests taking part in the phase. Each
/// test decrements it at most once; waiters are released at zero.
#[derive(Debug)]
pub struct PhaseBarrier {
    counters: HashMap<TestPhase, Countdown>,
    announced: Mutex<HashSet<TestPhase>>,
}

impl PhaseBarrier {
    /// Barrier for every phase `suite` executes. Phases after
    /// [`TestSuite::sync_to_phase`] start at zero and never block.
    #[must_use]
    pub fn for_suite(suite: &TestSuite) -> Self {
        let test_count = suite.test_count();
        Self::with_counts(suite.phases().into_iter().map(|phase| {
            let count = if suite.is_synced(phase) { test_count } else { 0 };
            (phase, count)
        }))
    }

    #[must_use]
    pub fn with_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (TestPhase, usize)>,
    {
        Self {
            counters: counts
                .into_iter()
                .map(|(phase, count)| (phase, Countdown::new(count)))
                .collect(),
            announced: Mutex::new(HashSet::new()),
        }
    }

    /// Decrements the counter of `phase` on behalf of `test_index`. Returns
    /// `false` when that test already counted down for the phase, the phase
    /// has no counter, or the counter is already zero.
    pub fn count_down(&self, phase: TestPhase, test_index: i32) -> bool {
        let Some(countdown) = self.counters.get(&phase) else {
            return false;
        };
        let first = countdown
            .decremented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(test_index);
        if !first {
            return false;
        }
        countdown.remaining.send_if_modified(|remaining| {
            if *remaining == 0 {
                return false;
            }
            *remaining = remaining.saturating_sub(1);
            true
        })
    }

    /// Remaining count for `phase`; `0` for a phase without a counter.
    #[must_use]
    pub fn remaining(&self, phase: TestPhase) -> usize {
        self.counters
            .get(&phase)
            .map_or(0, |countdown| *countdown.remaining.borrow())
    }

    /// Waits until the counter of `phase` reaches zero, checking `abort`
    /// at least once per `poll_interval`. Returns `true` when released and
    /// `false` when `abort` fired first.
    pub async fn wait<F>(&self, phase: TestPhase, poll_interval: Duration, abort: F) -> bool
    where
        F: Fn() -> bool,
    {
        let Some(countdown) = self.counters.get(&phase) else {
            return true;
        };
        let mut receiver = countdown.remaining.subscribe();
        loop {
            if *receiver.borrow_and_update() == 0 {
                return true;
            }
            if abort() {
                return false;
            }
            if let Ok(Err(_closed)) = tokio::time::timeout(poll_interval, receiver.changed()).await
            {
                return *receiver.borrow() == 0;
            }
        }
    }

    /// First caller for a phase gets `true`; later callers get `false`.
    pub fn announce_completion(&self, phase: TestPhase) -> bool {
        self.announced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(phase)
    }
}
