use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use crate::protocol::{SimulatorAddress, TestPhase};

use super::super::processor::PhaseCompletion;
use super::{RunnerContext, RunnerError};

/// Workers that reported completion, one fresh set per phase.
pub(super) struct CompletionTracker {
    receiver: mpsc::UnboundedReceiver<PhaseCompletion>,
    completed: HashMap<TestPhase, HashSet<SimulatorAddress>>,
}

impl CompletionTracker {
    pub(super) fn new(receiver: mpsc::UnboundedReceiver<PhaseCompletion>) -> Self {
        Self {
            receiver,
            completed: HashMap::new(),
        }
    }

    fn record(&mut self, completion: PhaseCompletion) {
        self.completed
            .entry(completion.phase)
            .or_default()
            .insert(completion.worker);
    }

    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => self.record(completion),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return,
            }
        }
    }

    fn completed_count(&self, phase: TestPhase) -> usize {
        self.completed.get(&phase).map_or(0, HashSet::len)
    }

    /// Waits until every expected worker reported `phase`. The expected
    /// count is re-read on every poll so workers leaving the registry stop
    /// being waited for.
    ///
    /// # Errors
    ///
    /// Returns an abort as soon as a critical failure is visible, at the
    /// latest one poll interval after it was reported.
    pub(super) async fn wait_for(
        &mut self,
        ctx: &RunnerContext,
        phase: TestPhase,
    ) -> Result<(), RunnerError> {
        let settings = ctx.settings();
        let started = Instant::now();
        let mut next_log = settings.phase_log_interval;
        loop {
            self.drain();
            let completed = self.completed_count(phase);
            let expected = ctx.expected_worker_count(phase);
            if completed >= expected {
                return Ok(());
            }
            if ctx.has_failure() {
                return Err(RunnerError::aborted(
                    phase,
                    format!("Waiting for {} completion aborted (critical failure)", phase.desc()),
                ));
            }

            match tokio::time::timeout(settings.poll_interval, self.receiver.recv()).await {
                Ok(Some(completion)) => self.record(completion),
                Ok(None) => tokio::time::sleep(settings.poll_interval).await,
                Err(_elapsed) => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= next_log {
                next_log = next_log.saturating_add(settings.phase_log_interval);
                let reported = self.completed.get(&phase);
                ctx.log_waiting(phase, reported, self.completed_count(phase), expected, elapsed);
            }
        }
    }
}
