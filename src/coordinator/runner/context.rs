use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::TestSuite;
use crate::protocol::{SimulatorAddress, TestPhase};
use crate::registry::{ComponentRegistry, TargetType, TestData};

use super::super::format::{pad_right, seconds_to_human};
use super::super::{
    CoordinatorSettings, FailureCollector, PerformanceStatsCollector, PhaseBarrier, RemoteClient,
};
use super::RunnerError;

/// Everything a runner reads while driving its test. Shared collaborators
/// are the registry, the failure collector and the phase barrier.
pub(crate) struct RunnerContext {
    test: Arc<TestData>,
    remote: RemoteClient,
    registry: Arc<ComponentRegistry>,
    failures: Arc<FailureCollector>,
    performance: Arc<PerformanceStatsCollector>,
    barrier: Option<Arc<PhaseBarrier>>,
    settings: CoordinatorSettings,
    target_type: TargetType,
    prefix: String,
}

impl RunnerContext {
    #[expect(
        clippy::too_many_arguments,
        reason = "Runner context bundles every suite collaborator"
    )]
    pub(crate) fn new(
        test: Arc<TestData>,
        remote: RemoteClient,
        registry: Arc<ComponentRegistry>,
        failures: Arc<FailureCollector>,
        performance: Arc<PerformanceStatsCollector>,
        barrier: Option<Arc<PhaseBarrier>>,
        settings: CoordinatorSettings,
        target_type: TargetType,
    ) -> Self {
        let width = test.test_suite().max_test_case_id_len().saturating_add(1);
        let prefix = pad_right(test.id(), width);
        Self {
            test,
            remote,
            registry,
            failures,
            performance,
            barrier,
            settings,
            target_type,
            prefix,
        }
    }

    pub(crate) const fn test(&self) -> &Arc<TestData> {
        &self.test
    }

    pub(crate) fn suite(&self) -> &Arc<TestSuite> {
        self.test.test_suite()
    }

    pub(crate) const fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    pub(crate) const fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub(crate) const fn performance(&self) -> &Arc<PerformanceStatsCollector> {
        &self.performance
    }

    pub(crate) const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Target type resolved once for the suite run.
    pub(crate) const fn target_type(&self) -> TargetType {
        self.target_type
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Logs a runner line locally and mirrors it on every agent.
    pub(crate) fn echo(&self, message: &str) {
        let line = format!("{}{}", self.prefix, message);
        self.remote.log_on_all_agents(line.clone());
        info!("{}", line);
    }

    pub(crate) fn has_own_critical_failure(&self) -> bool {
        self.failures.has_critical_failure_for(self.test.id())
    }

    /// Critical failure for this test, or anywhere in the suite when the
    /// suite fails fast.
    pub(crate) fn has_failure(&self) -> bool {
        self.has_own_critical_failure()
            || (self.suite().fail_fast && self.failures.has_critical_failure())
    }

    pub(crate) fn check_abort(&self, phase: TestPhase) -> Result<(), RunnerError> {
        if self.has_failure() {
            return Err(RunnerError::aborted(
                phase,
                format!("Skipping Test {} (critical failure)", phase.desc()),
            ));
        }
        Ok(())
    }

    /// One worker for a global phase, every registered worker otherwise.
    pub(crate) fn expected_worker_count(&self, phase: TestPhase) -> usize {
        if phase.is_global() {
            1
        } else {
            self.registry.worker_count()
        }
    }

    pub(crate) fn log_skipped_phases(&self, previous: Option<TestPhase>, next: TestPhase) {
        let mut candidate = match previous {
            Some(phase) => phase.next(),
            None => Some(TestPhase::Setup),
        };
        while let Some(phase) = candidate {
            if phase == next {
                return;
            }
            match phase {
                TestPhase::Warmup => self.echo("Skipping Test warmup"),
                TestPhase::GlobalVerify => self.echo("Skipping Test verification"),
                TestPhase::Setup
                | TestPhase::LocalPrepare
                | TestPhase::GlobalPrepare
                | TestPhase::LocalAfterWarmup
                | TestPhase::GlobalAfterWarmup
                | TestPhase::Run
                | TestPhase::LocalVerify
                | TestPhase::GlobalTeardown
                | TestPhase::LocalTeardown => {}
            }
            candidate = phase.next();
        }
    }

    pub(crate) fn log_waiting(
        &self,
        phase: TestPhase,
        reported: Option<&HashSet<SimulatorAddress>>,
        completed: usize,
        expected: usize,
        elapsed: Duration,
    ) {
        let waited = seconds_to_human(elapsed);
        let stopping = if self.test().is_stop_requested() {
            ", stop requested"
        } else {
            ""
        };
        if elapsed < self.settings.phase_log_verbose_delay || completed >= expected {
            self.echo(&format!(
                "Waiting {} for {} completion ({}/{} workers{})",
                waited,
                phase.desc(),
                completed,
                expected,
                stopping
            ));
            return;
        }
        let missing: Vec<String> = if expected == 1 {
            self.registry
                .first_worker()
                .map(|worker| worker.address.to_string())
                .into_iter()
                .collect()
        } else {
            self.registry
                .workers()
                .iter()
                .filter(|worker| reported.is_none_or(|done| !done.contains(&worker.address)))
                .map(|worker| worker.address.to_string())
                .collect()
        };
        self.echo(&format!(
            "Waiting {} for {} completion ({}/{} workers{}) (missing workers: [{}])",
            waited,
            phase.desc(),
            completed,
            expected,
            stopping,
            missing.join(", ")
        ));
    }

    /// Counts this test down on the barrier of `phase` and, unless a failure
    /// is pending, waits until every sibling test did the same.
    pub(crate) async fn sync_barrier(&self, phase: TestPhase) {
        let Some(barrier) = &self.barrier else {
            return;
        };
        barrier.count_down(phase, self.test.test_index());
        if !self.has_failure() {
            let released = barrier
                .wait(phase, self.settings.poll_interval, || self.has_failure())
                .await;
            if !released {
                debug!(
                    "{}Stopped waiting on {} barrier (critical failure)",
                    self.prefix,
                    phase.desc()
                );
            }
        }
        if barrier.remaining(phase) == 0 && barrier.announce_completion(phase) {
            info!("Completed TestPhase {}", phase.desc());
        }
    }

    /// Releases the barrier of `from` and of every later phase the suite
    /// executes, without waiting.
    pub(crate) fn unwind_barrier(&self, from: TestPhase) {
        let Some(barrier) = &self.barrier else {
            return;
        };
        let test_index = self.test.test_index();
        let mut next = Some(from);
        while let Some(phase) = next {
            barrier.count_down(phase, test_index);
            next = self.suite().next_phase(phase);
        }
    }
}
