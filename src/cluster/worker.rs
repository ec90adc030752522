use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::parse_duration_value;
use crate::protocol::{
    CreateTestOperation, FailureOperation, FailureType, Frame, Operation, PendingResponses,
    PerformanceStats, PerformanceStatsOperation, PhaseCompletedOperation, ResponseType,
    SimulatorAddress, SimulatorMessage, StartTestOperation, TestPhase,
};
use crate::registry::WorkerKind;

use super::ClusterShape;
use super::transport::Outbox;

/// Test case property: report a failure instead of completing this phase.
pub const FAIL_ON_PHASE: &str = "fail_on_phase";
/// Test case property: failure type reported by `fail_on_phase`.
pub const FAILURE_TYPE: &str = "failure_type";
/// Test case property: never report completion of this phase.
pub const STALL_ON_PHASE: &str = "stall_on_phase";
/// Test case property: the test ends warmup and run by itself after this
/// long.
pub const RUN_FOR: &str = "run_for";
/// Test case property: base throughput reported in performance stats.
pub const THROUGHPUT: &str = "throughput";
/// Test case property: time this test spends in each non-duration phase,
/// overriding the cluster's phase delay.
pub const PHASE_DELAY: &str = "phase_delay";

const DEFAULT_THROUGHPUT: f64 = 1_000.0;

/// Sends operations from a worker or test address up to the coordinator.
#[derive(Clone)]
pub(super) struct Uplink {
    outbox: Outbox,
    pending: Arc<PendingResponses>,
}

impl Uplink {
    pub(super) const fn new(outbox: Outbox, pending: Arc<PendingResponses>) -> Self {
        Self { outbox, pending }
    }

    fn send(&self, source: SimulatorAddress, operation: Operation) {
        let future = self.pending.register();
        let message = SimulatorMessage {
            message_id: future.message_id(),
            source,
            destination: SimulatorAddress::COORDINATOR,
            operation,
        };
        if self.outbox.send(Frame::Message(message)).is_err() {
            self.pending.cancel(future.message_id());
            debug!("Coordinator stream closed, dropped message from {}", source);
        }
    }
}

struct SimulatedTest {
    test_id: String,
    properties: BTreeMap<String, String>,
    stop: Option<watch::Sender<bool>>,
}

impl SimulatedTest {
    fn phase_property(&self, key: &str) -> Option<TestPhase> {
        self.properties
            .get(key)
            .and_then(|value| TestPhase::from_str(value).ok())
    }

    fn phase_delay(&self, default: Duration) -> Duration {
        self.properties
            .get(PHASE_DELAY)
            .and_then(|value| parse_duration_value(value).ok())
            .unwrap_or(default)
    }

    fn failure_type(&self) -> FailureType {
        self.properties
            .get(FAILURE_TYPE)
            .and_then(|value| {
                FailureType::ALL
                    .into_iter()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value.trim()))
            })
            .unwrap_or(FailureType::WorkerException)
    }
}

/// Worker process stand-in hosting simulated test instances.
pub(super) struct SimulatedWorker {
    address: SimulatorAddress,
    kind: WorkerKind,
    alive: AtomicBool,
    tests: Mutex<HashMap<i32, SimulatedTest>>,
    uplink: Uplink,
    shape: ClusterShape,
}

impl SimulatedWorker {
    pub(super) fn new(
        address: SimulatorAddress,
        kind: WorkerKind,
        uplink: Uplink,
        shape: ClusterShape,
    ) -> Self {
        Self {
            address,
            kind,
            alive: AtomicBool::new(true),
            tests: Mutex::new(HashMap::new()),
            uplink,
            shape,
        }
    }

    pub(super) const fn address(&self) -> SimulatorAddress {
        self.address
    }

    pub(super) const fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Handles an operation addressed to the worker itself.
    pub(super) fn handle_worker_operation(&self, operation: Operation) -> ResponseType {
        match operation {
            Operation::CreateTest(create) => self.create_test(create),
            Operation::ExecuteScript(script) => {
                info!("{} would execute '{}'", self.address, script.command);
                ResponseType::Success
            }
            Operation::Log(log) => {
                debug!("[{}] {}", self.address, log.message);
                ResponseType::Success
            }
            Operation::StartTest(_)
            | Operation::StartTestPhase(_)
            | Operation::StopTest(_)
            | Operation::PhaseCompleted(_)
            | Operation::Failure(_)
            | Operation::PerformanceStats(_) => ResponseType::UnsupportedOperationOnThisProcessor,
        }
    }

    /// Handles an operation addressed to one test instance on this worker.
    pub(super) fn handle_test_operation(
        self: &Arc<Self>,
        test_index: i32,
        operation: Operation,
    ) -> ResponseType {
        let mut tests = self.tests.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(test) = tests.get_mut(&test_index) else {
            return ResponseType::FailureTestNotFound;
        };
        match operation {
            Operation::StartTestPhase(start) => {
                self.start_phase(test_index, test, start.phase);
                ResponseType::Success
            }
            Operation::StartTest(start) => {
                self.start_test(test_index, test, &start);
                ResponseType::Success
            }
            Operation::StopTest(_) => {
                if let Some(stop) = &test.stop {
                    stop.send_replace(true);
                }
                ResponseType::Success
            }
            Operation::Log(log) => {
                debug!("[{}] {}", self.address.child(test_index).unwrap_or(self.address), log.message);
                ResponseType::Success
            }
            Operation::CreateTest(_)
            | Operation::ExecuteScript(_)
            | Operation::PhaseCompleted(_)
            | Operation::Failure(_)
            | Operation::PerformanceStats(_) => ResponseType::UnsupportedOperationOnThisProcessor,
        }
    }

    fn create_test(&self, create: CreateTestOperation) -> ResponseType {
        let mut tests = self.tests.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(
            "{} created test {} as T{}",
            self.address, create.test_id, create.test_index
        );
        tests.insert(
            create.test_index,
            SimulatedTest {
                test_id: create.test_id,
                properties: create.properties,
                stop: None,
            },
        );
        ResponseType::Success
    }

    /// Reports a failure instead of completing when the test asks for it.
    /// Returns `true` when the phase must not complete.
    fn intercept_phase(&self, test: &SimulatedTest, phase: TestPhase) -> bool {
        if test.phase_property(FAIL_ON_PHASE) == Some(phase) {
            let failure_type = test.failure_type();
            warn!(
                "{} injecting {} failure for {} in {}",
                self.address,
                failure_type,
                test.test_id,
                phase.desc()
            );
            if failure_type.is_worker_terminal() {
                self.alive.store(false, Ordering::Release);
            }
            self.uplink.send(
                self.address,
                Operation::Failure(FailureOperation {
                    message: format!("Simulated failure in {}", phase.desc()),
                    failure_type,
                    worker_address: self.address,
                    test_id: Some(test.test_id.clone()),
                    cause: None,
                }),
            );
            return true;
        }
        if test.phase_property(STALL_ON_PHASE) == Some(phase) {
            debug!("{} stalling {} in {}", self.address, test.test_id, phase.desc());
            return true;
        }
        false
    }

    fn start_phase(&self, test_index: i32, test: &SimulatedTest, phase: TestPhase) {
        if self.intercept_phase(test, phase) {
            return;
        }
        let uplink = self.uplink.clone();
        let source = self.test_address(test_index);
        let delay = test.phase_delay(self.shape.phase_delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            uplink.send(
                source,
                Operation::PhaseCompleted(PhaseCompletedOperation { phase }),
            );
        });
    }

    fn start_test(self: &Arc<Self>, test_index: i32, test: &mut SimulatedTest, start: &StartTestOperation) {
        let phase = if start.warmup {
            TestPhase::Warmup
        } else {
            TestPhase::Run
        };
        let source = self.test_address(test_index);
        if !start.target_workers.contains(&self.address) {
            debug!("{} is no target for {}, skipping {}", self.address, test.test_id, phase.desc());
            self.uplink.send(
                source,
                Operation::PhaseCompleted(PhaseCompletedOperation { phase }),
            );
            return;
        }
        let stalled = self.intercept_phase(test, phase);

        let (stop, stop_rx) = watch::channel(false);
        test.stop = Some(stop);
        let run_for = test
            .properties
            .get(RUN_FOR)
            .and_then(|value| parse_duration_value(value).ok());
        let throughput = test
            .properties
            .get(THROUGHPUT)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_THROUGHPUT);
        let load = LoadLoop {
            worker: Arc::clone(self),
            source,
            test_id: test.test_id.clone(),
            phase,
            report_completion: !stalled,
            run_for,
            throughput,
        };
        tokio::spawn(load.run(stop_rx));
    }

    fn test_address(&self, test_index: i32) -> SimulatorAddress {
        SimulatorAddress::test(self.address.agent_index(), self.address.worker_index(), test_index)
    }
}

/// Generates load for one test on one worker until stopped.
struct LoadLoop {
    worker: Arc<SimulatedWorker>,
    source: SimulatorAddress,
    test_id: String,
    phase: TestPhase,
    report_completion: bool,
    run_for: Option<Duration>,
    throughput: f64,
}

impl LoadLoop {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let started = tokio::time::Instant::now();
        let interval = self.worker.shape.stats_interval;
        let mut operation_count = 0u64;
        loop {
            let natural_end = self
                .run_for
                .map(|limit| limit.saturating_sub(started.elapsed()));
            let wait = natural_end.map_or(interval, |left| left.min(interval));
            let stopped = tokio::select! {
                _changed = stop.changed() => true,
                () = tokio::time::sleep(wait) => false,
            };
            if !self.worker.is_alive() {
                return;
            }

            let interval_count = self.sample_operations(wait);
            operation_count = operation_count.saturating_add(interval_count);
            if self.phase != TestPhase::Warmup {
                self.report_stats(operation_count, interval_count, wait);
            }

            let finished = self
                .run_for
                .is_some_and(|limit| started.elapsed() >= limit);
            if stopped || finished {
                break;
            }
        }
        if self.report_completion {
            self.worker.uplink.send(
                self.source,
                Operation::PhaseCompleted(PhaseCompletedOperation { phase: self.phase }),
            );
        }
    }

    fn sample_operations(&self, elapsed: Duration) -> u64 {
        let jitter: f64 = rand::thread_rng().gen_range(0.9..1.1);
        let operations = self.throughput * jitter * elapsed.as_secs_f64();
        operations.max(0.0).round() as u64
    }

    fn report_stats(&self, operation_count: u64, interval_count: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            interval_count as f64 / secs
        } else {
            0.0
        };
        let mut stats = BTreeMap::new();
        stats.insert(
            self.test_id.clone(),
            PerformanceStats {
                operation_count,
                interval_operation_count: interval_count,
                interval_throughput: throughput,
                interval_latency_max_nanos: rand::thread_rng().gen_range(50_000..2_000_000),
            },
        );
        self.worker.uplink.send(
            self.worker.address,
            Operation::PerformanceStats(PerformanceStatsOperation { stats }),
        );
    }
}
