use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::CoordinatorError;
use crate::protocol::{
    AddressLevel, LogLevel, Operation, OperationProcessor, ResponseType, SimulatorAddress,
    TestPhase,
};
use crate::registry::ComponentRegistry;

use super::{FailureCollector, PerformanceStatsCollector};

/// A worker finished `phase` for the test the receiving runner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub phase: TestPhase,
    pub worker: SimulatorAddress,
}

/// Routes phase completions to the runner of the reporting test.
#[derive(Debug, Default)]
pub struct CompletionRouter {
    channels: Mutex<HashMap<i32, mpsc::UnboundedSender<PhaseCompletion>>>,
}

impl CompletionRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the completion channel for a test.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::DuplicateCompletionChannel`] while another
    /// runner holds the channel for the same test index.
    pub fn register(
        &self,
        test_index: i32,
        test_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<PhaseCompletion>, CoordinatorError> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(&test_index)
            .is_some_and(|sender| !sender.is_closed())
        {
            return Err(CoordinatorError::DuplicateCompletionChannel {
                test_id: test_id.to_owned(),
            });
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        channels.insert(test_index, sender);
        Ok(receiver)
    }

    pub fn unregister(&self, test_index: i32) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&test_index);
    }

    /// Delivers a completion reported from a test address. Returns `false`
    /// when the source is not a test address or no runner listens for it.
    pub fn route(&self, source: SimulatorAddress, phase: TestPhase) -> bool {
        if source.level() != AddressLevel::Test {
            return false;
        }
        let Some(worker) = source.parent() else {
            return false;
        };
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(&source.test_index())
            .is_some_and(|sender| sender.send(PhaseCompletion { phase, worker }).is_ok())
    }
}

/// Handles operations addressed to the coordinator.
pub struct CoordinatorProcessor {
    registry: Arc<ComponentRegistry>,
    failures: Arc<FailureCollector>,
    performance: Arc<PerformanceStatsCollector>,
    completions: Arc<CompletionRouter>,
}

impl CoordinatorProcessor {
    #[must_use]
    pub fn new(
        registry: Arc<ComponentRegistry>,
        failures: Arc<FailureCollector>,
        performance: Arc<PerformanceStatsCollector>,
        completions: Arc<CompletionRouter>,
    ) -> Self {
        Self {
            registry,
            failures,
            performance,
            completions,
        }
    }
}

#[async_trait]
impl OperationProcessor for CoordinatorProcessor {
    async fn process(&self, operation: Operation, source: SimulatorAddress) -> ResponseType {
        match operation {
            Operation::PhaseCompleted(completed) => {
                if !self.completions.route(source, completed.phase) {
                    warn!(
                        "Dropped {} completion from {}: no runner for this test",
                        completed.phase.desc(),
                        source
                    );
                }
                ResponseType::Success
            }
            Operation::Failure(failure) => {
                let record = self.failures.report(failure);
                warn!(
                    "{} failure from {}{}: {}{}",
                    if record.critical { "Critical" } else { "Non-critical" },
                    record.worker_address,
                    record
                        .test_id
                        .as_deref()
                        .map(|test_id| format!(" (test {})", test_id))
                        .unwrap_or_default(),
                    record.message,
                    record
                        .cause
                        .as_deref()
                        .map(|cause| format!(" caused by {}", cause))
                        .unwrap_or_default()
                );
                if record.failure_type.is_worker_terminal() {
                    self.registry.remove_worker(record.worker_address);
                }
                ResponseType::Success
            }
            Operation::PerformanceStats(stats) => {
                self.performance.update(source, stats);
                ResponseType::Success
            }
            Operation::Log(log) => {
                match log.level {
                    LogLevel::Debug => debug!("[{}] {}", source, log.message),
                    LogLevel::Info => info!("[{}] {}", source, log.message),
                    LogLevel::Warn => warn!("[{}] {}", source, log.message),
                    LogLevel::Error => error!("[{}] {}", source, log.message),
                }
                ResponseType::Success
            }
            Operation::CreateTest(_)
            | Operation::StartTest(_)
            | Operation::StartTestPhase(_)
            | Operation::StopTest(_)
            | Operation::ExecuteScript(_) => ResponseType::UnsupportedOperationOnThisProcessor,
        }
    }
}
