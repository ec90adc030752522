use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::TestSuite;
use crate::error::{AppError, AppResult, ConfigError, CoordinatorError};
use crate::protocol::Connector;
use crate::registry::{CompletedStatus, ComponentRegistry, TargetType, TestData};

use super::format::seconds_to_human;
use super::processor::{CompletionRouter, CoordinatorProcessor, PhaseCompletion};
use super::runner::{RunnerContext, TestCaseRunner};
use super::{
    CoordinatorSettings, FailureCollector, PerformanceStatsCollector, PhaseBarrier, RemoteClient,
};

/// Final state of one test case after a suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub test_id: String,
    pub status: CompletedStatus,
    pub failures: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub outcomes: Vec<TestOutcome>,
    pub failure_count: usize,
    pub critical_failure_count: usize,
    pub elapsed: Duration,
}

impl SuiteReport {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status != CompletedStatus::Success)
            .count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    #[must_use]
    pub fn outcome(&self, test_id: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|outcome| outcome.test_id == test_id)
    }

    /// # Errors
    ///
    /// Returns [`CoordinatorError::SuiteFailed`] when any test did not
    /// succeed.
    pub fn ensure_success(&self) -> Result<(), CoordinatorError> {
        if self.is_success() {
            return Ok(());
        }
        Err(CoordinatorError::SuiteFailed {
            failed: self.failed_count(),
            total: self.outcomes.len(),
        })
    }
}

/// Runs test suites against the workers reachable through a connector.
pub struct Coordinator {
    registry: Arc<ComponentRegistry>,
    failures: Arc<FailureCollector>,
    performance: Arc<PerformanceStatsCollector>,
    completions: Arc<CompletionRouter>,
    remote: RemoteClient,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Creates the coordinator and registers its operation processor on
    /// `connector`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        registry: Arc<ComponentRegistry>,
        settings: CoordinatorSettings,
    ) -> Self {
        let failures = Arc::new(FailureCollector::default());
        let performance = Arc::new(PerformanceStatsCollector::new());
        let completions = Arc::new(CompletionRouter::new());
        connector.register_processor(Arc::new(CoordinatorProcessor::new(
            Arc::clone(&registry),
            Arc::clone(&failures),
            Arc::clone(&performance),
            Arc::clone(&completions),
        )));
        let remote = RemoteClient::new(connector, Arc::clone(&registry), settings.response_timeout);
        Self {
            registry,
            failures,
            performance,
            completions,
            remote,
            settings,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn failures(&self) -> &Arc<FailureCollector> {
        &self.failures
    }

    #[must_use]
    pub const fn performance(&self) -> &Arc<PerformanceStatsCollector> {
        &self.performance
    }

    #[must_use]
    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Runs every test case of `suite`, in parallel or one after another.
    ///
    /// # Errors
    ///
    /// Returns an error when the suite has no tests, no worker is
    /// registered, a test id is already registered, or a runner hit an
    /// unexpected error. Test failures are reported in the returned
    /// [`SuiteReport`], not as an error.
    pub async fn run_suite(&self, suite: TestSuite) -> AppResult<SuiteReport> {
        if suite.test_cases.is_empty() {
            return Err(AppError::config(ConfigError::NoTests));
        }
        let started = Instant::now();
        let suite = Arc::new(suite);

        let target_type = self.registry.resolve_target_type(suite.target_type);
        self.registry.select_workers_required(TargetType::All, 0)?;
        self.failures.clear();
        self.failures
            .set_non_critical(suite.non_critical_failures.clone());
        self.performance.clear();

        let tests = self.registry.add_tests(&suite)?;
        info!(
            "Running {} test(s) {} on {} worker(s), target: {}",
            tests.len(),
            if suite.parallel { "in parallel" } else { "sequentially" },
            self.registry.worker_count(),
            target_type.describe(suite.target_count)
        );

        let result = if suite.parallel {
            let barrier = Arc::new(PhaseBarrier::for_suite(&suite));
            self.run_parallel(&tests, target_type, &barrier).await
        } else {
            self.run_sequential(&tests, target_type, &suite).await
        };
        self.registry.clear_tests();
        result?;

        let report = SuiteReport {
            outcomes: tests
                .iter()
                .map(|test| TestOutcome {
                    test_id: test.id().to_owned(),
                    status: test.status(),
                    failures: self.failures.failures_for(test.id()).len(),
                    elapsed: test.elapsed(),
                })
                .collect(),
            failure_count: self.failures.failure_count(),
            critical_failure_count: self.failures.critical_failure_count(),
            elapsed: started.elapsed(),
        };
        log_report(&suite, &report);
        Ok(report)
    }

    async fn run_parallel(
        &self,
        tests: &[Arc<TestData>],
        target_type: TargetType,
        barrier: &Arc<PhaseBarrier>,
    ) -> AppResult<()> {
        // All channels open before the first runner starts, so a failed
        // registration never leaves runners waiting on an undersized barrier.
        let mut receivers = Vec::with_capacity(tests.len());
        for test in tests {
            match self.completions.register(test.test_index(), test.id()) {
                Ok(receiver) => receivers.push(receiver),
                Err(err) => {
                    for opened in tests {
                        self.completions.unregister(opened.test_index());
                    }
                    return Err(err.into());
                }
            }
        }

        let mut handles = Vec::with_capacity(tests.len());
        for (test, receiver) in tests.iter().zip(receivers) {
            let runner = self.runner(test, receiver, target_type, Some(Arc::clone(barrier)));
            handles.push((Arc::clone(test), tokio::spawn(runner.run())));
        }

        let mut first_error = None;
        for (test, handle) in handles {
            let joined = handle.await;
            self.completions.unregister(test.test_index());
            match joined {
                Ok(Ok(_status)) => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(err) => {
                    test.complete(CompletedStatus::Failed);
                    first_error.get_or_insert(AppError::coordinator(CoordinatorError::RunnerJoin {
                        test_id: test.id().to_owned(),
                        source: err,
                    }));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn run_sequential(
        &self,
        tests: &[Arc<TestData>],
        target_type: TargetType,
        suite: &TestSuite,
    ) -> AppResult<()> {
        for test in tests {
            if suite.fail_fast && self.failures.has_critical_failure() {
                warn!("Skipping Test {} (critical failure in suite)", test.id());
                test.complete(CompletedStatus::Failed);
                continue;
            }
            let receiver = self.completions.register(test.test_index(), test.id())?;
            let runner = self.runner(test, receiver, target_type, None);
            let result = runner.run().await;
            self.completions.unregister(test.test_index());
            result?;
        }
        Ok(())
    }

    fn runner(
        &self,
        test: &Arc<TestData>,
        completions: mpsc::UnboundedReceiver<PhaseCompletion>,
        target_type: TargetType,
        barrier: Option<Arc<PhaseBarrier>>,
    ) -> TestCaseRunner {
        let ctx = RunnerContext::new(
            Arc::clone(test),
            self.remote.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.failures),
            Arc::clone(&self.performance),
            barrier,
            self.settings.clone(),
            target_type,
        );
        TestCaseRunner::new(ctx, completions)
    }
}

fn log_report(suite: &TestSuite, report: &SuiteReport) {
    let width = suite.max_test_case_id_len().saturating_add(1);
    for outcome in &report.outcomes {
        let status = match outcome.status {
            CompletedStatus::Success => "SUCCESS",
            CompletedStatus::Failed => "FAILED",
            CompletedStatus::InProgress => "IN PROGRESS",
        };
        info!(
            "{:<width$}{} after {} ({} failure(s))",
            outcome.test_id,
            status,
            seconds_to_human(outcome.elapsed),
            outcome.failures,
            width = width
        );
    }
    info!(
        "Suite finished in {}: {}/{} test(s) succeeded, {} failure(s) reported",
        seconds_to_human(report.elapsed),
        report.outcomes.len().saturating_sub(report.failed_count()),
        report.outcomes.len(),
        report.failure_count
    );
}
