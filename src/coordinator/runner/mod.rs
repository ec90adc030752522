//! Phase state machine driving one test case through its lifecycle.
mod completion;
mod context;
mod timer;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{AddressError, AppError, AppResult, CoordinatorError, RegistryError};
use crate::protocol::{CreateTestOperation, Operation, StartTestPhaseOperation, TestPhase};
use crate::registry::CompletedStatus;

use super::processor::PhaseCompletion;
use completion::CompletionTracker;
pub(crate) use context::RunnerContext;

/// Abort signal carrying the phase at which the test stopped. Never leaves
/// the runner.
#[derive(Debug)]
pub(crate) struct TestAborted {
    pub(crate) phase: TestPhase,
    pub(crate) message: String,
}

#[derive(Debug)]
pub(crate) enum RunnerError {
    Aborted(TestAborted),
    Fatal(AppError),
}

impl RunnerError {
    fn aborted(phase: TestPhase, message: String) -> Self {
        Self::Aborted(TestAborted { phase, message })
    }
}

impl From<AppError> for RunnerError {
    fn from(error: AppError) -> Self {
        Self::Fatal(error)
    }
}

impl From<CoordinatorError> for RunnerError {
    fn from(error: CoordinatorError) -> Self {
        Self::Fatal(error.into())
    }
}

impl From<RegistryError> for RunnerError {
    fn from(error: RegistryError) -> Self {
        Self::Fatal(error.into())
    }
}

impl From<AddressError> for RunnerError {
    fn from(error: AddressError) -> Self {
        Self::Fatal(error.into())
    }
}

/// Drives one test case from creation through its last teardown phase.
pub(crate) struct TestCaseRunner {
    ctx: RunnerContext,
    tracker: CompletionTracker,
}

impl TestCaseRunner {
    pub(crate) fn new(
        ctx: RunnerContext,
        completions: mpsc::UnboundedReceiver<PhaseCompletion>,
    ) -> Self {
        Self {
            ctx,
            tracker: CompletionTracker::new(completions),
        }
    }

    /// Runs the test to its final status.
    ///
    /// A critical failure ends the test as [`CompletedStatus::Failed`] after
    /// releasing every barrier it still owes. Other errors also mark the test
    /// failed and release its barriers, then propagate.
    pub(crate) async fn run(mut self) -> AppResult<CompletedStatus> {
        let test = Arc::clone(self.ctx.test());
        test.init_start_time();
        match self.run_phases().await {
            Ok(()) => {
                let status = if self.ctx.has_own_critical_failure() {
                    CompletedStatus::Failed
                } else {
                    CompletedStatus::Success
                };
                test.complete(status);
            }
            Err(RunnerError::Aborted(aborted)) => {
                self.ctx.echo(&aborted.message);
                self.ctx.unwind_barrier(aborted.phase);
                test.complete(CompletedStatus::Failed);
            }
            Err(RunnerError::Fatal(err)) => {
                self.ctx
                    .unwind_barrier(test.phase().unwrap_or(TestPhase::Setup));
                test.complete(CompletedStatus::Failed);
                return Err(err);
            }
        }
        Ok(test.status())
    }

    async fn run_phases(&mut self) -> Result<(), RunnerError> {
        self.create_test().await?;
        let mut previous = None;
        for phase in self.ctx.suite().phases() {
            self.ctx.log_skipped_phases(previous, phase);
            if phase.is_duration_bound() {
                self.execute_duration_phase(phase).await?;
            } else {
                self.execute_phase(phase).await?;
            }
            previous = Some(phase);
        }
        Ok(())
    }

    async fn create_test(&self) -> Result<(), RunnerError> {
        let test = self.ctx.test();
        self.ctx.echo("Starting Test initialization");
        self.ctx
            .remote()
            .invoke_on_all_workers(Operation::CreateTest(CreateTestOperation {
                test_index: test.test_index(),
                test_id: test.id().to_owned(),
                properties: test.test_case().properties.clone(),
            }))
            .await?;
        self.ctx.echo("Completed Test initialization");
        Ok(())
    }

    async fn execute_phase(&mut self, phase: TestPhase) -> Result<(), RunnerError> {
        self.ctx.check_abort(phase)?;
        self.ctx.test().set_phase(phase);

        self.ctx.echo(&format!("Starting Test {}", phase.desc()));
        let test_index = self.ctx.test().test_index();
        let operation = Operation::StartTestPhase(StartTestPhaseOperation { phase });
        if phase.is_global() {
            self.ctx
                .remote()
                .invoke_on_test_on_first_worker(test_index, operation)
                .await?;
        } else {
            self.ctx
                .remote()
                .invoke_on_test_on_all_workers(test_index, operation)
                .await?;
        }
        self.tracker.wait_for(&self.ctx, phase).await?;
        self.ctx.echo(&format!("Completed Test {}", phase.desc()));

        self.ctx.sync_barrier(phase).await;
        Ok(())
    }
}
