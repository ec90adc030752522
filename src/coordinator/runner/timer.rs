use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::error::CoordinatorError;
use crate::protocol::{Operation, StartTestOperation, StopTestOperation, TestPhase};

use super::super::format::{format_percentage, seconds_to_human};
use super::{RunnerContext, RunnerError, TestCaseRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationPhase {
    Warmup,
    Run,
}

impl DurationPhase {
    const fn of(phase: TestPhase) -> Option<Self> {
        match phase {
            TestPhase::Warmup => Some(Self::Warmup),
            TestPhase::Run => Some(Self::Run),
            TestPhase::Setup
            | TestPhase::LocalPrepare
            | TestPhase::GlobalPrepare
            | TestPhase::LocalAfterWarmup
            | TestPhase::GlobalAfterWarmup
            | TestPhase::GlobalVerify
            | TestPhase::LocalVerify
            | TestPhase::GlobalTeardown
            | TestPhase::LocalTeardown => None,
        }
    }

    const fn is_warmup(self) -> bool {
        matches!(self, Self::Warmup)
    }
}

enum DurationOutcome {
    Natural(Result<(), RunnerError>),
    TimerFired(Result<(), RunnerError>),
}

impl TestCaseRunner {
    /// Starts the test on its target workers and ends the phase either when
    /// the configured duration elapsed (sending `StopTest`) or, if the suite
    /// lets the test decide, when the test completes the phase by itself.
    /// With both enabled the first path to finish wins and the other one is
    /// dropped.
    pub(super) async fn execute_duration_phase(
        &mut self,
        phase: TestPhase,
    ) -> Result<(), RunnerError> {
        let kind = DurationPhase::of(phase).ok_or(CoordinatorError::NotADurationPhase { phase })?;
        self.ctx.check_abort(phase)?;
        self.ctx.test().set_phase(phase);
        self.start_test(kind).await?;

        let suite = Arc::clone(self.ctx.suite());
        let duration = if kind.is_warmup() {
            suite.warmup
        } else {
            suite.duration
        };
        let timed = !duration.is_zero();

        if suite.wait_for_test_case || !timed {
            self.ctx.echo(if kind.is_warmup() {
                "Test will run warmup until it stops"
            } else {
                "Test will run until it stops"
            });
            let ctx = &self.ctx;
            let tracker = &mut self.tracker;
            let outcome = if timed {
                tokio::select! {
                    natural = tracker.wait_for(ctx, phase) => DurationOutcome::Natural(natural),
                    timer = ctx.run_timer(kind, duration) => DurationOutcome::TimerFired(timer),
                }
            } else {
                DurationOutcome::Natural(tracker.wait_for(ctx, phase).await)
            };
            match outcome {
                DurationOutcome::Natural(result) => {
                    result?;
                    self.ctx.echo(if kind.is_warmup() {
                        "Test finished running warmup"
                    } else {
                        "Test finished running"
                    });
                }
                DurationOutcome::TimerFired(result) => {
                    result?;
                    self.wait_for_stop(kind, phase).await?;
                }
            }
        } else {
            self.ctx.run_timer(kind, duration).await?;
            self.wait_for_stop(kind, phase).await?;
        }

        self.ctx.sync_barrier(phase).await;
        Ok(())
    }

    async fn start_test(&self, kind: DurationPhase) -> Result<(), RunnerError> {
        let ctx = &self.ctx;
        let suite = ctx.suite();
        let label = if kind.is_warmup() { "warmup " } else { "" };
        ctx.echo(&format!(
            "Starting Test {}start on {}",
            label,
            ctx.target_type().describe(suite.target_count)
        ));
        let target_workers = ctx
            .registry()
            .select_workers_required(ctx.target_type(), suite.target_count)?
            .into_iter()
            .map(|worker| worker.address)
            .collect();
        ctx.remote()
            .invoke_on_test_on_all_workers(
                ctx.test().test_index(),
                Operation::StartTest(StartTestOperation {
                    target_type: ctx.target_type(),
                    target_workers,
                    warmup: kind.is_warmup(),
                }),
            )
            .await?;
        ctx.echo(&format!("Completed Test {}start", label));
        Ok(())
    }

    async fn wait_for_stop(&mut self, kind: DurationPhase, phase: TestPhase) -> Result<(), RunnerError> {
        self.tracker.wait_for(&self.ctx, phase).await?;
        self.ctx.echo(if kind.is_warmup() {
            "Completed Test warmup stop"
        } else {
            "Completed Test stop"
        });
        Ok(())
    }
}

impl RunnerContext {
    /// Sleeps for `duration` unless a critical failure shows up, then asks
    /// every worker to stop the test.
    async fn run_timer(&self, kind: DurationPhase, duration: Duration) -> Result<(), RunnerError> {
        self.echo(&format!(
            "Test will {} for {}",
            if kind.is_warmup() { "warmup" } else { "run" },
            seconds_to_human(duration)
        ));
        self.sleep_until_failure(kind, duration).await;
        self.echo(if kind.is_warmup() {
            "Test finished warmup"
        } else {
            "Test finished running"
        });

        self.echo(if kind.is_warmup() {
            "Executing Test warmup stop"
        } else {
            "Executing Test stop"
        });
        self.test().request_stop();
        self.remote()
            .invoke_on_test_on_all_workers(
                self.test().test_index(),
                Operation::StopTest(StopTestOperation {}),
            )
            .await?;
        Ok(())
    }

    /// Sleeps in steps of at most one poll interval, checking for failures
    /// between steps and logging progress every run log interval.
    async fn sleep_until_failure(&self, kind: DurationPhase, duration: Duration) {
        let settings = self.settings();
        let log_interval = settings.run_log_interval();
        let started = Instant::now();
        let mut next_log = log_interval.min(duration);
        let mut logged = Duration::ZERO;
        loop {
            let elapsed = started.elapsed();
            if elapsed >= next_log && next_log > logged {
                self.log_progress(kind, next_log, duration);
                logged = next_log;
                next_log = next_log.saturating_add(log_interval).min(duration);
            }
            if elapsed >= duration {
                return;
            }
            if self.has_failure() {
                self.echo(&format!(
                    "Critical failure detected, aborting {} phase",
                    if kind.is_warmup() { "warmup" } else { "run" }
                ));
                return;
            }
            let step = settings
                .poll_interval
                .min(next_log.saturating_sub(elapsed))
                .min(duration.saturating_sub(elapsed));
            tokio::time::sleep(step).await;
        }
    }

    fn log_progress(&self, kind: DurationPhase, elapsed: Duration, duration: Duration) {
        let mut message = format!(
            "{} {} ({}%)",
            if kind.is_warmup() { "Warming up" } else { "Running" },
            seconds_to_human(elapsed),
            format_percentage(elapsed, duration)
        );
        let monitor_ms = self.settings().performance_monitor_interval.as_millis();
        if monitor_ms > 0 && elapsed.as_millis().checked_rem(monitor_ms) == Some(0) {
            message.push_str(
                &self
                    .performance()
                    .format_performance_numbers(self.test().id()),
            );
        }
        info!("{}{}", self.prefix(), message);
    }
}
