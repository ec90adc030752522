use std::time::{Duration, Instant};

use super::{Harness, expect_status, shape, suite};
use crate::cluster::{FAIL_ON_PHASE, RUN_FOR, STALL_ON_PHASE};
use crate::domain::{TestCase, TestSuite};
use crate::error::{AppError, AppResult, RegistryError};
use crate::registry::{CompletedStatus, TargetType};

const SHORT_RUN: Duration = Duration::from_millis(150);
/// Far longer than any test waits; reaching it means an abort was missed.
const LONG_RUN: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "current_thread")]
async fn single_test_runs_every_phase() -> AppResult<()> {
    let harness = Harness::start(shape(2, 0))?;
    let report = harness
        .run(TestSuite {
            warmup: Duration::from_millis(50),
            ..suite([TestCase::new("map")], SHORT_RUN)
        })
        .await?;
    expect_status(&report, "map", CompletedStatus::Success)?;
    if !report.is_success() || report.failure_count != 0 {
        return Err(AppError::coordinator("suite must succeed without failures"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_tests_share_the_cluster() -> AppResult<()> {
    let harness = Harness::start(shape(2, 1))?;
    let report = harness
        .run(suite(
            [TestCase::new("map"), TestCase::new("queue")],
            SHORT_RUN,
        ))
        .await?;
    expect_status(&report, "map", CompletedStatus::Success)?;
    expect_status(&report, "queue", CompletedStatus::Success)?;
    if report.failed_count() != 0 {
        return Err(AppError::coordinator("no test may fail"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_aborts_every_test() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let started = Instant::now();
    let report = harness
        .run(suite(
            [
                TestCase::new("map").with_property(FAIL_ON_PHASE, "RUN"),
                TestCase::new("queue"),
            ],
            LONG_RUN,
        ))
        .await?;
    expect_status(&report, "map", CompletedStatus::Failed)?;
    expect_status(&report, "queue", CompletedStatus::Failed)?;
    if started.elapsed() >= LONG_RUN || report.critical_failure_count != 1 {
        return Err(AppError::coordinator(format!(
            "unexpected abort after {:?} with {} critical failure(s)",
            started.elapsed(),
            report.critical_failure_count
        )));
    }
    if report.outcome("queue").map(|outcome| outcome.failures) != Some(0) {
        return Err(AppError::coordinator("failure must be attributed to map only"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn failures_do_not_carry_over_to_the_next_suite() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let failed = harness
        .run(suite(
            [TestCase::new("map").with_property(FAIL_ON_PHASE, "SETUP")],
            SHORT_RUN,
        ))
        .await?;
    expect_status(&failed, "map", CompletedStatus::Failed)?;
    if failed.critical_failure_count == 0 {
        return Err(AppError::coordinator("first suite must record its failure"));
    }

    let clean = harness
        .run(suite([TestCase::new("queue")], SHORT_RUN))
        .await?;
    expect_status(&clean, "queue", CompletedStatus::Success)?;
    if !clean.is_success() || clean.failure_count != 0 || clean.critical_failure_count != 0 {
        return Err(AppError::coordinator(format!(
            "second suite inherited {} failure(s), {} critical",
            clean.failure_count, clean.critical_failure_count
        )));
    }
    if !harness.coordinator.failures().failures().is_empty() {
        return Err(AppError::coordinator("collector still holds old failures"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn without_fail_fast_other_tests_finish() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let report = harness
        .run(TestSuite {
            fail_fast: false,
            ..suite(
                [
                    TestCase::new("map").with_property(FAIL_ON_PHASE, "LOCAL_PREPARE"),
                    TestCase::new("queue"),
                ],
                SHORT_RUN,
            )
        })
        .await?;
    expect_status(&report, "map", CompletedStatus::Failed)?;
    expect_status(&report, "queue", CompletedStatus::Success)?;
    if report.failed_count() != 1 || report.is_success() {
        return Err(AppError::coordinator("exactly one test must fail"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_test_is_released_by_a_failure() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    // Zero duration waits for the tests to end the run phase, which the
    // stalled one never does on its own.
    let report = harness
        .run(suite(
            [
                TestCase::new("map").with_property(STALL_ON_PHASE, "RUN"),
                TestCase::new("queue").with_property(FAIL_ON_PHASE, "RUN"),
            ],
            Duration::ZERO,
        ))
        .await?;
    expect_status(&report, "map", CompletedStatus::Failed)?;
    expect_status(&report, "queue", CompletedStatus::Failed)?;
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn sequential_fail_fast_skips_remaining_tests() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let report = harness
        .run(TestSuite {
            parallel: false,
            ..suite(
                [
                    TestCase::new("map").with_property(FAIL_ON_PHASE, "SETUP"),
                    TestCase::new("queue"),
                ],
                SHORT_RUN,
            )
        })
        .await?;
    expect_status(&report, "map", CompletedStatus::Failed)?;
    expect_status(&report, "queue", CompletedStatus::Failed)?;
    if report.outcome("queue").map(|outcome| outcome.elapsed) != Some(Duration::ZERO) {
        return Err(AppError::coordinator("skipped test must never start"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn sequential_tests_run_one_after_another() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let report = harness
        .run(TestSuite {
            parallel: false,
            ..suite([TestCase::new("map"), TestCase::new("queue")], SHORT_RUN)
        })
        .await?;
    if !report.is_success() || report.outcomes.len() != 2 {
        return Err(AppError::coordinator("both sequential tests must succeed"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn zero_duration_waits_for_natural_completion() -> AppResult<()> {
    let harness = Harness::start(shape(2, 0))?;
    let report = harness
        .run(suite(
            [TestCase::new("map").with_property(RUN_FOR, "80ms")],
            Duration::ZERO,
        ))
        .await?;
    expect_status(&report, "map", CompletedStatus::Success)?;
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn wait_for_test_case_ends_before_the_timer() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let started = Instant::now();
    let report = harness
        .run(TestSuite {
            wait_for_test_case: true,
            ..suite(
                [TestCase::new("map").with_property(RUN_FOR, "50ms")],
                LONG_RUN,
            )
        })
        .await?;
    expect_status(&report, "map", CompletedStatus::Success)?;
    if started.elapsed() >= LONG_RUN {
        return Err(AppError::coordinator("natural completion must win over the timer"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn client_target_without_clients_is_an_error() -> AppResult<()> {
    let harness = Harness::start(shape(1, 0))?;
    let result = harness
        .run(TestSuite {
            target_type: TargetType::Clients,
            ..suite([TestCase::new("map")], SHORT_RUN)
        })
        .await;
    match result {
        Err(AppError::Registry(RegistryError::InsufficientWorkers { .. })) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected insufficient workers, got ok={}",
                other.is_ok()
            )));
        }
    }
    // The failed run leaves no tests registered behind.
    if !harness.coordinator.registry().tests().is_empty() {
        return Err(AppError::coordinator("tests must be cleared after the run"));
    }
    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn suite_without_workers_is_rejected() -> AppResult<()> {
    let harness = Harness::start(shape(0, 0))?;
    match harness.run(suite([TestCase::new("map")], SHORT_RUN)).await {
        Err(AppError::Registry(RegistryError::InsufficientWorkers { registered: 0, .. })) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected insufficient workers, got ok={}",
                other.is_ok()
            )));
        }
    }
    harness.shutdown();
    Ok(())
}
