use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::coordinator::PhaseBarrier;
use crate::domain::{TestCase, TestSuite};
use crate::error::{AppError, AppResult};
use crate::protocol::TestPhase;

const POLL: Duration = Duration::from_millis(5);

#[test]
fn count_down_is_once_per_test() -> AppResult<()> {
    let barrier = PhaseBarrier::with_counts([(TestPhase::Setup, 2)]);
    if !barrier.count_down(TestPhase::Setup, 1) {
        return Err(AppError::coordinator("first count down must apply"));
    }
    if barrier.count_down(TestPhase::Setup, 1) {
        return Err(AppError::coordinator("second count down by the same test applied"));
    }
    if barrier.remaining(TestPhase::Setup) != 1 {
        return Err(AppError::coordinator("unexpected remaining count"));
    }
    if !barrier.count_down(TestPhase::Setup, 2) || barrier.remaining(TestPhase::Setup) != 0 {
        return Err(AppError::coordinator("second test must release the phase"));
    }
    if barrier.count_down(TestPhase::Setup, 3) {
        return Err(AppError::coordinator("counter must not go below zero"));
    }
    if barrier.count_down(TestPhase::Run, 1) || barrier.remaining(TestPhase::Run) != 0 {
        return Err(AppError::coordinator("phase without a counter must be inert"));
    }
    Ok(())
}

#[test]
fn announce_completion_once_per_phase() -> AppResult<()> {
    let barrier = PhaseBarrier::with_counts([(TestPhase::Setup, 1), (TestPhase::Run, 1)]);
    if !barrier.announce_completion(TestPhase::Setup)
        || barrier.announce_completion(TestPhase::Setup)
    {
        return Err(AppError::coordinator("setup must be announced exactly once"));
    }
    if !barrier.announce_completion(TestPhase::Run) {
        return Err(AppError::coordinator("run announcement is independent of setup"));
    }
    Ok(())
}

#[test]
fn phases_after_sync_point_never_block() -> AppResult<()> {
    let suite = TestSuite {
        sync_to_phase: Some(TestPhase::LocalPrepare),
        ..TestSuite::with_tests([TestCase::new("map"), TestCase::new("queue")])
    };
    let barrier = PhaseBarrier::for_suite(&suite);
    if barrier.remaining(TestPhase::Setup) != 2 || barrier.remaining(TestPhase::LocalPrepare) != 2 {
        return Err(AppError::coordinator("synced phases must count every test"));
    }
    if barrier.remaining(TestPhase::GlobalPrepare) != 0 || barrier.remaining(TestPhase::Run) != 0 {
        return Err(AppError::coordinator("phases past the sync point must start at zero"));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn wait_releases_at_zero() -> AppResult<()> {
    let barrier = Arc::new(PhaseBarrier::with_counts([(TestPhase::Setup, 2)]));
    let waiter = {
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move { barrier.wait(TestPhase::Setup, POLL, || false).await })
    };
    tokio::task::yield_now().await;
    barrier.count_down(TestPhase::Setup, 1);
    barrier.count_down(TestPhase::Setup, 2);

    let released = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .map_err(|elapsed| AppError::coordinator(format!("waiter hung: {}", elapsed)))?
        .map_err(|err| AppError::coordinator(format!("waiter panicked: {}", err)))?;
    if !released {
        return Err(AppError::coordinator("waiter must be released"));
    }
    if !barrier.wait(TestPhase::Run, POLL, || true).await {
        return Err(AppError::coordinator("phase without a counter must not block"));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn wait_gives_up_when_aborted() -> AppResult<()> {
    let barrier = PhaseBarrier::with_counts([(TestPhase::Setup, 1)]);
    let aborted = AtomicBool::new(false);
    let wait = barrier.wait(TestPhase::Setup, POLL, || aborted.load(Ordering::SeqCst));
    let abort = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        aborted.store(true, Ordering::SeqCst);
    };
    let (released, ()) = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(wait, abort)
    })
    .await
    .map_err(|elapsed| AppError::coordinator(format!("abort not observed: {}", elapsed)))?;
    if released {
        return Err(AppError::coordinator("aborted wait must report false"));
    }
    Ok(())
}
