use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Local};

use crate::domain::{TestCase, TestSuite};
use crate::protocol::{SimulatorAddress, TestPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedStatus {
    InProgress,
    Failed,
    Success,
}

impl CompletedStatus {
    const fn to_u8(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Failed => 1,
            Self::Success => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Failed,
            2 => Self::Success,
            _ => Self::InProgress,
        }
    }
}

/// Execution record of one test case in a suite run.
#[derive(Debug)]
pub struct TestData {
    test_index: i32,
    address: SimulatorAddress,
    test_case: Arc<TestCase>,
    test_suite: Arc<TestSuite>,
    started: OnceLock<(Instant, DateTime<Local>)>,
    phase: Mutex<Option<TestPhase>>,
    stop_requested: AtomicBool,
    status: AtomicU8,
}

impl TestData {
    pub(crate) fn new(
        test_index: i32,
        address: SimulatorAddress,
        test_case: Arc<TestCase>,
        test_suite: Arc<TestSuite>,
    ) -> Self {
        Self {
            test_index,
            address,
            test_case,
            test_suite,
            started: OnceLock::new(),
            phase: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            status: AtomicU8::new(CompletedStatus::InProgress.to_u8()),
        }
    }

    #[must_use]
    pub const fn test_index(&self) -> i32 {
        self.test_index
    }

    #[must_use]
    pub const fn address(&self) -> SimulatorAddress {
        self.address
    }

    #[must_use]
    pub fn test_case(&self) -> &Arc<TestCase> {
        &self.test_case
    }

    #[must_use]
    pub fn test_suite(&self) -> &Arc<TestSuite> {
        &self.test_suite
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.test_case.id
    }

    /// Records the start time; later calls keep the first value.
    pub fn init_start_time(&self) {
        self.started.get_or_init(|| (Instant::now(), Local::now()));
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.started.get().map(|(_, wall)| *wall)
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started
            .get()
            .map_or(std::time::Duration::ZERO, |(instant, _)| instant.elapsed())
    }

    #[must_use]
    pub fn phase(&self) -> Option<TestPhase> {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters `phase`. A stop requested for the previous phase is dropped.
    pub fn set_phase(&self, phase: TestPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = Some(phase);
        self.stop_requested.store(false, Ordering::Release);
    }

    /// Marks the current duration phase as asked to stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> CompletedStatus {
        CompletedStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status() != CompletedStatus::InProgress
    }

    /// Moves the test out of [`CompletedStatus::InProgress`]. Only the first
    /// call wins; it returns `false` when a final status was already set or
    /// when `status` is `InProgress`.
    pub fn complete(&self, status: CompletedStatus) -> bool {
        if status == CompletedStatus::InProgress {
            return false;
        }
        self.status
            .compare_exchange(
                CompletedStatus::InProgress.to_u8(),
                status.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[must_use]
    pub fn status_string(&self) -> String {
        match self.status() {
            CompletedStatus::InProgress => match self.phase() {
                None => "pending".to_owned(),
                Some(phase) if self.is_stop_requested() => format!("stopping {}", phase.desc()),
                Some(phase) => phase.desc().to_owned(),
            },
            CompletedStatus::Success => "completed".to_owned(),
            CompletedStatus::Failed => "failed".to_owned(),
        }
    }
}
