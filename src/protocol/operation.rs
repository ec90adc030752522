use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::TargetType;

use super::{SimulatorAddress, TestPhase};

/// Typed message exchanged between coordinator, agents and workers.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTest(CreateTestOperation),
    StartTest(StartTestOperation),
    StartTestPhase(StartTestPhaseOperation),
    StopTest(StopTestOperation),
    PhaseCompleted(PhaseCompletedOperation),
    ExecuteScript(ExecuteScriptOperation),
    Failure(FailureOperation),
    PerformanceStats(PerformanceStatsOperation),
    Log(LogOperation),
}

impl Operation {
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::CreateTest(_) => OperationType::CreateTest,
            Self::StartTest(_) => OperationType::StartTest,
            Self::StartTestPhase(_) => OperationType::StartTestPhase,
            Self::StopTest(_) => OperationType::StopTest,
            Self::PhaseCompleted(_) => OperationType::PhaseCompleted,
            Self::ExecuteScript(_) => OperationType::ExecuteScript,
            Self::Failure(_) => OperationType::Failure,
            Self::PerformanceStats(_) => OperationType::PerformanceStats,
            Self::Log(_) => OperationType::Log,
        }
    }
}

/// Wire discriminator of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    CreateTest,
    StartTest,
    StartTestPhase,
    StopTest,
    PhaseCompleted,
    ExecuteScript,
    Failure,
    PerformanceStats,
    Log,
}

impl OperationType {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::CreateTest => 1,
            Self::StartTest => 2,
            Self::StartTestPhase => 3,
            Self::StopTest => 4,
            Self::PhaseCompleted => 5,
            Self::ExecuteScript => 6,
            Self::Failure => 7,
            Self::PerformanceStats => 8,
            Self::Log => 9,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::CreateTest),
            2 => Some(Self::StartTest),
            3 => Some(Self::StartTestPhase),
            4 => Some(Self::StopTest),
            5 => Some(Self::PhaseCompleted),
            6 => Some(Self::ExecuteScript),
            7 => Some(Self::Failure),
            8 => Some(Self::PerformanceStats),
            9 => Some(Self::Log),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTest => "create_test",
            Self::StartTest => "start_test",
            Self::StartTestPhase => "start_test_phase",
            Self::StopTest => "stop_test",
            Self::PhaseCompleted => "phase_completed",
            Self::ExecuteScript => "execute_script",
            Self::Failure => "failure",
            Self::PerformanceStats => "performance_stats",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTestOperation {
    pub test_index: i32,
    pub test_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTestOperation {
    pub target_type: TargetType,
    /// Workers that actually drive load; the others only take part in phases.
    #[serde(default)]
    pub target_workers: Vec<SimulatorAddress>,
    pub warmup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTestPhaseOperation {
    pub phase: TestPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StopTestOperation {}

/// Sent by a test instance once it finished a phase. The source address of
/// the carrying message identifies the worker and the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCompletedOperation {
    pub phase: TestPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteScriptOperation {
    pub command: String,
    pub fire_and_forget: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    WorkerException,
    WorkerTimeout,
    WorkerOom,
    WorkerExit,
    WorkerFinished,
    WorkerCreateError,
}

impl FailureType {
    pub const ALL: [Self; 6] = [
        Self::WorkerException,
        Self::WorkerTimeout,
        Self::WorkerOom,
        Self::WorkerExit,
        Self::WorkerFinished,
        Self::WorkerCreateError,
    ];

    /// The reporting worker process is gone after this failure.
    #[must_use]
    pub const fn is_worker_terminal(self) -> bool {
        matches!(
            self,
            Self::WorkerOom | Self::WorkerExit | Self::WorkerFinished | Self::WorkerCreateError
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkerException => "worker_exception",
            Self::WorkerTimeout => "worker_timeout",
            Self::WorkerOom => "worker_oom",
            Self::WorkerExit => "worker_exit",
            Self::WorkerFinished => "worker_finished",
            Self::WorkerCreateError => "worker_create_error",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOperation {
    pub message: String,
    pub failure_type: FailureType,
    pub worker_address: SimulatorAddress,
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation_count: u64,
    pub interval_operation_count: u64,
    pub interval_throughput: f64,
    pub interval_latency_max_nanos: u64,
}

/// Periodic statistics from a worker, keyed by test id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceStatsOperation {
    pub stats: BTreeMap<String, PerformanceStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOperation {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
}
