//! Suite execution on the coordinator: runners, the shared phase barrier
//! and the collectors fed by inbound operations.
mod barrier;
mod failure;
pub(crate) mod format;
mod performance;
mod processor;
mod remote;
mod runner;
mod settings;
mod suite_runner;

#[cfg(test)]
mod tests;

pub use barrier::PhaseBarrier;
pub use failure::{FailureCollector, FailureRecord};
pub use performance::PerformanceStatsCollector;
pub use processor::{CompletionRouter, CoordinatorProcessor, PhaseCompletion};
pub use remote::RemoteClient;
pub use settings::{
    CoordinatorSettings, DEFAULT_PERFORMANCE_MONITOR_INTERVAL, DEFAULT_POLL_INTERVAL,
    DEFAULT_RESPONSE_TIMEOUT, PHASE_LOG_INTERVAL, PHASE_LOG_VERBOSE_DELAY, RUN_PHASE_LOG_INTERVAL,
};
pub use suite_runner::{Coordinator, SuiteReport, TestOutcome};
