use std::time::Duration;

/// How often runners poll for progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Cadence of "waiting for completion" lines.
pub const PHASE_LOG_INTERVAL: Duration = Duration::from_secs(30);
/// Waiting longer than this names the workers that did not report yet.
pub const PHASE_LOG_VERBOSE_DELAY: Duration = Duration::from_secs(300);
/// Upper bound for the run progress log cadence.
pub const RUN_PHASE_LOG_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PERFORMANCE_MONITOR_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timing knobs for runners of a suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    pub phase_log_interval: Duration,
    pub phase_log_verbose_delay: Duration,
    /// Interval at which run progress lines carry performance numbers.
    /// Zero disables them.
    pub performance_monitor_interval: Duration,
    pub response_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            phase_log_interval: PHASE_LOG_INTERVAL,
            phase_log_verbose_delay: PHASE_LOG_VERBOSE_DELAY,
            performance_monitor_interval: DEFAULT_PERFORMANCE_MONITOR_INTERVAL,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl CoordinatorSettings {
    /// Progress cadence during warmup and run: the performance interval
    /// capped at [`RUN_PHASE_LOG_INTERVAL`].
    #[must_use]
    pub fn run_log_interval(&self) -> Duration {
        if self.performance_monitor_interval.is_zero() {
            RUN_PHASE_LOG_INTERVAL
        } else {
            self.performance_monitor_interval.min(RUN_PHASE_LOG_INTERVAL)
        }
    }
}
