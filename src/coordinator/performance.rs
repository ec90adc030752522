use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::protocol::{PerformanceStats, PerformanceStatsOperation, SimulatorAddress};

use super::format::{format_count, format_rate};

/// Latest performance numbers per test and reporting worker.
#[derive(Debug, Default)]
pub struct PerformanceStatsCollector {
    latest: Mutex<HashMap<String, HashMap<SimulatorAddress, PerformanceStats>>>,
}

impl PerformanceStatsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, worker: SimulatorAddress, operation: PerformanceStatsOperation) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        for (test_id, stats) in operation.stats {
            latest.entry(test_id).or_default().insert(worker, stats);
        }
    }

    /// Sum over workers of the latest numbers for `test_id`; the latency is
    /// the maximum.
    #[must_use]
    pub fn aggregate(&self, test_id: &str) -> Option<PerformanceStats> {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let per_worker = latest.get(test_id)?;
        if per_worker.is_empty() {
            return None;
        }
        Some(
            per_worker
                .values()
                .fold(PerformanceStats::default(), |acc, stats| PerformanceStats {
                    operation_count: acc.operation_count.saturating_add(stats.operation_count),
                    interval_operation_count: acc
                        .interval_operation_count
                        .saturating_add(stats.interval_operation_count),
                    interval_throughput: acc.interval_throughput + stats.interval_throughput,
                    interval_latency_max_nanos: acc
                        .interval_latency_max_nanos
                        .max(stats.interval_latency_max_nanos),
                }),
        )
    }

    /// Suffix for progress lines, e.g. ` (12,345 ops, 2,000.00 ops/s)`.
    #[must_use]
    pub fn format_performance_numbers(&self, test_id: &str) -> String {
        match self.aggregate(test_id) {
            Some(stats) if stats.operation_count > 0 => format!(
                " ({} ops, {} ops/s)",
                format_count(stats.operation_count),
                format_rate(stats.interval_throughput)
            ),
            Some(_) => " (no operations)".to_owned(),
            None => " (performance not available)".to_owned(),
        }
    }

    pub fn clear(&self) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
