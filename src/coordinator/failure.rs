use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};

use crate::protocol::{FailureOperation, FailureType, SimulatorAddress};

/// One recorded failure report.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub test_id: Option<String>,
    pub worker_address: SimulatorAddress,
    pub failure_type: FailureType,
    pub message: String,
    pub cause: Option<String>,
    pub critical: bool,
    pub reported_at: DateTime<Local>,
}

#[derive(Debug, Default)]
struct FailureLog {
    all: Vec<FailureRecord>,
    per_test: HashMap<String, Vec<FailureRecord>>,
    critical_per_test: HashMap<String, usize>,
    critical_total: usize,
}

/// Per-test and suite-wide failure log.
///
/// [`FailureCollector::report`] records under a lock before it returns, so a
/// poll that starts after a report call returned always observes it.
#[derive(Debug)]
pub struct FailureCollector {
    non_critical: Mutex<BTreeSet<FailureType>>,
    log: Mutex<FailureLog>,
}

impl Default for FailureCollector {
    fn default() -> Self {
        Self::new(BTreeSet::from([FailureType::WorkerFinished]))
    }
}

impl FailureCollector {
    #[must_use]
    pub fn new(non_critical: BTreeSet<FailureType>) -> Self {
        Self {
            non_critical: Mutex::new(non_critical),
            log: Mutex::new(FailureLog::default()),
        }
    }

    /// Replaces the set of failure types that never abort a test. Applies to
    /// reports made afterwards.
    pub fn set_non_critical(&self, non_critical: BTreeSet<FailureType>) {
        *self
            .non_critical
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = non_critical;
    }

    #[must_use]
    pub fn is_critical(&self, failure_type: FailureType) -> bool {
        !self
            .non_critical
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&failure_type)
    }

    /// Records a failure and returns the stored record.
    pub fn report(&self, failure: FailureOperation) -> FailureRecord {
        let record = FailureRecord {
            critical: self.is_critical(failure.failure_type),
            test_id: failure.test_id,
            worker_address: failure.worker_address,
            failure_type: failure.failure_type,
            message: failure.message,
            cause: failure.cause,
            reported_at: Local::now(),
        };

        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(test_id) = &record.test_id {
            log.per_test
                .entry(test_id.clone())
                .or_default()
                .push(record.clone());
            if record.critical {
                let count = log.critical_per_test.entry(test_id.clone()).or_insert(0);
                *count = count.saturating_add(1);
            }
        }
        if record.critical {
            log.critical_total = log.critical_total.saturating_add(1);
        }
        log.all.push(record.clone());
        drop(log);
        record
    }

    #[must_use]
    pub fn has_critical_failure_for(&self, test_id: &str) -> bool {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .critical_per_test
            .contains_key(test_id)
    }

    /// Whether any critical failure was recorded, for any test or none.
    #[must_use]
    pub fn has_critical_failure(&self) -> bool {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .critical_total
            > 0
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).all.len()
    }

    #[must_use]
    pub fn critical_failure_count(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .critical_total
    }

    /// Forgets every recorded failure. The non-critical set is kept.
    pub fn clear(&self) {
        *self.log.lock().unwrap_or_else(PoisonError::into_inner) = FailureLog::default();
    }

    #[must_use]
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .all
            .clone()
    }

    #[must_use]
    pub fn failures_for(&self, test_id: &str) -> Vec<FailureRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .per_test
            .get(test_id)
            .cloned()
            .unwrap_or_default()
    }
}
