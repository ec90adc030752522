use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{FailureType, TestPhase};
use crate::registry::TargetType;

/// One configured execution of a named test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: String,
    pub properties: BTreeMap<String, String>,
}

impl TestCase {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Run configuration shared by every test case of a suite run.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub test_cases: Vec<Arc<TestCase>>,
    /// Length of the run phase. Zero means the test decides when it is done.
    pub duration: Duration,
    /// Length of the warmup phase. Zero skips the warmup phases entirely.
    pub warmup: Duration,
    /// Let the test end the run (and warmup) phase on its own.
    pub wait_for_test_case: bool,
    pub verify_enabled: bool,
    pub fail_fast: bool,
    pub parallel: bool,
    pub target_type: TargetType,
    /// Number of workers that drive load; `0` means all matching workers.
    pub target_count: i32,
    /// Last phase aligned across tests by the phase barrier; `None` aligns
    /// every phase.
    pub sync_to_phase: Option<TestPhase>,
    /// Failure types that are recorded but never abort a test.
    pub non_critical_failures: BTreeSet<FailureType>,
}

impl Default for TestSuite {
    fn default() -> Self {
        Self {
            test_cases: Vec::new(),
            duration: Duration::from_secs(60),
            warmup: Duration::ZERO,
            wait_for_test_case: false,
            verify_enabled: true,
            fail_fast: true,
            parallel: true,
            target_type: TargetType::PreferClients,
            target_count: 0,
            sync_to_phase: None,
            non_critical_failures: BTreeSet::from([FailureType::WorkerFinished]),
        }
    }
}

impl TestSuite {
    #[must_use]
    pub fn with_tests<I>(test_cases: I) -> Self
    where
        I: IntoIterator<Item = TestCase>,
    {
        Self {
            test_cases: test_cases.into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn test_count(&self) -> usize {
        self.test_cases.len()
    }

    #[must_use]
    pub fn max_test_case_id_len(&self) -> usize {
        self.test_cases
            .iter()
            .map(|test_case| test_case.id.len())
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_warmup_enabled(&self) -> bool {
        !self.warmup.is_zero()
    }

    /// Phases this suite executes, in order. Warmup phases are present only
    /// with a non-zero warmup, verify phases only with verification enabled.
    #[must_use]
    pub fn phases(&self) -> Vec<TestPhase> {
        TestPhase::ALL
            .into_iter()
            .filter(|phase| self.executes(*phase))
            .collect()
    }

    #[must_use]
    pub fn executes(&self, phase: TestPhase) -> bool {
        if phase.is_warmup_related() && !self.is_warmup_enabled() {
            return false;
        }
        if phase.is_verify() && !self.verify_enabled {
            return false;
        }
        true
    }

    /// Next executed phase after `phase`, following the phase order and
    /// skipping disabled phases.
    #[must_use]
    pub fn next_phase(&self, phase: TestPhase) -> Option<TestPhase> {
        let mut next = phase.next();
        while let Some(candidate) = next {
            if self.executes(candidate) {
                return Some(candidate);
            }
            next = candidate.next();
        }
        None
    }

    #[must_use]
    pub fn is_synced(&self, phase: TestPhase) -> bool {
        self.sync_to_phase.is_none_or(|last| phase <= last)
    }
}
