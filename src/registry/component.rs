use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::TestSuite;
use crate::error::RegistryError;
use crate::protocol::{ALL_INDEX, AddressLevel, SimulatorAddress};

use super::{TargetType, TestData};

/// Role of a worker in the system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Member,
    Client,
}

impl WorkerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Client => "client",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentData {
    pub address: SimulatorAddress,
    pub public_address: String,
    pub private_address: String,
}

impl AgentData {
    #[must_use]
    pub fn new(agent_index: i32, public_address: impl Into<String>) -> Self {
        let public_address = public_address.into();
        Self {
            address: SimulatorAddress::agent(agent_index),
            private_address: public_address.clone(),
            public_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerData {
    pub address: SimulatorAddress,
    pub kind: WorkerKind,
    pub host: String,
}

impl WorkerData {
    #[must_use]
    pub fn new(address: SimulatorAddress, kind: WorkerKind, host: impl Into<String>) -> Self {
        Self {
            address,
            kind,
            host: host.into(),
        }
    }

    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self.kind, WorkerKind::Member)
    }
}

/// Shared inventory of agents, workers and tests.
///
/// Readers get an immutable snapshot; writers replace the snapshot, so a
/// reader never observes a half-applied update.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    agents: RwLock<Arc<Vec<AgentData>>>,
    workers: RwLock<Arc<Vec<WorkerData>>>,
    tests: RwLock<Arc<Vec<Arc<TestData>>>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent. Returns `false` when an agent with the same address is
    /// already registered.
    pub fn add_agent(&self, agent: AgentData) -> bool {
        let added = update(&self.agents, |agents| {
            if agents.iter().any(|known| known.address == agent.address) {
                return false;
            }
            agents.push(agent.clone());
            true
        });
        if added {
            debug!("Registered agent {} ({})", agent.address, agent.public_address);
        }
        added
    }

    /// Removes an agent together with its workers. Returns `false` for an
    /// unknown agent.
    pub fn remove_agent(&self, address: SimulatorAddress) -> bool {
        let removed = update(&self.agents, |agents| {
            let before = agents.len();
            agents.retain(|agent| agent.address != address);
            agents.len() != before
        });
        if removed {
            update(&self.workers, |workers| {
                workers.retain(|worker| !address.is_parent_of(&worker.address));
            });
            info!("Removed agent {}", address);
        }
        removed
    }

    /// Adds a worker below a registered agent. Adding a known address is a
    /// no-op that returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::WrongLevel`] for a non-worker address and
    /// [`RegistryError::UnknownAgent`] when the parent agent is missing.
    pub fn add_worker(&self, worker: WorkerData) -> Result<bool, RegistryError> {
        if worker.address.level() != AddressLevel::Worker || worker.address.contains_wildcard() {
            return Err(RegistryError::WrongLevel {
                address: worker.address,
                expected: AddressLevel::Worker.as_str(),
            });
        }
        let agent = worker
            .address
            .parent()
            .unwrap_or(SimulatorAddress::COORDINATOR);
        if !self.agents().iter().any(|known| known.address == agent) {
            return Err(RegistryError::UnknownAgent { address: agent });
        }
        let added = update(&self.workers, |workers| {
            if workers.iter().any(|known| known.address == worker.address) {
                return false;
            }
            workers.push(worker.clone());
            true
        });
        if added {
            debug!(
                "Registered {} worker {} on {}",
                worker.kind.as_str(),
                worker.address,
                worker.host
            );
        }
        Ok(added)
    }

    /// Removes a worker. Returns `false` for an unknown address.
    pub fn remove_worker(&self, address: SimulatorAddress) -> bool {
        let removed = update(&self.workers, |workers| {
            let before = workers.len();
            workers.retain(|worker| worker.address != address);
            workers.len() != before
        });
        if removed {
            info!("Removed worker {}", address);
        }
        removed
    }

    #[must_use]
    pub fn agents(&self) -> Arc<Vec<AgentData>> {
        snapshot(&self.agents)
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents().len()
    }

    #[must_use]
    pub fn workers(&self) -> Arc<Vec<WorkerData>> {
        snapshot(&self.workers)
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers().len()
    }

    /// First worker in registration order.
    #[must_use]
    pub fn first_worker(&self) -> Option<WorkerData> {
        self.workers().first().cloned()
    }

    #[must_use]
    pub fn has_client_workers(&self) -> bool {
        self.workers().iter().any(|worker| !worker.is_member())
    }

    /// Resolves [`TargetType::PreferClients`] against the current workers.
    #[must_use]
    pub fn resolve_target_type(&self, target_type: TargetType) -> TargetType {
        target_type.resolve_prefer_clients(self.has_client_workers())
    }

    /// Workers that match `target_type`, in registration order. A `count` of
    /// zero or less, or one that reaches the number of matching workers,
    /// selects all of them; otherwise the first `count` are returned.
    #[must_use]
    pub fn select_workers(&self, target_type: TargetType, count: i32) -> Vec<WorkerData> {
        let workers = self.workers();
        let has_clients = workers.iter().any(|worker| !worker.is_member());
        let target_type = target_type.resolve_prefer_clients(has_clients);
        let matching = workers
            .iter()
            .filter(|worker| target_type.matches(worker.kind));
        match usize::try_from(count) {
            Ok(limit) if limit > 0 => matching.take(limit).cloned().collect(),
            _ => matching.cloned().collect(),
        }
    }

    /// Like [`ComponentRegistry::select_workers`], but an empty selection is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InsufficientWorkers`] when no worker matches.
    pub fn select_workers_required(
        &self,
        target_type: TargetType,
        count: i32,
    ) -> Result<Vec<WorkerData>, RegistryError> {
        let selected = self.select_workers(target_type, count);
        if selected.is_empty() {
            return Err(RegistryError::InsufficientWorkers {
                target: target_type,
                registered: self.worker_count(),
            });
        }
        Ok(selected)
    }

    /// Registers one [`TestData`] per test case of `suite`, numbered from the
    /// next free test index. Returns the new entries in suite order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTestId`] when a test id is already
    /// registered or repeated within the suite; nothing is added then.
    pub fn add_tests(&self, suite: &Arc<TestSuite>) -> Result<Vec<Arc<TestData>>, RegistryError> {
        let mut guard = self.tests.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        let mut added = Vec::with_capacity(suite.test_count());
        let mut test_index = next
            .iter()
            .map(|test| test.test_index())
            .max()
            .unwrap_or(0);
        for test_case in &suite.test_cases {
            if next.iter().any(|test| test.id() == test_case.id) {
                return Err(RegistryError::DuplicateTestId {
                    test_id: test_case.id.clone(),
                });
            }
            test_index = test_index.saturating_add(1);
            let address = SimulatorAddress::test(ALL_INDEX, ALL_INDEX, test_index);
            let test = Arc::new(TestData::new(
                test_index,
                address,
                Arc::clone(test_case),
                Arc::clone(suite),
            ));
            next.push(Arc::clone(&test));
            added.push(test);
        }
        *guard = Arc::new(next);
        Ok(added)
    }

    #[must_use]
    pub fn tests(&self) -> Arc<Vec<Arc<TestData>>> {
        snapshot(&self.tests)
    }

    #[must_use]
    pub fn test(&self, test_id: &str) -> Option<Arc<TestData>> {
        self.tests().iter().find(|test| test.id() == test_id).cloned()
    }

    /// Drops every registered test, typically after a suite run finished.
    pub fn clear_tests(&self) {
        update(&self.tests, Vec::clear);
    }
}

fn snapshot<T>(lock: &RwLock<Arc<Vec<T>>>) -> Arc<Vec<T>> {
    Arc::clone(&lock.read().unwrap_or_else(PoisonError::into_inner))
}

fn update<T: Clone, R>(lock: &RwLock<Arc<Vec<T>>>, apply: impl FnOnce(&mut Vec<T>) -> R) -> R {
    let mut guard = lock.write().unwrap_or_else(PoisonError::into_inner);
    let mut next = (**guard).clone();
    let result = apply(&mut next);
    *guard = Arc::new(next);
    result
}
