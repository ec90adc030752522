use thiserror::Error;

use crate::protocol::SimulatorAddress;
use crate::registry::TargetType;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No {target} workers available ({registered} worker(s) registered).")]
    InsufficientWorkers {
        target: TargetType,
        registered: usize,
    },
    #[error("Agent {address} is not registered.")]
    UnknownAgent { address: SimulatorAddress },
    #[error("Address {address} is not a {expected} address.")]
    WrongLevel {
        address: SimulatorAddress,
        expected: &'static str,
    },
    #[error("Test id '{test_id}' is already registered.")]
    DuplicateTestId { test_id: String },
}
