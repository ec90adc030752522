use std::collections::BTreeMap;
use std::fmt;

use super::{Operation, SimulatorAddress};

/// Request envelope: an operation routed from `source` to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorMessage {
    pub message_id: u64,
    pub source: SimulatorAddress,
    pub destination: SimulatorAddress,
    pub operation: Operation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Success,
    UnsupportedOperationOnThisProcessor,
    ExceptionDuringOperationExecution,
    FailureCoordinatorNotFound,
    FailureAgentNotFound,
    FailureWorkerNotFound,
    FailureTestNotFound,
}

impl ResponseType {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Success => 0,
            Self::UnsupportedOperationOnThisProcessor => 1,
            Self::ExceptionDuringOperationExecution => 2,
            Self::FailureCoordinatorNotFound => 3,
            Self::FailureAgentNotFound => 4,
            Self::FailureWorkerNotFound => 5,
            Self::FailureTestNotFound => 6,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::UnsupportedOperationOnThisProcessor),
            2 => Some(Self::ExceptionDuringOperationExecution),
            3 => Some(Self::FailureCoordinatorNotFound),
            4 => Some(Self::FailureAgentNotFound),
            5 => Some(Self::FailureWorkerNotFound),
            6 => Some(Self::FailureTestNotFound),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::UnsupportedOperationOnThisProcessor => "unsupported operation on this processor",
            Self::ExceptionDuringOperationExecution => "exception during operation execution",
            Self::FailureCoordinatorNotFound => "coordinator not found",
            Self::FailureAgentNotFound => "agent not found",
            Self::FailureWorkerNotFound => "worker not found",
            Self::FailureTestNotFound => "test not found",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply to a [`SimulatorMessage`], carrying one result per participant the
/// message reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message_id: u64,
    pub destination: SimulatorAddress,
    parts: BTreeMap<SimulatorAddress, ResponseType>,
}

impl Response {
    #[must_use]
    pub const fn new(message_id: u64, destination: SimulatorAddress) -> Self {
        Self {
            message_id,
            destination,
            parts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn single(
        message_id: u64,
        destination: SimulatorAddress,
        source: SimulatorAddress,
        response_type: ResponseType,
    ) -> Self {
        let mut response = Self::new(message_id, destination);
        response.add_part(source, response_type);
        response
    }

    pub fn add_part(&mut self, source: SimulatorAddress, response_type: ResponseType) {
        self.parts.insert(source, response_type);
    }

    pub fn merge(&mut self, other: Self) {
        self.parts.extend(other.parts);
    }

    pub fn parts(&self) -> impl Iterator<Item = (&SimulatorAddress, &ResponseType)> {
        self.parts.iter()
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// First part that is not [`ResponseType::Success`], if any.
    #[must_use]
    pub fn first_error(&self) -> Option<(SimulatorAddress, ResponseType)> {
        self.parts
            .iter()
            .find(|(_, response_type)| **response_type != ResponseType::Success)
            .map(|(address, response_type)| (*address, *response_type))
    }
}
