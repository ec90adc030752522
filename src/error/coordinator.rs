use thiserror::Error;

use crate::protocol::{OperationType, ResponseType, SimulatorAddress, TestPhase};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{operation} on {address} failed with {response}.")]
    UnexpectedResponse {
        operation: OperationType,
        address: SimulatorAddress,
        response: ResponseType,
    },
    #[error("Response for message {message_id} was dropped by the connector.")]
    ResponseDropped { message_id: u64 },
    #[error("Timed out after {timeout_ms}ms waiting for response to message {message_id}.")]
    ResponseTimeout { message_id: u64, timeout_ms: u128 },
    #[error("Connector is shut down.")]
    ConnectorClosed,
    #[error("Runner for test '{test_id}' did not complete: {source}")]
    RunnerJoin {
        test_id: String,
        #[source]
        source: tokio::task::JoinError,
    },
    #[error("Completion channel for test '{test_id}' is already registered.")]
    DuplicateCompletionChannel { test_id: String },
    #[error("Phase {phase} is not bound to a duration.")]
    NotADurationPhase { phase: TestPhase },
    #[error("{failed} of {total} test(s) failed.")]
    SuiteFailed { failed: usize, total: usize },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
