use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{AppError, AppResult, CoordinatorError, RegistryError};
use crate::protocol::{
    Connector, LogLevel, LogOperation, Operation, OperationType, Response, ResponseFuture,
    SimulatorAddress,
};
use crate::registry::{ComponentRegistry, TargetType};

/// Intention-level calls from the coordinator into the worker tree.
#[derive(Clone)]
pub struct RemoteClient {
    connector: Arc<dyn Connector>,
    registry: Arc<ComponentRegistry>,
    response_timeout: Duration,
}

impl RemoteClient {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        registry: Arc<ComponentRegistry>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            registry,
            response_timeout,
        }
    }

    /// Sends `operation` to every worker and waits for all of them.
    ///
    /// # Errors
    ///
    /// Returns an error when a worker answers with anything but success or
    /// no answer arrives in time.
    pub async fn invoke_on_all_workers(&self, operation: Operation) -> AppResult<()> {
        let operation_type = operation.operation_type();
        let future = self
            .connector
            .invoke_broadcast(SimulatorAddress::ALL_WORKERS, operation);
        self.await_success(future, operation_type, SimulatorAddress::ALL_WORKERS)
            .await
    }

    /// Sends `operation` to the test instance on the first registered worker.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InsufficientWorkers`] without workers, and
    /// the same response errors as [`RemoteClient::invoke_on_all_workers`].
    pub async fn invoke_on_test_on_first_worker(
        &self,
        test_index: i32,
        operation: Operation,
    ) -> AppResult<()> {
        let worker = self
            .registry
            .first_worker()
            .ok_or(RegistryError::InsufficientWorkers {
                target: TargetType::All,
                registered: 0,
            })?;
        let destination = worker.address.child(test_index)?;
        let operation_type = operation.operation_type();
        let future = self.connector.invoke(destination, operation);
        self.await_success(future, operation_type, destination)
            .await
    }

    /// Sends `operation` to the test instance on every worker.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteClient::invoke_on_all_workers`].
    pub async fn invoke_on_test_on_all_workers(
        &self,
        test_index: i32,
        operation: Operation,
    ) -> AppResult<()> {
        let destination = SimulatorAddress::ALL_WORKERS.child(test_index)?;
        let operation_type = operation.operation_type();
        let future = self.connector.invoke_broadcast(destination, operation);
        self.await_success(future, operation_type, destination)
            .await
    }

    /// Mirrors a log line on every agent without waiting.
    pub fn log_on_all_agents(&self, message: impl Into<String>) {
        self.connector.submit(
            SimulatorAddress::ALL_AGENTS,
            Operation::Log(LogOperation {
                message: message.into(),
                level: LogLevel::Info,
            }),
        );
    }

    async fn await_success(
        &self,
        future: ResponseFuture,
        operation: OperationType,
        destination: SimulatorAddress,
    ) -> AppResult<()> {
        let message_id = future.message_id();
        let response = match future.wait_timeout(self.response_timeout).await {
            Ok(response) => response,
            Err(err) => {
                self.connector.cancel(message_id);
                return Err(AppError::coordinator(err));
            }
        };
        check_response(&response, operation)?;
        debug!(
            "{} on {} answered by {} participant(s)",
            operation,
            destination,
            response.part_count()
        );
        Ok(())
    }
}

fn check_response(
    response: &Response,
    operation: OperationType,
) -> Result<(), CoordinatorError> {
    match response.first_error() {
        Some((address, response)) => Err(CoordinatorError::UnexpectedResponse {
            operation,
            address,
            response,
        }),
        None => Ok(()),
    }
}
