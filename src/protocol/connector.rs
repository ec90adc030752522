use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use crate::error::CoordinatorError;

use super::{Operation, Response, ResponseType, SimulatorAddress};

/// Handles operations addressed to one participant.
#[async_trait]
pub trait OperationProcessor: Send + Sync {
    async fn process(&self, operation: Operation, source: SimulatorAddress) -> ResponseType;
}

/// Sends operations into the participant tree and hands inbound operations to
/// a registered processor.
///
/// Implementations own routing and transport; callers only see addresses and
/// pending responses.
pub trait Connector: Send + Sync {
    fn local_address(&self) -> SimulatorAddress;

    /// Sends `operation` to `destination`. The returned future resolves once
    /// every participant reached by the destination has answered.
    fn invoke(&self, destination: SimulatorAddress, operation: Operation) -> ResponseFuture;

    /// Sends `operation` to every participant below a wildcard prefix such as
    /// [`SimulatorAddress::ALL_WORKERS`].
    fn invoke_broadcast(&self, prefix: SimulatorAddress, operation: Operation) -> ResponseFuture {
        self.invoke(prefix, operation)
    }

    /// Sends `operation` without waiting for the outcome.
    fn submit(&self, destination: SimulatorAddress, operation: Operation) {
        drop(self.invoke(destination, operation));
    }

    /// Forgets the pending response for `message_id`, typically after its
    /// caller stopped waiting. A response arriving later is discarded.
    fn cancel(&self, _message_id: u64) {}

    /// Registers the processor for operations addressed to
    /// [`Connector::local_address`]. A later registration replaces the
    /// earlier one.
    fn register_processor(&self, processor: Arc<dyn OperationProcessor>);
}

/// Pending response to an invoked operation.
#[derive(Debug)]
pub struct ResponseFuture {
    message_id: u64,
    receiver: oneshot::Receiver<Response>,
}

impl ResponseFuture {
    #[must_use]
    pub fn channel(message_id: u64) -> (oneshot::Sender<Response>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            sender,
            Self {
                message_id,
                receiver,
            },
        )
    }

    #[must_use]
    pub const fn message_id(&self) -> u64 {
        self.message_id
    }

    /// Waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ResponseDropped`] when the connector
    /// dropped the pending response without answering.
    pub async fn wait(self) -> Result<Response, CoordinatorError> {
        let message_id = self.message_id;
        self.receiver
            .await
            .map_err(|_closed| CoordinatorError::ResponseDropped { message_id })
    }

    /// Waits for the response for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ResponseTimeout`] when no response arrived
    /// in time and [`CoordinatorError::ResponseDropped`] as for
    /// [`ResponseFuture::wait`].
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Response, CoordinatorError> {
        let message_id = self.message_id;
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(CoordinatorError::ResponseTimeout {
                message_id,
                timeout_ms: timeout.as_millis(),
            }),
        }
    }
}

/// Message ids plus the table of responses still awaited by a connector.
#[derive(Debug, Default)]
pub struct PendingResponses {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
}

impl PendingResponses {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Allocates a message id and registers a pending response for it.
    pub fn register(&self) -> ResponseFuture {
        let message_id = self.next_message_id();
        let (sender, future) = ResponseFuture::channel(message_id);
        self.table().insert(message_id, sender);
        future
    }

    /// Resolves the pending response with the same message id. Returns
    /// `false` when nobody waits for it anymore.
    pub fn complete(&self, response: Response) -> bool {
        let sender = self.table().remove(&response.message_id);
        match sender {
            Some(sender) => sender.send(response).is_ok(),
            None => false,
        }
    }

    /// Forgets a pending response; its future resolves as dropped.
    pub fn cancel(&self, message_id: u64) {
        self.table().remove(&message_id);
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Response>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
