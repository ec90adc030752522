use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::protocol::{
    Connector, Frame, Operation, OperationProcessor, PendingResponses, Response, ResponseFuture,
    ResponseType, SimulatorAddress, SimulatorMessage, read_frame, write_message, write_response,
};

/// Queue of frames waiting for the writer task of one stream end.
pub(super) type Outbox = mpsc::UnboundedSender<Frame>;

/// Drains `frames` into `writer` until the queue closes or a write fails.
pub(super) fn spawn_writer<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Frame>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let written = match &frame {
                Frame::Message(message) => write_message(&mut writer, message).await,
                Frame::Response(response) => write_response(&mut writer, response).await,
            };
            if let Err(err) = written {
                warn!("Stopping frame writer: {}", err);
                break;
            }
        }
    })
}

/// Whether the stream can still be read after `err`. Decode errors only
/// spoil one frame; I/O errors and a lost frame boundary end the stream.
pub(super) const fn is_recoverable(err: &ProtocolError) -> bool {
    matches!(
        err,
        ProtocolError::UnknownOperationKind { .. }
            | ProtocolError::UnknownResponseType { .. }
            | ProtocolError::InvalidAddressLevel { .. }
            | ProtocolError::MalformedBody { .. }
            | ProtocolError::TruncatedPayload { .. }
    )
}

/// Coordinator end of an in-process stream to the simulated cluster.
pub struct LoopbackConnector {
    pending: PendingResponses,
    processor: RwLock<Option<Arc<dyn OperationProcessor>>>,
    outbox: Outbox,
}

impl LoopbackConnector {
    /// Creates the connector and spawns its reader and writer tasks on the
    /// current runtime.
    pub(super) fn spawn<R, W>(reader: R, writer: W) -> (Arc<Self>, Vec<JoinHandle<()>>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, frames) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            pending: PendingResponses::new(),
            processor: RwLock::new(None),
            outbox,
        });
        let writer_handle = spawn_writer(writer, frames);
        let reader_handle = tokio::spawn(Arc::clone(&connector).read_loop(reader));
        (connector, vec![writer_handle, reader_handle])
    }

    fn processor(&self) -> Option<Arc<dyn OperationProcessor>> {
        self.processor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    async fn read_loop<R>(self: Arc<Self>, mut reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        loop {
            match read_frame(&mut reader).await {
                Ok(Frame::Response(response)) => {
                    let message_id = response.message_id;
                    if !self.pending.complete(response) {
                        debug!("Nobody waits for response {} anymore", message_id);
                    }
                }
                Ok(Frame::Message(message)) => {
                    let connector = Arc::clone(&self);
                    tokio::spawn(async move { connector.handle_inbound(message).await });
                }
                Err(ProtocolError::ConnectionClosed) => break,
                Err(err) if is_recoverable(&err) => {
                    warn!("Dropped undecodable frame from cluster: {}", err);
                }
                Err(err) => {
                    warn!("Closing cluster stream: {}", err);
                    break;
                }
            }
        }
    }

    async fn handle_inbound(&self, message: SimulatorMessage) {
        let response_type = match self.processor() {
            Some(processor) => processor.process(message.operation, message.source).await,
            None => ResponseType::FailureCoordinatorNotFound,
        };
        let response = Response::single(
            message.message_id,
            message.source,
            SimulatorAddress::COORDINATOR,
            response_type,
        );
        if self.outbox.send(Frame::Response(response)).is_err() {
            debug!("Cluster stream closed before response could be sent");
        }
    }
}

impl Connector for LoopbackConnector {
    fn local_address(&self) -> SimulatorAddress {
        SimulatorAddress::COORDINATOR
    }

    fn invoke(&self, destination: SimulatorAddress, operation: Operation) -> ResponseFuture {
        let future = self.pending.register();
        let message = SimulatorMessage {
            message_id: future.message_id(),
            source: SimulatorAddress::COORDINATOR,
            destination,
            operation,
        };
        if self.outbox.send(Frame::Message(message)).is_err() {
            warn!("Cluster stream closed, cannot reach {}", destination);
            self.pending.cancel(future.message_id());
        }
        future
    }

    fn cancel(&self, message_id: u64) {
        self.pending.cancel(message_id);
    }

    fn register_processor(&self, processor: Arc<dyn OperationProcessor>) {
        *self
            .processor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(processor);
    }
}
