//! In-process stand-in for agents and workers.
//!
//! [`LocalCluster`] talks to the coordinator through a [`LoopbackConnector`]
//! over an in-memory byte stream, so every operation crosses the same
//! framing a remote deployment uses. Test case properties steer the
//! simulated workers (see [`FAIL_ON_PHASE`], [`STALL_ON_PHASE`],
//! [`RUN_FOR`], [`PHASE_DELAY`]).
mod transport;
mod worker;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AppResult, ProtocolError};
use crate::protocol::{
    AddressLevel, Connector, Frame, Operation, PendingResponses, Response, ResponseType,
    SimulatorAddress, SimulatorMessage, read_frame,
};
use crate::registry::{AgentData, ComponentRegistry, WorkerData, WorkerKind};

pub use transport::LoopbackConnector;
pub use worker::{FAIL_ON_PHASE, FAILURE_TYPE, PHASE_DELAY, RUN_FOR, STALL_ON_PHASE, THROUGHPUT};

use transport::{is_recoverable, spawn_writer};
use worker::{SimulatedWorker, Uplink};

const STREAM_BUFFER_BYTES: usize = 64 * 1024;

/// Size and pacing of a simulated cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterShape {
    pub agents: usize,
    pub members_per_agent: usize,
    pub clients_per_agent: usize,
    /// Time a simulated worker spends in a non-duration phase.
    pub phase_delay: Duration,
    /// Interval of performance reports while a test runs.
    pub stats_interval: Duration,
}

impl Default for ClusterShape {
    fn default() -> Self {
        Self {
            agents: 1,
            members_per_agent: 1,
            clients_per_agent: 0,
            phase_delay: Duration::from_millis(50),
            stats_interval: Duration::from_secs(1),
        }
    }
}

/// Simulated agents and workers answering coordinator operations.
pub struct LocalCluster {
    connector: Arc<LoopbackConnector>,
    workers: Arc<Vec<Arc<SimulatedWorker>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    /// Starts the cluster on the current tokio runtime and registers its
    /// agents and workers in `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error when registering a worker fails.
    pub fn start(registry: &ComponentRegistry, shape: ClusterShape) -> AppResult<Self> {
        let (coordinator_end, cluster_end) = tokio::io::duplex(STREAM_BUFFER_BYTES);
        let (coordinator_read, coordinator_write) = tokio::io::split(coordinator_end);
        let (cluster_read, cluster_write) = tokio::io::split(cluster_end);

        let (connector, mut tasks) = LoopbackConnector::spawn(coordinator_read, coordinator_write);

        let (outbox, frames) = mpsc::unbounded_channel();
        tasks.push(spawn_writer(cluster_write, frames));
        let pending = Arc::new(PendingResponses::new());
        let uplink = Uplink::new(outbox.clone(), Arc::clone(&pending));

        let mut workers = Vec::new();
        for agent_index in 1..=to_index(shape.agents) {
            let agent = AgentData::new(agent_index, format!("127.0.0.{}", agent_index));
            let host = agent.public_address.clone();
            registry.add_agent(agent);
            let kinds = std::iter::repeat_n(WorkerKind::Member, shape.members_per_agent)
                .chain(std::iter::repeat_n(WorkerKind::Client, shape.clients_per_agent));
            for (worker_index, kind) in (1..).zip(kinds) {
                let address = SimulatorAddress::worker(agent_index, worker_index);
                registry.add_worker(WorkerData::new(address, kind, host.clone()))?;
                workers.push(Arc::new(SimulatedWorker::new(
                    address,
                    kind,
                    uplink.clone(),
                    shape.clone(),
                )));
            }
        }
        info!(
            "Started local cluster: {} agent(s), {} worker(s)",
            shape.agents,
            workers.len()
        );

        let workers = Arc::new(workers);
        let dispatcher = Dispatcher {
            agents: (1..=to_index(shape.agents)).map(SimulatorAddress::agent).collect(),
            workers: Arc::clone(&workers),
            pending,
            outbox,
        };
        tasks.push(tokio::spawn(dispatcher.read_loop(cluster_read)));

        Ok(Self {
            connector,
            workers,
            tasks,
        })
    }

    #[must_use]
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector) as Arc<dyn Connector>
    }

    #[must_use]
    pub fn worker_addresses(&self) -> Vec<(SimulatorAddress, WorkerKind)> {
        self.workers
            .iter()
            .map(|worker| (worker.address(), worker.kind()))
            .collect()
    }

    /// Stops every background task of the cluster.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        debug!("Local cluster shut down");
    }
}

fn to_index(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Cluster end of the stream: routes coordinator messages to agents,
/// workers and test instances.
struct Dispatcher {
    agents: Vec<SimulatorAddress>,
    workers: Arc<Vec<Arc<SimulatedWorker>>>,
    pending: Arc<PendingResponses>,
    outbox: mpsc::UnboundedSender<Frame>,
}

impl Dispatcher {
    async fn read_loop<R>(self, mut reader: R)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        loop {
            match read_frame(&mut reader).await {
                Ok(Frame::Message(message)) => {
                    let response = self.dispatch(message);
                    if self.outbox.send(Frame::Response(response)).is_err() {
                        break;
                    }
                }
                Ok(Frame::Response(response)) => {
                    self.pending.complete(response);
                }
                Err(ProtocolError::ConnectionClosed) => break,
                Err(err) if is_recoverable(&err) => {
                    warn!("Dropped undecodable frame from coordinator: {}", err);
                }
                Err(err) => {
                    warn!("Closing coordinator stream: {}", err);
                    break;
                }
            }
        }
    }

    fn dispatch(&self, message: SimulatorMessage) -> Response {
        let SimulatorMessage {
            message_id,
            source,
            destination,
            operation,
        } = message;
        let mut response = Response::new(message_id, source);
        match destination.level() {
            AddressLevel::Coordinator => {
                response.add_part(destination, ResponseType::FailureCoordinatorNotFound);
            }
            AddressLevel::Agent => {
                let agents: Vec<_> = self
                    .agents
                    .iter()
                    .filter(|agent| destination.covers(agent))
                    .collect();
                if agents.is_empty() && !destination.contains_wildcard() {
                    response.add_part(destination, ResponseType::FailureAgentNotFound);
                }
                for agent in agents {
                    response.add_part(*agent, agent_operation(*agent, &operation));
                }
            }
            AddressLevel::Worker | AddressLevel::Test => {
                let worker_prefix = match destination.level() {
                    AddressLevel::Test => destination.parent().unwrap_or(destination),
                    _ => destination,
                };
                let workers: Vec<_> = self
                    .workers
                    .iter()
                    .filter(|worker| worker.is_alive())
                    .filter(|worker| worker_prefix.covers(&worker.address()))
                    .collect();
                if workers.is_empty() && !destination.contains_wildcard() {
                    response.add_part(destination, ResponseType::FailureWorkerNotFound);
                }
                for worker in workers {
                    let part = if destination.level() == AddressLevel::Worker {
                        worker.handle_worker_operation(operation.clone())
                    } else {
                        worker.handle_test_operation(destination.test_index(), operation.clone())
                    };
                    response.add_part(worker.address(), part);
                }
            }
        }
        response
    }
}

fn agent_operation(agent: SimulatorAddress, operation: &Operation) -> ResponseType {
    match operation {
        Operation::Log(log) => {
            debug!("[{}] {}", agent, log.message);
            ResponseType::Success
        }
        Operation::ExecuteScript(script) => {
            info!("{} would execute '{}'", agent, script.command);
            ResponseType::Success
        }
        Operation::CreateTest(_)
        | Operation::StartTest(_)
        | Operation::StartTestPhase(_)
        | Operation::StopTest(_)
        | Operation::PhaseCompleted(_)
        | Operation::Failure(_)
        | Operation::PerformanceStats(_) => ResponseType::UnsupportedOperationOnThisProcessor,
    }
}
