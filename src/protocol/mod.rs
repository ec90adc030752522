//! Addressing, operations and wire framing shared by every participant.
mod address;
pub mod codec;
mod connector;
mod io;
mod message;
mod operation;
mod phase;

#[cfg(test)]
mod tests;

pub use address::{ALL_INDEX, AddressLevel, SimulatorAddress};
pub use connector::{Connector, OperationProcessor, PendingResponses, ResponseFuture};
pub use io::{Frame, read_frame, write_message, write_response};
pub use message::{Response, ResponseType, SimulatorMessage};
pub use operation::{
    CreateTestOperation, ExecuteScriptOperation, FailureOperation, FailureType, LogLevel,
    LogOperation, Operation, OperationType, PerformanceStats, PerformanceStatsOperation,
    PhaseCompletedOperation, StartTestOperation, StartTestPhaseOperation, StopTestOperation,
};
pub use phase::{PhaseScope, TestPhase};
