//! Inventory of agents, workers and running tests.
mod component;
mod target;
mod test_data;


pub use component::{AgentData, ComponentRegistry, WorkerData, WorkerKind};
pub use target::TargetType;
pub use test_data::{CompletedStatus, TestData};
