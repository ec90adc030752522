mod address;
mod app;
mod config;
mod coordinator;
mod protocol;
mod registry;

#[cfg(test)]
mod test_support;

pub use address::{AddressError, InvalidAddressReason};
pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use coordinator::CoordinatorError;
pub use protocol::ProtocolError;
pub use registry::RegistryError;
