use thiserror::Error;

use super::{
    AddressError, ConfigError, CoordinatorError, ProtocolError, RegistryError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn address<E>(error: E) -> Self
    where
        E: Into<AddressError>,
    {
        error.into().into()
    }

    pub fn protocol<E>(error: E) -> Self
    where
        E: Into<ProtocolError>,
    {
        error.into().into()
    }

    pub fn registry<E>(error: E) -> Self
    where
        E: Into<RegistryError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn coordinator<E>(error: E) -> Self
    where
        E: Into<CoordinatorError>,
    {
        error.into().into()
    }
}
