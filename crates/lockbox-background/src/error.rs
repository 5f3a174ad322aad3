use lockbox_proto::{PortError, PortId, ProtocolError};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("background hub has stopped")]
    HubStopped,
    #[error("invalid redirect signature: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<BusError> for PortError {
    fn from(error: BusError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Failure to hand a message to one registered port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("port {0} is not registered")]
    UnknownPort(PortId),
    #[error("port {0} went away")]
    PortGone(PortId),
    #[error("port unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<PortError> for DeliveryError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Closed(port) => Self::PortGone(port),
            PortError::Protocol(error) => Self::Protocol(error),
            PortError::Unavailable(message) => Self::Unavailable(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
