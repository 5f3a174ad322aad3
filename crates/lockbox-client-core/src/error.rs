use lockbox_proto::{PortError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("no port to the background is attached")]
    NotConnected,
    #[error("a port to the background is already attached")]
    AlreadyConnected,
    #[error("background port closed")]
    Disconnected,
    #[error("no ack for request {request_id} within {timeout_ms}ms")]
    AckTimeout { request_id: String, timeout_ms: u64 },
    #[error("replica did not reach the expected state within {timeout_ms}ms")]
    WaitTimeout { timeout_ms: u64 },
    #[error("failed to connect to background: {0}")]
    Connect(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<PortError> for RelayError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Closed(_) => Self::Disconnected,
            PortError::Unavailable(message) => Self::Connect(message),
            PortError::Protocol(error) => Self::Protocol(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
