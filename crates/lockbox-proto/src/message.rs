//! Closed message envelope for the bus.

use lockbox_state::{Action, StateTree};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("bus message encode failed: {0}")]
    Encode(String),
    #[error("bus message decode failed: {0}")]
    Decode(String),
    #[error("{kind} is not valid {direction}")]
    WrongDirection {
        kind: &'static str,
        direction: &'static str,
    },
}

/// Every message that may cross a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusMessage {
    /// Bidirectional. `request_id` is only set by a UI relaying under the
    /// acknowledged delivery policy.
    Action {
        action: Action,
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Background to UI only.
    FullState { state: Box<StateTree> },
    /// UI to background, one-way.
    SearchEntriesForUrl { url: String },
    /// UI to background: ask for a full-state push to this port only.
    RequestFullState,
    /// Background to UI: outcome of an acknowledged relay.
    Ack {
        #[serde(rename = "requestId")]
        request_id: String,
        committed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Action,
    FullState,
    SearchEntriesForUrl,
    RequestFullState,
    Ack,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::FullState => "full-state",
            Self::SearchEntriesForUrl => "search-entries-for-url",
            Self::RequestFullState => "request-full-state",
            Self::Ack => "ack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    UiToBackground,
    BackgroundToUi,
}

impl MessageDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UiToBackground => "ui_to_background",
            Self::BackgroundToUi => "background_to_ui",
        }
    }
}

impl BusMessage {
    #[must_use]
    pub fn action(action: Action) -> Self {
        Self::Action {
            action,
            request_id: None,
        }
    }

    #[must_use]
    pub fn full_state(state: StateTree) -> Self {
        Self::FullState {
            state: Box::new(state),
        }
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Action { .. } => MessageKind::Action,
            Self::FullState { .. } => MessageKind::FullState,
            Self::SearchEntriesForUrl { .. } => MessageKind::SearchEntriesForUrl,
            Self::RequestFullState => MessageKind::RequestFullState,
            Self::Ack { .. } => MessageKind::Ack,
        }
    }

    #[must_use]
    pub fn allows(&self, direction: MessageDirection) -> bool {
        match self {
            Self::Action { request_id, .. } => {
                direction == MessageDirection::UiToBackground || request_id.is_none()
            }
            Self::FullState { .. } | Self::Ack { .. } => {
                direction == MessageDirection::BackgroundToUi
            }
            Self::SearchEntriesForUrl { .. } | Self::RequestFullState => {
                direction == MessageDirection::UiToBackground
            }
        }
    }

    /// Rejects a message that arrived travelling the wrong way.
    pub fn expect_direction(&self, direction: MessageDirection) -> Result<(), ProtocolError> {
        if self.allows(direction) {
            return Ok(());
        }
        Err(ProtocolError::WrongDirection {
            kind: self.kind().as_str(),
            direction: direction.as_str(),
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|error| ProtocolError::Encode(error.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|error| ProtocolError::Decode(error.to_string()))
    }
}
