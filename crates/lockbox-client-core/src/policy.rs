use std::env;
use std::time::Duration;

use thiserror::Error;

pub const ENV_DELIVERY_POLICY: &str = "LOCKBOX_DELIVERY_POLICY";
pub const ENV_ACK_TIMEOUT_MS: &str = "LOCKBOX_ACK_TIMEOUT_MS";

pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2_000;
const MIN_ACK_TIMEOUT_MS: u64 = 50;
const MAX_ACK_TIMEOUT_MS: u64 = 60_000;

/// How a UI context relays actions to the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Post and move on. Whether the action took effect shows up later as
    /// state; nothing is reported back.
    #[default]
    FireAndForget,
    /// Tag each relay with a request id and wait up to `timeout` for the
    /// background to say whether it committed.
    Acknowledged { timeout: Duration },
}

impl DeliveryPolicy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FireAndForget => "fire_and_forget",
            Self::Acknowledged { .. } => "acknowledged",
        }
    }

    #[must_use]
    pub fn acknowledged() -> Self {
        Self::Acknowledged {
            timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
        }
    }

    pub fn from_env() -> Result<Self, PolicyConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the policy name and ack timeout through `lookup`. The timeout is
    /// clamped into 50..=60000 ms.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PolicyConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup(ENV_DELIVERY_POLICY)
            .map(|raw| raw.trim().to_ascii_lowercase())
            .filter(|raw| !raw.is_empty());
        let timeout_ms = match lookup(ENV_ACK_TIMEOUT_MS)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
        {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|error| PolicyConfigError::InvalidAckTimeout(format!("{raw}: {error}")))?,
            None => DEFAULT_ACK_TIMEOUT_MS,
        };
        let timeout = Duration::from_millis(timeout_ms.clamp(MIN_ACK_TIMEOUT_MS, MAX_ACK_TIMEOUT_MS));

        match name.as_deref() {
            None | Some("fire_and_forget" | "fire-and-forget") => Ok(Self::FireAndForget),
            Some("acknowledged" | "ack") => Ok(Self::Acknowledged { timeout }),
            Some(other) => Err(PolicyConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyConfigError {
    #[error("invalid LOCKBOX_DELIVERY_POLICY: {0:?} (expected fire_and_forget or acknowledged)")]
    UnknownPolicy(String),
    #[error("invalid LOCKBOX_ACK_TIMEOUT_MS: {0}")]
    InvalidAckTimeout(String),
}
