//! UI-context side of the lockbox sync bus.
//!
//! Every UI surface connects one port to the background, relays its actions
//! through an [`ActionRelay`] and renders from a read-only [`Replica`] kept
//! current by background pushes.

#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

pub mod context;
pub mod error;
pub mod policy;
pub mod relay;
pub mod replica;

pub use context::{ReplicaView, UiContext};
pub use error::{RelayError, Result};
pub use policy::{DeliveryPolicy, PolicyConfigError};
pub use relay::{ActionRelay, Delivery, PendingAcks};
pub use replica::Replica;
