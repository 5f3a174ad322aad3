//! Lockbox bus wire contracts.
//!
//! This crate owns the closed set of messages exchanged between the background
//! process and UI contexts, plus the in-process port channel that carries them
//! as encoded JSON frames.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod port;

pub use message::{BusMessage, MessageDirection, MessageKind, ProtocolError};
pub use port::{Frame, PortConnector, PortEnd, PortError, PortId, PortReceiver, PortSender, port_pair};
