//! In-process port channels.
//!
//! A port is a pair of unbounded FIFO channels carrying encoded JSON frames,
//! one per direction. Dropping either end closes the port for the peer: the
//! peer's receiver yields `None` and its sender starts failing with
//! [`PortError::Closed`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::{BusMessage, ProtocolError};

/// One encoded message. Shared so a broadcast encodes the tree once.
pub type Frame = Arc<str>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port {0} is closed")]
    Closed(PortId),
    #[error("background unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Connection identity: allocation sequence plus the name the UI context
/// connected with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId {
    seq: u64,
    context: Arc<str>,
}

impl PortId {
    #[must_use]
    pub fn new(seq: u64, context: impl Into<Arc<str>>) -> Self {
        Self {
            seq,
            context: context.into(),
        }
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.context, self.seq)
    }
}

/// Sending half of a port end.
#[derive(Debug, Clone)]
pub struct PortSender {
    id: PortId,
    tx: mpsc::UnboundedSender<Frame>,
}

impl PortSender {
    #[must_use]
    pub fn id(&self) -> &PortId {
        &self.id
    }

    /// True once the peer has dropped its receiving half.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Encodes and sends one message. Never blocks.
    pub fn post(&self, message: &BusMessage) -> Result<(), PortError> {
        let frame: Frame = message.encode()?.into();
        self.post_frame(frame)
    }

    /// Sends an already encoded frame. Never blocks.
    pub fn post_frame(&self, frame: Frame) -> Result<(), PortError> {
        self.tx
            .send(frame)
            .map_err(|_| PortError::Closed(self.id.clone()))
    }
}

/// Receiving half of a port end.
#[derive(Debug)]
pub struct PortReceiver {
    id: PortId,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl PortReceiver {
    #[must_use]
    pub fn id(&self) -> &PortId {
        &self.id
    }

    /// Next raw frame; `None` once the peer has gone away and the queue is drained.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next decoded message; `None` once the peer has gone away.
    pub async fn recv(&mut self) -> Option<Result<BusMessage, ProtocolError>> {
        let frame = self.recv_frame().await?;
        Some(BusMessage::decode(&frame))
    }

    /// Non-blocking variant of [`Self::recv`]. `None` when nothing is queued
    /// right now or the port is closed.
    pub fn try_recv(&mut self) -> Option<Result<BusMessage, ProtocolError>> {
        let frame = self.rx.try_recv().ok()?;
        Some(BusMessage::decode(&frame))
    }
}

/// One side of a port.
#[derive(Debug)]
pub struct PortEnd {
    sender: PortSender,
    receiver: PortReceiver,
}

impl PortEnd {
    #[must_use]
    pub fn id(&self) -> &PortId {
        self.sender.id()
    }

    pub fn post(&self, message: &BusMessage) -> Result<(), PortError> {
        self.sender.post(message)
    }

    pub async fn recv(&mut self) -> Option<Result<BusMessage, ProtocolError>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Result<BusMessage, ProtocolError>> {
        self.receiver.try_recv()
    }

    #[must_use]
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }
}

/// Anything a UI context can open its port against.
pub trait PortConnector {
    /// Opens a new port; the returned end belongs to the caller.
    fn connect(&self, context: &str) -> Result<PortEnd, PortError>;
}

/// Creates both ends of a port sharing one identity.
#[must_use]
pub fn port_pair(id: PortId) -> (PortEnd, PortEnd) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    let left = PortEnd {
        sender: PortSender {
            id: id.clone(),
            tx: left_tx,
        },
        receiver: PortReceiver {
            id: id.clone(),
            rx: left_rx,
        },
    };
    let right = PortEnd {
        sender: PortSender {
            id: id.clone(),
            tx: right_tx,
        },
        receiver: PortReceiver { id, rx: right_rx },
    };
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_state::actions;

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (ui, mut background) = port_pair(PortId::new(1, "dialog"));
        for index in 0..5 {
            ui.post(&BusMessage::action(actions::set_busy(format!("step-{index}"))))
                .expect("post");
        }
        for index in 0..5 {
            let message = background
                .recv()
                .await
                .expect("frame")
                .expect("decodes");
            assert_eq!(
                message,
                BusMessage::action(actions::set_busy(format!("step-{index}")))
            );
        }
    }

    #[tokio::test]
    async fn dropping_one_end_closes_the_other() {
        let (ui, background) = port_pair(PortId::new(2, "setup"));
        let (background_tx, mut background_rx) = background.split();
        drop(ui);
        assert!(background_tx.is_closed());
        assert_eq!(
            background_tx.post(&BusMessage::RequestFullState),
            Err(PortError::Closed(PortId::new(2, "setup")))
        );
        assert!(background_rx.recv().await.is_none());
    }

    #[test]
    fn port_id_displays_context_and_sequence() {
        assert_eq!(PortId::new(7, "dialog").to_string(), "dialog#7");
    }
}
