//! Live UI ports known to the background.
//!
//! Registering a port spawns its inbound pump: every frame the UI posts is
//! decoded and forwarded to the hub tagged with the port id, and end of stream
//! (orderly disconnect or a context that simply vanished) is reported as
//! [`PortEvent::Closed`]. The hub reacts by unregistering, so no caller ever
//! has to clean up after a dead UI.

use std::collections::BTreeMap;

use lockbox_proto::{BusMessage, PortEnd, PortError, PortId, PortSender, ProtocolError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::DeliveryError;

/// What a port pump reports to the hub.
#[derive(Debug)]
pub enum PortEvent {
    Message {
        port: PortId,
        message: Result<BusMessage, ProtocolError>,
    },
    Closed(PortId),
}

/// Per-port outcome of one fanout.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<PortId>,
    pub failed: Vec<PortId>,
    /// Ports left out on purpose, such as the origin of a relayed action.
    pub skipped: Vec<PortId>,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
struct RegisteredPort {
    sender: PortSender,
    pump: Option<JoinHandle<()>>,
}

impl Drop for RegisteredPort {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: BTreeMap<PortId, RegisteredPort>,
}

impl PortRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a background port end and attaches its inbound pump.
    /// Must be called from within a tokio runtime.
    pub fn register(&mut self, port: PortEnd, events: mpsc::UnboundedSender<PortEvent>) -> PortId {
        let (sender, mut receiver) = port.split();
        let id = sender.id().clone();
        let pump_id = id.clone();
        let pump = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let event = PortEvent::Message {
                    port: pump_id.clone(),
                    message,
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            let _ = events.send(PortEvent::Closed(pump_id));
        });
        self.insert(sender, Some(pump));
        id
    }

    /// Registers an outbound-only port. Nothing watches the inbound side, so
    /// the port is only dropped once a delivery to it fails.
    pub fn register_sender(&mut self, sender: PortSender) -> PortId {
        let id = sender.id().clone();
        self.insert(sender, None);
        id
    }

    fn insert(&mut self, sender: PortSender, pump: Option<JoinHandle<()>>) {
        let id = sender.id().clone();
        debug!(port = %id, "port registered");
        self.ports.insert(id, RegisteredPort { sender, pump });
    }

    /// Removes a port. Returns false when it was already gone.
    pub fn unregister(&mut self, id: &PortId) -> bool {
        let removed = self.ports.remove(id).is_some();
        if removed {
            debug!(port = %id, "port unregistered");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &PortId) -> bool {
        self.ports.contains_key(id)
    }

    /// Live port ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<PortId> {
        self.ports.keys().cloned().collect()
    }

    /// Runs `deliver` against every live port. A failing port is recorded;
    /// iteration continues and every failed port is unregistered before
    /// returning.
    pub fn for_each<F>(&mut self, deliver: F) -> DeliveryReport
    where
        F: FnMut(&PortSender) -> Result<(), PortError>,
    {
        self.for_each_except(None, deliver)
    }

    /// Like [`Self::for_each`], but `except` is never handed to `deliver` and
    /// shows up in [`DeliveryReport::skipped`] instead.
    pub fn for_each_except<F>(
        &mut self,
        except: Option<&PortId>,
        mut deliver: F,
    ) -> DeliveryReport
    where
        F: FnMut(&PortSender) -> Result<(), PortError>,
    {
        let mut report = DeliveryReport::default();
        for (id, port) in &self.ports {
            if except == Some(id) {
                report.skipped.push(id.clone());
                continue;
            }
            match deliver(&port.sender) {
                Ok(()) => report.delivered.push(id.clone()),
                Err(error) => {
                    debug!(port = %id, %error, "port delivery failed");
                    report.failed.push(id.clone());
                }
            }
        }
        for id in &report.failed {
            self.unregister(id);
        }
        report
    }

    /// Delivers one message to a single port. A port that turns out to be
    /// closed is unregistered.
    pub fn send_to(&mut self, id: &PortId, message: &BusMessage) -> Result<(), DeliveryError> {
        let port = self
            .ports
            .get(id)
            .ok_or_else(|| DeliveryError::UnknownPort(id.clone()))?;
        match port.sender.post(message) {
            Ok(()) => Ok(()),
            Err(error @ PortError::Closed(_)) => {
                self.unregister(id);
                Err(error.into())
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_proto::port_pair;
    use lockbox_state::actions;

    fn outbound_port(seq: u64, context: &str) -> (PortSender, lockbox_proto::PortEnd) {
        let (background, ui) = port_pair(PortId::new(seq, context));
        let (sender, _receiver) = background.split();
        (sender, ui)
    }

    #[test]
    fn for_each_skips_and_unregisters_dead_ports() {
        let mut registry = PortRegistry::new();
        let (first, mut first_ui) = outbound_port(1, "dialog");
        let (second, second_ui) = outbound_port(2, "popup");
        let (third, mut third_ui) = outbound_port(3, "setup");
        registry.register_sender(first);
        registry.register_sender(second);
        registry.register_sender(third);
        drop(second_ui);

        let message = BusMessage::action(actions::set_busy("Saving"));
        let report = registry.for_each(|sender| sender.post(&message));

        assert_eq!(
            report.delivered,
            vec![PortId::new(1, "dialog"), PortId::new(3, "setup")]
        );
        assert_eq!(report.failed, vec![PortId::new(2, "popup")]);
        assert!(report.skipped.is_empty());
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&PortId::new(2, "popup")));
        assert!(first_ui.try_recv().is_some());
        assert!(third_ui.try_recv().is_some());
    }

    #[test]
    fn excepted_port_is_reported_as_skipped_and_receives_nothing() {
        let mut registry = PortRegistry::new();
        let (first, mut first_ui) = outbound_port(1, "dialog");
        let (second, mut second_ui) = outbound_port(2, "popup");
        registry.register_sender(first);
        registry.register_sender(second);

        let message = BusMessage::action(actions::set_busy("Saving"));
        let origin = PortId::new(1, "dialog");
        let report = registry.for_each_except(Some(&origin), |sender| sender.post(&message));

        assert_eq!(report.delivered, vec![PortId::new(2, "popup")]);
        assert_eq!(report.skipped, vec![origin]);
        assert!(report.is_clean());
        assert!(first_ui.try_recv().is_none());
        assert!(second_ui.try_recv().is_some());
    }

    #[test]
    fn send_to_reports_unknown_and_closed_ports() {
        let mut registry = PortRegistry::new();
        let missing = PortId::new(9, "ghost");
        assert_eq!(
            registry.send_to(&missing, &BusMessage::RequestFullState),
            Err(DeliveryError::UnknownPort(missing))
        );

        let (sender, ui) = outbound_port(4, "dialog");
        let id = registry.register_sender(sender);
        drop(ui);
        assert_eq!(
            registry.send_to(&id, &BusMessage::RequestFullState),
            Err(DeliveryError::PortGone(id.clone()))
        );
        assert!(registry.is_empty());
        assert!(!registry.unregister(&id));
    }

    #[tokio::test]
    async fn pump_forwards_inbound_frames_then_reports_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut registry = PortRegistry::new();
        let (ui, background) = port_pair(PortId::new(5, "dialog"));
        let id = registry.register(background, events_tx);

        ui.post(&BusMessage::SearchEntriesForUrl {
            url: "https://example.com".to_string(),
        })
        .expect("post search");
        drop(ui);

        match events_rx.recv().await.expect("message event") {
            PortEvent::Message { port, message } => {
                assert_eq!(port, id);
                assert_eq!(
                    message.expect("decodes"),
                    BusMessage::SearchEntriesForUrl {
                        url: "https://example.com".to_string()
                    }
                );
            }
            PortEvent::Closed(_) => panic!("message must arrive before close"),
        }
        assert!(matches!(
            events_rx.recv().await.expect("close event"),
            PortEvent::Closed(port) if port == id
        ));
    }
}
