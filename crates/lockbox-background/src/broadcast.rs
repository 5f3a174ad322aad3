//! Fanout of committed transitions to every registered UI port.

use lockbox_proto::{BusMessage, Frame, PortId, ProtocolError};
use lockbox_state::{Action, StateTree};
use tracing::warn;

use crate::registry::{DeliveryReport, PortRegistry};
use crate::store::Commit;

/// Running totals, mainly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastStats {
    pub full_state_pushes: u64,
    pub action_relays: u64,
    pub failed_deliveries: u64,
}

#[derive(Debug, Default)]
pub struct SyncBroadcaster {
    stats: BroadcastStats,
}

impl SyncBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        self.stats
    }

    /// Sends the whole tree to every registered port. The tree is encoded
    /// once and the frame shared across ports.
    pub fn push_full_state(
        &mut self,
        registry: &mut PortRegistry,
        state: &StateTree,
    ) -> Result<DeliveryReport, ProtocolError> {
        let frame = encode(&BusMessage::full_state(state.clone()))?;
        let report = registry.for_each(|sender| sender.post_frame(Frame::clone(&frame)));
        self.stats.full_state_pushes += 1;
        self.record_failures("full-state", &report);
        Ok(report)
    }

    /// Sends `action` to every registered port except `origin`.
    pub fn relay_action(
        &mut self,
        registry: &mut PortRegistry,
        action: &Action,
        origin: Option<&PortId>,
    ) -> Result<DeliveryReport, ProtocolError> {
        let frame = encode(&BusMessage::action(action.clone()))?;
        let report =
            registry.for_each_except(origin, |sender| sender.post_frame(Frame::clone(&frame)));
        self.stats.action_relays += 1;
        self.record_failures("action", &report);
        Ok(report)
    }

    /// Publishes one commit: the action goes to every port other than its
    /// origin first, then exactly one full-state goes to every port.
    /// Background-originated commits (`origin == None`) skip the relay.
    pub fn publish_commit(
        &mut self,
        registry: &mut PortRegistry,
        commit: &Commit,
        action: &Action,
        origin: Option<&PortId>,
    ) -> Result<DeliveryReport, ProtocolError> {
        if origin.is_some() {
            self.relay_action(registry, action, origin)?;
        }
        self.push_full_state(registry, &commit.state)
    }

    fn record_failures(&mut self, kind: &'static str, report: &DeliveryReport) {
        for port in &report.failed {
            self.stats.failed_deliveries += 1;
            warn!(port = %port, kind, "dropping port after failed delivery");
        }
    }
}

fn encode(message: &BusMessage) -> Result<Frame, ProtocolError> {
    message.encode().map(Frame::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_proto::{PortEnd, PortSender, port_pair};
    use lockbox_state::{AuthProvider, actions};

    use crate::store::StateStore;

    fn registered(registry: &mut PortRegistry, seq: u64, context: &str) -> PortEnd {
        let (background, ui) = port_pair(PortId::new(seq, context));
        let (sender, _receiver): (PortSender, _) = background.split();
        registry.register_sender(sender);
        ui
    }

    fn drain(port: &mut PortEnd) -> Vec<BusMessage> {
        let mut messages = Vec::new();
        while let Some(message) = port.try_recv() {
            messages.push(message.expect("frame decodes"));
        }
        messages
    }

    #[test]
    fn ui_commit_relays_to_others_then_pushes_one_full_state_each() {
        let mut registry = PortRegistry::new();
        let mut broadcaster = SyncBroadcaster::new();
        let mut dialog = registered(&mut registry, 1, "dialog");
        let mut popup = registered(&mut registry, 2, "popup");

        let mut store = StateStore::default();
        let action = actions::set_auth_id(AuthProvider::Dropbox, "attempt-1");
        let commit = store.apply(&action).expect("commits");
        let origin = PortId::new(1, "dialog");
        let report = broadcaster
            .publish_commit(&mut registry, &commit, &action, Some(&origin))
            .expect("publish");
        assert!(report.is_clean());

        assert_eq!(drain(&mut dialog), vec![BusMessage::full_state(commit.state.clone())]);
        assert_eq!(
            drain(&mut popup),
            vec![
                BusMessage::action(action),
                BusMessage::full_state(commit.state)
            ]
        );
        assert_eq!(
            broadcaster.stats(),
            BroadcastStats {
                full_state_pushes: 1,
                action_relays: 1,
                failed_deliveries: 0,
            }
        );
    }

    #[test]
    fn relay_leaves_the_origin_out_of_the_delivered_list() {
        let mut registry = PortRegistry::new();
        let mut broadcaster = SyncBroadcaster::new();
        let mut dialog = registered(&mut registry, 1, "dialog");
        let mut popup = registered(&mut registry, 2, "popup");

        let origin = PortId::new(1, "dialog");
        let report = broadcaster
            .relay_action(&mut registry, &actions::set_busy("Saving"), Some(&origin))
            .expect("relay");

        assert_eq!(report.delivered, vec![PortId::new(2, "popup")]);
        assert_eq!(report.skipped, vec![origin]);
        assert!(drain(&mut dialog).is_empty());
        assert_eq!(drain(&mut popup), vec![BusMessage::action(actions::set_busy("Saving"))]);
    }

    #[test]
    fn background_commit_pushes_full_state_only() {
        let mut registry = PortRegistry::new();
        let mut broadcaster = SyncBroadcaster::new();
        let mut dialog = registered(&mut registry, 1, "dialog");

        let mut store = StateStore::default();
        let action = actions::set_busy("Capturing");
        let commit = store.apply(&action).expect("commits");
        broadcaster
            .publish_commit(&mut registry, &commit, &action, None)
            .expect("publish");

        assert_eq!(drain(&mut dialog), vec![BusMessage::full_state(commit.state)]);
        assert_eq!(broadcaster.stats().action_relays, 0);
    }

    #[test]
    fn dead_port_is_dropped_and_the_rest_still_receive() {
        let mut registry = PortRegistry::new();
        let mut broadcaster = SyncBroadcaster::new();
        let mut first = registered(&mut registry, 1, "dialog");
        let gone = registered(&mut registry, 2, "popup");
        let mut third = registered(&mut registry, 3, "setup");
        drop(gone);

        let report = broadcaster
            .push_full_state(&mut registry, &StateTree::default())
            .expect("push");
        assert_eq!(report.failed, vec![PortId::new(2, "popup")]);
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(drain(&mut first).len(), 1);
        assert_eq!(drain(&mut third).len(), 1);

        broadcaster
            .push_full_state(&mut registry, &StateTree::default())
            .expect("second push");
        assert_eq!(registry.len(), 2);
        assert_eq!(broadcaster.stats().failed_deliveries, 1);
    }
}
