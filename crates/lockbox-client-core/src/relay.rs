//! UI-side action relay.
//!
//! A UI context never reduces its own actions into authority. It forwards
//! them to the background over its single port and learns the outcome from
//! the state that comes back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lockbox_proto::{BusMessage, PortSender};
use lockbox_state::Action;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::policy::DeliveryPolicy;

/// How a relayed action was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted under fire-and-forget; the outcome is unknown.
    Sent,
    /// The background processed the action and reported whether it committed.
    Acknowledged { committed: bool },
}

/// Request ids awaiting an ack. Shared between the relay and the inbound pump
/// that sees the acks arrive.
#[derive(Debug, Clone, Default)]
pub struct PendingAcks {
    waiting: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
}

impl PendingAcks {
    fn insert(&self, request_id: String) -> oneshot::Receiver<bool> {
        let (reply, response) = oneshot::channel();
        self.lock().insert(request_id, reply);
        response
    }

    fn forget(&self, request_id: &str) {
        self.lock().remove(request_id);
    }

    /// Completes a waiting request. Returns false for an unknown or expired id.
    pub fn resolve(&self, request_id: &str, committed: bool) -> bool {
        match self.lock().remove(request_id) {
            Some(reply) => reply.send(committed).is_ok(),
            None => false,
        }
    }

    /// Drops every waiter; their callers see [`RelayError::Disconnected`].
    pub fn fail_all(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<bool>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct ActionRelay {
    port: Option<PortSender>,
    policy: DeliveryPolicy,
    pending: PendingAcks,
}

impl ActionRelay {
    #[must_use]
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            port: None,
            policy,
            pending: PendingAcks::default(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    #[must_use]
    pub fn pending_acks(&self) -> &PendingAcks {
        &self.pending
    }

    /// Attaches the context's one port. A second live port is refused; a port
    /// whose peer is already gone may be replaced.
    pub fn attach(&mut self, port: PortSender) -> Result<()> {
        if self.is_connected() {
            return Err(RelayError::AlreadyConnected);
        }
        debug!(port = %port.id(), policy = self.policy.label(), "relay attached");
        self.port = Some(port);
        Ok(())
    }

    /// Drops the port. Outstanding acks fail with `Disconnected`.
    pub fn detach(&mut self) {
        if let Some(port) = self.port.take() {
            debug!(port = %port.id(), "relay detached");
        }
        self.pending.fail_all();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.port.as_ref().is_some_and(|port| !port.is_closed())
    }

    /// Posts `action` to the background without waiting.
    pub fn dispatch_remote(&self, action: Action) -> Result<()> {
        self.post(&BusMessage::action(action))
    }

    /// Relays `action` under the configured policy.
    pub async fn dispatch(&self, action: Action) -> Result<Delivery> {
        match self.policy {
            DeliveryPolicy::FireAndForget => {
                self.dispatch_remote(action)?;
                Ok(Delivery::Sent)
            }
            DeliveryPolicy::Acknowledged { timeout } => {
                let committed = self.dispatch_acknowledged(action, timeout).await?;
                Ok(Delivery::Acknowledged { committed })
            }
        }
    }

    /// Relays `action` with a fresh request id and waits up to `deadline` for
    /// the background's ack. Yields whether the action committed.
    pub async fn dispatch_acknowledged(&self, action: Action, deadline: Duration) -> Result<bool> {
        let request_id = Uuid::new_v4().to_string();
        let response = self.pending.insert(request_id.clone());
        let message = BusMessage::Action {
            action,
            request_id: Some(request_id.clone()),
        };
        if let Err(error) = self.post(&message) {
            self.pending.forget(&request_id);
            return Err(error);
        }

        match timeout(deadline, response).await {
            Ok(Ok(committed)) => Ok(committed),
            Ok(Err(_)) => Err(RelayError::Disconnected),
            Err(_) => {
                self.pending.forget(&request_id);
                Err(RelayError::AckTimeout {
                    request_id,
                    timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Asks the background to search entries for `url`. One-way; results, if
    /// any, arrive as state.
    pub fn search_entries_for_url(&self, url: impl Into<String>) -> Result<()> {
        self.post(&BusMessage::SearchEntriesForUrl { url: url.into() })
    }

    /// Asks for a full-state push to this context only.
    pub fn request_full_state(&self) -> Result<()> {
        self.post(&BusMessage::RequestFullState)
    }

    fn post(&self, message: &BusMessage) -> Result<()> {
        let port = self.port.as_ref().ok_or(RelayError::NotConnected)?;
        port.post(message).map_err(RelayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_proto::{PortId, port_pair};
    use lockbox_state::{AuthProvider, actions};

    #[test]
    fn relay_before_connect_fails_loudly() {
        let relay = ActionRelay::new(DeliveryPolicy::FireAndForget);
        assert_eq!(
            relay.dispatch_remote(actions::set_auth_id(AuthProvider::Dropbox, "a")),
            Err(RelayError::NotConnected)
        );
        assert_eq!(
            relay.search_entries_for_url("https://example.com"),
            Err(RelayError::NotConnected)
        );
    }

    #[test]
    fn only_one_live_port_per_context() {
        let (ui, _background) = port_pair(PortId::new(1, "dialog"));
        let (spare, _spare_background) = port_pair(PortId::new(2, "dialog"));
        let mut relay = ActionRelay::default();
        relay.attach(ui.split().0).expect("first attach");
        assert_eq!(
            relay.attach(spare.split().0),
            Err(RelayError::AlreadyConnected)
        );
    }

    #[test]
    fn dead_port_reports_disconnected_and_can_be_replaced() {
        let (ui, background) = port_pair(PortId::new(1, "dialog"));
        let mut relay = ActionRelay::default();
        relay.attach(ui.split().0).expect("attach");
        drop(background);
        assert!(!relay.is_connected());
        assert_eq!(
            relay.dispatch_remote(actions::set_busy("x")),
            Err(RelayError::Disconnected)
        );

        let (replacement, _background) = port_pair(PortId::new(2, "dialog"));
        relay.attach(replacement.split().0).expect("reattach");
        assert!(relay.is_connected());
    }

    #[tokio::test]
    async fn unanswered_ack_times_out_and_is_forgotten() {
        let (ui, mut background) = port_pair(PortId::new(1, "dialog"));
        let mut relay = ActionRelay::new(DeliveryPolicy::Acknowledged {
            timeout: Duration::from_millis(20),
        });
        relay.attach(ui.split().0).expect("attach");

        let error = relay
            .dispatch(actions::set_busy("Saving"))
            .await
            .expect_err("nobody answers");
        assert!(matches!(error, RelayError::AckTimeout { timeout_ms: 20, .. }));
        assert!(relay.pending_acks().is_empty());

        match background.recv().await.expect("frame").expect("decodes") {
            BusMessage::Action { request_id, .. } => assert!(request_id.is_some()),
            other => panic!("expected tagged action, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ack_resolves_the_waiting_dispatch() {
        let (ui, mut background) = port_pair(PortId::new(1, "dialog"));
        let mut relay = ActionRelay::new(DeliveryPolicy::acknowledged());
        relay.attach(ui.split().0).expect("attach");
        let pending = relay.pending_acks().clone();

        let answer = tokio::spawn(async move {
            if let Some(Ok(BusMessage::Action {
                request_id: Some(request_id),
                ..
            })) = background.recv().await
            {
                pending.resolve(&request_id, true);
            }
            background
        });

        let delivery = relay
            .dispatch(actions::set_busy("Saving"))
            .await
            .expect("acked");
        assert_eq!(delivery, Delivery::Acknowledged { committed: true });
        drop(answer.await.expect("answer task"));
    }
}
