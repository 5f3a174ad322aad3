//! One UI context (dialog, popup, setup page) attached to the background.

use std::time::Duration;

use lockbox_proto::{BusMessage, MessageDirection, PortConnector, PortReceiver};
use lockbox_state::{Action, AuthProvider, StateTree, actions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::policy::DeliveryPolicy;
use crate::relay::{ActionRelay, Delivery, PendingAcks};
use crate::replica::Replica;

/// What UI code observes of its replica.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicaView {
    pub state: StateTree,
    pub updates: u64,
    pub connected: bool,
}

#[derive(Debug)]
pub struct UiContext {
    name: String,
    relay: ActionRelay,
    view: watch::Receiver<ReplicaView>,
    pump: JoinHandle<()>,
}

impl UiContext {
    /// Opens this context's port against `connector`, starts the inbound pump
    /// and asks for an initial full-state.
    pub fn connect<C>(connector: &C, name: &str, policy: DeliveryPolicy) -> Result<Self>
    where
        C: PortConnector + ?Sized,
    {
        let port = connector.connect(name)?;
        let (sender, receiver) = port.split();
        let mut relay = ActionRelay::new(policy);
        relay.attach(sender)?;

        let (view_tx, view) = watch::channel(ReplicaView {
            connected: true,
            ..ReplicaView::default()
        });
        let pump = tokio::spawn(pump_inbound(
            receiver,
            relay.pending_acks().clone(),
            view_tx,
        ));
        relay.request_full_state()?;
        info!(context = name, policy = policy.label(), "ui context attached");

        Ok(Self {
            name: name.to_string(),
            relay,
            view,
            pump,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn relay(&self) -> &ActionRelay {
        &self.relay
    }

    /// Current replica contents.
    #[must_use]
    pub fn state(&self) -> StateTree {
        self.view.borrow().state.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.view.borrow().connected && self.relay.is_connected()
    }

    /// Change feed for UI code that re-renders on every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReplicaView> {
        self.view.clone()
    }

    pub async fn dispatch(&self, action: Action) -> Result<Delivery> {
        self.ensure_connected()?;
        self.relay.dispatch(action).await
    }

    /// Abandons this provider's pending auth attempt. A token captured
    /// afterwards finds no attempt to pair with and is rejected.
    pub async fn cancel_auth(&self, provider: AuthProvider) -> Result<Delivery> {
        self.dispatch(actions::clear_auth_id(provider)).await
    }

    pub fn search_entries_for_url(&self, url: impl Into<String>) -> Result<()> {
        self.ensure_connected()?;
        self.relay.search_entries_for_url(url)
    }

    pub fn request_full_state(&self) -> Result<()> {
        self.ensure_connected()?;
        self.relay.request_full_state()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.view.borrow().connected {
            Ok(())
        } else {
            Err(RelayError::Disconnected)
        }
    }

    /// Waits until the replica satisfies `predicate`, returning that state.
    pub async fn wait_for<F>(&self, deadline: Duration, mut predicate: F) -> Result<StateTree>
    where
        F: FnMut(&StateTree) -> bool,
    {
        let mut view = self.view.clone();
        match timeout(deadline, view.wait_for(|view| predicate(&view.state))).await {
            Ok(Ok(view)) => Ok(view.state.clone()),
            Ok(Err(_)) => Err(RelayError::Disconnected),
            Err(_) => Err(RelayError::WaitTimeout {
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Closes the port. The background drops its end on its own.
    pub fn disconnect(mut self) {
        self.relay.detach();
        self.pump.abort();
        debug!(context = %self.name, "ui context detached");
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_inbound(
    mut receiver: PortReceiver,
    pending: PendingAcks,
    view: watch::Sender<ReplicaView>,
) {
    let port = receiver.id().clone();
    let mut replica = Replica::new();
    while let Some(message) = receiver.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(error) => {
                warn!(port = %port, %error, "dropping undecodable frame from background");
                continue;
            }
        };
        if let Err(error) = message.expect_direction(MessageDirection::BackgroundToUi) {
            warn!(port = %port, %error, "protocol violation from background");
            continue;
        }
        if let BusMessage::Ack {
            request_id,
            committed,
        } = &message
        {
            if !pending.resolve(request_id, *committed) {
                debug!(port = %port, request_id = %request_id, "late or unknown ack");
            }
            continue;
        }
        if replica.apply(&message) {
            view.send_replace(ReplicaView {
                state: replica.state().clone(),
                updates: replica.updates(),
                connected: true,
            });
        }
    }

    info!(port = %port, "background port closed");
    pending.fail_all();
    view.send_modify(|view| view.connected = false);
}
