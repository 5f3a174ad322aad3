//! Background event loop.
//!
//! One tokio task owns the [`StateStore`] and the [`PortRegistry`]. Commands
//! from background code and messages pumped in from UI ports are handled one
//! at a time, so the tree is never mutated concurrently and needs no lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lockbox_proto::{
    BusMessage, MessageDirection, PortConnector, PortEnd, PortError, PortId, port_pair,
};
use lockbox_state::{Action, StateTree, selectors};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastStats, SyncBroadcaster};
use crate::capture::{CaptureDisposition, CapturedToken};
use crate::error::{BusError, Result};
use crate::registry::{PortEvent, PortRegistry};
use crate::store::StateStore;

/// Receives `search-entries-for-url` queries. The bus never answers them;
/// any result travels back as ordinary state.
pub trait EntryQueryHandler: Send + Sync {
    fn search_entries_for_url(&self, origin: &PortId, url: &str);
}

/// Handler used when nothing else is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedEntryQueries;

impl EntryQueryHandler for LoggedEntryQueries {
    fn search_entries_for_url(&self, origin: &PortId, url: &str) {
        debug!(port = %origin, url, "entry search requested with no handler installed");
    }
}

/// Point-in-time view of the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct HubStatus {
    pub version: u64,
    pub ports: Vec<PortId>,
    pub stats: BroadcastStats,
}

#[derive(Debug)]
enum HubCommand {
    Register(PortEnd),
    Dispatch {
        action: Action,
        reply: Option<oneshot::Sender<Option<u64>>>,
    },
    Capture {
        captured: CapturedToken,
        reply: oneshot::Sender<CaptureDisposition>,
    },
    Snapshot(oneshot::Sender<StateTree>),
    Status(oneshot::Sender<HubStatus>),
    Shutdown,
}

/// Cloneable entry point into a running hub.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_port: Arc<AtomicU64>,
}

impl BackgroundHandle {
    /// Opens a port for a UI context named `context`. The hub starts
    /// listening on it immediately; nothing is pushed until the UI asks.
    pub fn open_port(&self, context: &str) -> Result<PortEnd> {
        let seq = self.next_port.fetch_add(1, Ordering::Relaxed) + 1;
        let (ui, background) = port_pair(PortId::new(seq, context));
        self.send(HubCommand::Register(background))?;
        Ok(ui)
    }

    /// Background-originated dispatch. Returns once queued.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.send(HubCommand::Dispatch {
            action,
            reply: None,
        })
    }

    /// Dispatches and waits for the hub to process the action. Yields the
    /// committed version, or `None` when the action changed nothing.
    pub async fn dispatch_and_wait(&self, action: Action) -> Result<Option<u64>> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Dispatch {
            action,
            reply: Some(reply),
        })?;
        response.await.map_err(|_| BusError::HubStopped)
    }

    /// Feeds a captured token into the store and reports whether this call
    /// committed it, found it already stored, or had it rejected.
    pub async fn capture(&self, captured: CapturedToken) -> Result<CaptureDisposition> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Capture { captured, reply })?;
        response.await.map_err(|_| BusError::HubStopped)
    }

    pub async fn snapshot(&self) -> Result<StateTree> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Snapshot(reply))?;
        response.await.map_err(|_| BusError::HubStopped)
    }

    pub async fn status(&self) -> Result<HubStatus> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Status(reply))?;
        response.await.map_err(|_| BusError::HubStopped)
    }

    /// Asks the hub to stop. Open ports are closed once it exits.
    pub fn shutdown(&self) {
        let _ = self.commands.send(HubCommand::Shutdown);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BusError::HubStopped)
    }
}

impl PortConnector for BackgroundHandle {
    fn connect(&self, context: &str) -> std::result::Result<PortEnd, PortError> {
        self.open_port(context).map_err(PortError::from)
    }
}

pub struct BackgroundHub {
    store: StateStore,
    registry: PortRegistry,
    broadcaster: SyncBroadcaster,
    entry_queries: Arc<dyn EntryQueryHandler>,
}

impl BackgroundHub {
    #[must_use]
    pub fn new(initial: StateTree) -> Self {
        Self {
            store: StateStore::new(initial),
            registry: PortRegistry::new(),
            broadcaster: SyncBroadcaster::new(),
            entry_queries: Arc::new(LoggedEntryQueries),
        }
    }

    #[must_use]
    pub fn with_entry_queries(mut self, handler: Arc<dyn EntryQueryHandler>) -> Self {
        self.entry_queries = handler;
        self
    }

    /// Starts the loop on the current tokio runtime. The task ends on
    /// [`BackgroundHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(self) -> (BackgroundHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = BackgroundHandle {
            commands: commands_tx,
            next_port: Arc::new(AtomicU64::new(0)),
        };
        let task = tokio::spawn(self.run(commands_rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        let (port_events_tx, mut port_events) = mpsc::unbounded_channel();
        info!("background hub started");
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command, &port_events_tx) {
                        break;
                    }
                }
                Some(event) = port_events.recv() => self.handle_port_event(event),
            }
        }
        info!(
            version = self.store.version(),
            ports = self.registry.len(),
            "background hub stopped"
        );
    }

    /// Returns false when the loop should stop.
    fn handle_command(
        &mut self,
        command: HubCommand,
        port_events: &mpsc::UnboundedSender<PortEvent>,
    ) -> bool {
        match command {
            HubCommand::Register(port) => {
                let id = self.registry.register(port, port_events.clone());
                info!(port = %id, ports = self.registry.len(), "ui context connected");
            }
            HubCommand::Dispatch { action, reply } => {
                let version = self.commit(&action, None);
                if let Some(reply) = reply {
                    let _ = reply.send(version);
                }
            }
            HubCommand::Capture { captured, reply } => {
                let provider = captured.provider;
                let token = captured.token.clone();
                let committed = self.commit(&captured.into_action(), None).is_some();
                let present =
                    selectors::auth_token(self.store.state(), provider) == Some(token.as_str());
                let disposition = match (committed, present) {
                    (true, true) => CaptureDisposition::Stored,
                    (false, true) => CaptureDisposition::AlreadyStored,
                    (_, false) => CaptureDisposition::Rejected,
                };
                let _ = reply.send(disposition);
            }
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(self.store.state().clone());
            }
            HubCommand::Status(reply) => {
                let _ = reply.send(HubStatus {
                    version: self.store.version(),
                    ports: self.registry.ids(),
                    stats: self.broadcaster.stats(),
                });
            }
            HubCommand::Shutdown => return false,
        }
        true
    }

    fn handle_port_event(&mut self, event: PortEvent) {
        match event {
            PortEvent::Closed(port) => {
                if self.registry.unregister(&port) {
                    info!(port = %port, ports = self.registry.len(), "ui context disconnected");
                }
            }
            PortEvent::Message { port, message } => {
                if !self.registry.contains(&port) {
                    debug!(port = %port, "ignoring message from unregistered port");
                    return;
                }
                match message {
                    Ok(message) => self.handle_message(port, message),
                    Err(error) => warn!(port = %port, %error, "dropping undecodable frame"),
                }
            }
        }
    }

    fn handle_message(&mut self, port: PortId, message: BusMessage) {
        if let Err(error) = message.expect_direction(MessageDirection::UiToBackground) {
            warn!(port = %port, %error, "protocol violation from ui context");
            return;
        }
        match message {
            BusMessage::Action { action, request_id } => {
                let committed = self.commit(&action, Some(&port)).is_some();
                if let Some(request_id) = request_id {
                    let ack = BusMessage::Ack {
                        request_id,
                        committed,
                    };
                    if let Err(error) = self.registry.send_to(&port, &ack) {
                        debug!(port = %port, %error, "ack not delivered");
                    }
                }
            }
            BusMessage::SearchEntriesForUrl { url } => {
                self.entry_queries.search_entries_for_url(&port, &url);
            }
            BusMessage::RequestFullState => {
                let message = BusMessage::full_state(self.store.state().clone());
                if let Err(error) = self.registry.send_to(&port, &message) {
                    debug!(port = %port, %error, "requested full-state not delivered");
                }
            }
            // Background-to-UI only; rejected above.
            BusMessage::FullState { .. } | BusMessage::Ack { .. } => {}
        }
    }

    /// Applies one action and publishes the commit. `origin` is the UI port
    /// the action came from, `None` for background-originated actions.
    fn commit(&mut self, action: &Action, origin: Option<&PortId>) -> Option<u64> {
        let Some(commit) = self.store.apply(action) else {
            debug!(action = action.action_type(), "action left state unchanged");
            return None;
        };
        debug!(
            version = commit.version,
            action = action.action_type(),
            origin = %origin.map_or_else(|| "background".to_string(), ToString::to_string),
            "state committed"
        );
        if let Err(error) =
            self.broadcaster
                .publish_commit(&mut self.registry, &commit, action, origin)
        {
            warn!(%error, version = commit.version, "commit broadcast failed to encode");
        }
        Some(commit.version)
    }
}
