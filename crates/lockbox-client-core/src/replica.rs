use lockbox_proto::BusMessage;
use lockbox_state::{Action, StateTree, reduce};

/// Read-only copy of the background tree held by a UI context.
///
/// Relayed actions are reduced locally for low latency; every full-state push
/// replaces the copy outright, so any drift is corrected on the next commit.
#[derive(Debug, Default, Clone)]
pub struct Replica {
    state: StateTree,
    updates: u64,
}

impl Replica {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &StateTree {
        &self.state
    }

    /// Number of inbound updates that changed the copy.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn apply_action(&mut self, action: &Action) -> bool {
        let next = reduce(&self.state, action);
        self.replace(next)
    }

    pub fn replace(&mut self, state: StateTree) -> bool {
        if state == self.state {
            return false;
        }
        self.state = state;
        self.updates += 1;
        true
    }

    /// Applies a background-to-UI message. Returns true if the copy changed.
    pub fn apply(&mut self, message: &BusMessage) -> bool {
        match message {
            BusMessage::Action { action, .. } => self.apply_action(action),
            BusMessage::FullState { state } => self.replace(StateTree::clone(state)),
            BusMessage::SearchEntriesForUrl { .. }
            | BusMessage::RequestFullState
            | BusMessage::Ack { .. } => false,
        }
    }

    /// Resets to an empty tree; a fresh full-state restores it.
    pub fn discard(&mut self) {
        self.state = StateTree::default();
        self.updates = 0;
    }
}
