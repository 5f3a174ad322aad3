//! Single authoritative state tree.

use lockbox_state::{Action, StateTree, reduce};

/// A committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub version: u64,
    pub state: StateTree,
}

/// Holds the canonical tree. Owned by the hub loop, so every mutation is
/// serialized through [`StateStore::apply`].
#[derive(Debug, Default)]
pub struct StateStore {
    tree: StateTree,
    version: u64,
}

impl StateStore {
    #[must_use]
    pub fn new(initial: StateTree) -> Self {
        Self {
            tree: initial,
            version: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &StateTree {
        &self.tree
    }

    /// Number of commits since construction.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Runs `action` through the reducer pipeline. Returns the commit when the
    /// tree changed and `None` for a no-op transition.
    pub fn apply(&mut self, action: &Action) -> Option<Commit> {
        let next = reduce(&self.tree, action);
        if next == self.tree {
            return None;
        }
        Some(self.commit(next))
    }

    fn commit(&mut self, next: StateTree) -> Commit {
        self.tree = next;
        self.version = self.version.saturating_add(1);
        Commit {
            version: self.version,
            state: self.tree.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_state::{AuthProvider, actions, selectors};

    #[test]
    fn changing_action_commits_and_bumps_version() {
        let mut store = StateStore::default();
        let commit = store
            .apply(&actions::set_busy("Connecting"))
            .expect("busy banner commits");
        assert_eq!(commit.version, 1);
        assert_eq!(selectors::busy_message(&commit.state), Some("Connecting"));
        assert_eq!(store.state(), &commit.state);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn no_op_transitions_do_not_commit() {
        let mut store = StateStore::default();
        assert!(store.apply(&actions::unset_busy()).is_none());
        assert!(
            store
                .apply(&actions::set_auth_token(AuthProvider::Dropbox, "orphan"))
                .is_none()
        );
        assert_eq!(store.version(), 0);
        assert_eq!(store.state(), &StateTree::default());
    }

    #[test]
    fn initial_tree_is_kept_until_first_commit() {
        let seeded = lockbox_state::reduce(
            &StateTree::default(),
            &actions::set_auth_id(AuthProvider::MyButtercup, "mb-1"),
        );
        let store = StateStore::new(seeded.clone());
        assert_eq!(store.state(), &seeded);
        assert_eq!(store.version(), 0);
    }
}
