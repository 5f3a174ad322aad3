//! Reducer pipeline. Each slice has its own reducer; only the slice an action
//! targets is rebuilt and every other slice is carried over by pointer.

mod add_archive;
mod app;
mod archives;
mod auth;
mod config;

use std::sync::Arc;

use crate::actions::Action;
use crate::tree::{AuthProvider, StateTree};

/// Computes the next tree from `current` and exactly one action.
///
/// Total over the action vocabulary: unknown actions yield a tree equal to
/// `current` with every slice pointer-shared.
#[must_use]
pub fn reduce(current: &StateTree, action: &Action) -> StateTree {
    if let Action::SetEntireState(next) = action {
        return next.as_ref().clone();
    }

    StateTree {
        app: app::reduce(&current.app, action),
        dropbox: auth::reduce_provider(&current.dropbox, AuthProvider::Dropbox, action),
        my_buttercup: auth::reduce_my_buttercup(&current.my_buttercup, action),
        add_archive: add_archive::reduce(&current.add_archive, action),
        archives: archives::reduce(&current.archives, action),
        config: config::reduce(&current.config, action),
    }
}

/// Folds a sequence of actions through [`reduce`] in order.
#[must_use]
pub fn reduce_all<'a, I>(current: &StateTree, actions: I) -> StateTree
where
    I: IntoIterator<Item = &'a Action>,
{
    actions
        .into_iter()
        .fold(current.clone(), |tree, action| reduce(&tree, action))
}

/// Keeps the existing allocation when a slice reducer produced an equal value.
fn rebuild<T: PartialEq>(slice: &Arc<T>, next: Option<T>) -> Arc<T> {
    match next {
        Some(next) if *slice.as_ref() != next => Arc::new(next),
        _ => Arc::clone(slice),
    }
}
