//! Read helpers over a [`StateTree`], shared by the background and UI replicas.

use crate::tree::{
    ArchiveSourceStatus, ArchiveType, AuthProvider, MyButtercupState, Organisation, StateTree,
};

#[must_use]
pub fn auth_id(tree: &StateTree, provider: AuthProvider) -> Option<&str> {
    tree.provider_auth(provider).auth_id.as_deref()
}

#[must_use]
pub fn auth_token(tree: &StateTree, provider: AuthProvider) -> Option<&str> {
    tree.provider_auth(provider).auth_token.as_deref()
}

/// True when an auth attempt is registered and still waiting for its token.
#[must_use]
pub fn is_awaiting_token(tree: &StateTree, provider: AuthProvider) -> bool {
    let auth = tree.provider_auth(provider);
    auth.auth_id.is_some() && auth.auth_token.is_none()
}

#[must_use]
pub fn busy_message(tree: &StateTree) -> Option<&str> {
    tree.app.busy.as_deref()
}

#[must_use]
pub fn selected_archive_type(tree: &StateTree) -> Option<ArchiveType> {
    tree.add_archive.selected_archive_type
}

#[must_use]
pub fn selected_filename(tree: &StateTree) -> Option<&str> {
    tree.add_archive.selected_filename.as_deref()
}

#[must_use]
pub fn selected_file_needs_creation(tree: &StateTree) -> bool {
    tree.add_archive.selected_filename_needs_creation
}

#[must_use]
pub fn is_connected(tree: &StateTree) -> bool {
    tree.add_archive.is_connected
}

#[must_use]
pub fn is_connecting(tree: &StateTree) -> bool {
    tree.add_archive.is_connecting
}

#[must_use]
pub fn selected_my_buttercup_archives(tree: &StateTree) -> &[u64] {
    &tree.my_buttercup.selected_archives
}

/// Organisation that owns `archive_id`, if any listed organisation does.
#[must_use]
pub fn organisation_for_archive(tree: &StateTree, archive_id: u64) -> Option<&Organisation> {
    let state = &tree.my_buttercup;
    state.organisations.iter().find(|org| {
        state
            .organisation_archives
            .get(&MyButtercupState::organisation_key(org.id))
            .is_some_and(|archives| archives.iter().any(|archive| archive.id == archive_id))
    })
}

#[must_use]
pub fn unlocked_archive_count(tree: &StateTree) -> usize {
    tree.archives
        .sources
        .iter()
        .filter(|source| source.state == ArchiveSourceStatus::Unlocked)
        .count()
}
