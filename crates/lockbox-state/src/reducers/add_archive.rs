use std::sync::Arc;

use super::rebuild;
use crate::actions::Action;
use crate::tree::AddArchiveState;

pub(super) fn reduce(slice: &Arc<AddArchiveState>, action: &Action) -> Arc<AddArchiveState> {
    let current = slice.as_ref();
    let next = match action {
        // Switching source type invalidates any connection and remote selection.
        Action::SetSelectedArchiveType(kind) => Some(AddArchiveState {
            selected_archive_type: *kind,
            ..AddArchiveState::default()
        }),
        Action::SelectRemoteFile(filename) => Some(AddArchiveState {
            selected_filename: Some(filename.clone()),
            selected_filename_needs_creation: false,
            ..current.clone()
        }),
        Action::CreateRemoteFile(filename) => Some(AddArchiveState {
            selected_filename: Some(filename.clone()),
            selected_filename_needs_creation: true,
            ..current.clone()
        }),
        Action::SetConnected(connected) => Some(AddArchiveState {
            is_connected: *connected,
            ..current.clone()
        }),
        Action::SetConnecting(connecting) => Some(AddArchiveState {
            is_connecting: *connecting,
            ..current.clone()
        }),
        Action::SetAdding(adding) => Some(AddArchiveState {
            is_adding: *adding,
            ..current.clone()
        }),
        Action::ResetAddArchive => Some(AddArchiveState::default()),
        _ => None,
    };
    rebuild(slice, next)
}
