use std::sync::Arc;

use super::rebuild;
use crate::actions::Action;
use crate::tree::ArchivesState;

pub(super) fn reduce(slice: &Arc<ArchivesState>, action: &Action) -> Arc<ArchivesState> {
    let next = match action {
        Action::SetArchives(sources) => Some(ArchivesState {
            sources: sources.clone(),
        }),
        _ => None,
    };
    rebuild(slice, next)
}
