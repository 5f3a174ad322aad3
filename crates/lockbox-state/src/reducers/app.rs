use std::sync::Arc;

use super::rebuild;
use crate::actions::Action;
use crate::tree::AppState;

pub(super) fn reduce(slice: &Arc<AppState>, action: &Action) -> Arc<AppState> {
    let next = match action {
        Action::SetBusy(message) => Some(AppState {
            busy: Some(message.clone()),
            ..slice.as_ref().clone()
        }),
        Action::UnsetBusy => Some(AppState {
            busy: None,
            ..slice.as_ref().clone()
        }),
        Action::SetError(message) => Some(AppState {
            error: Some(message.clone()),
            ..slice.as_ref().clone()
        }),
        Action::ClearError => Some(AppState {
            error: None,
            ..slice.as_ref().clone()
        }),
        _ => None,
    };
    rebuild(slice, next)
}
