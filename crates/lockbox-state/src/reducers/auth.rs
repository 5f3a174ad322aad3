//! Provider auth slices.
//!
//! A captured token only lands when the slice already holds a pending auth
//! attempt, and when the token names an attempt it must be that one. Anything
//! else is a silent no-op.

use std::sync::Arc;

use super::rebuild;
use crate::actions::Action;
use crate::tree::{AuthProvider, MyButtercupState, ProviderAuthState};

pub(super) fn reduce_provider(
    slice: &Arc<ProviderAuthState>,
    provider: AuthProvider,
    action: &Action,
) -> Arc<ProviderAuthState> {
    rebuild(slice, apply_auth(slice, provider, action))
}

pub(super) fn reduce_my_buttercup(
    slice: &Arc<MyButtercupState>,
    action: &Action,
) -> Arc<MyButtercupState> {
    let next = match action {
        Action::SetAuthId { .. } | Action::SetAuthToken { .. } => {
            apply_auth(&slice.auth, AuthProvider::MyButtercup, action).map(|auth| {
                MyButtercupState {
                    auth,
                    ..slice.as_ref().clone()
                }
            })
        }
        Action::SetOrganisations(organisations) => Some(MyButtercupState {
            organisations: organisations.clone(),
            ..slice.as_ref().clone()
        }),
        Action::SetOrganisationArchives { org_id, archives } => {
            let mut next = slice.as_ref().clone();
            next.organisation_archives
                .insert(MyButtercupState::organisation_key(*org_id), archives.clone());
            Some(next)
        }
        Action::SetSelectedArchives(ids) => Some(MyButtercupState {
            selected_archives: ids.clone(),
            ..slice.as_ref().clone()
        }),
        _ => None,
    };
    rebuild(slice, next)
}

fn apply_auth(
    state: &ProviderAuthState,
    provider: AuthProvider,
    action: &Action,
) -> Option<ProviderAuthState> {
    match action {
        Action::SetAuthId {
            provider: target,
            auth_id,
        } if *target == provider => Some(ProviderAuthState {
            auth_id: auth_id.clone(),
            auth_token: None,
        }),
        Action::SetAuthToken {
            provider: target,
            token,
            auth_id,
        } if *target == provider => {
            if token.is_empty() {
                return None;
            }
            let pending = state.auth_id.as_deref()?;
            if auth_id.as_deref().is_some_and(|claimed| claimed != pending) {
                return None;
            }
            Some(ProviderAuthState {
                auth_id: state.auth_id.clone(),
                auth_token: Some(token.clone()),
            })
        }
        _ => None,
    }
}
