//! Action vocabulary and pure action creators.
//!
//! Actions travel as `{ "type": string, "payload": any }`. Every known type has
//! a typed payload; an unrecognised type decodes to [`Action::Unknown`] so it
//! can still be relayed and reduced (as a no-op).

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tree::{
    ArchiveSourceSummary, ArchiveType, AuthProvider, Organisation, RemoteArchive, StateTree,
};

pub const SET_ENTIRE_STATE: &str = "app/setEntireState";
pub const SET_BUSY: &str = "app/setBusy";
pub const UNSET_BUSY: &str = "app/unsetBusy";
pub const SET_ERROR: &str = "app/setError";
pub const CLEAR_ERROR: &str = "app/clearError";
pub const DROPBOX_SET_AUTH_ID: &str = "dropbox/setAuthID";
pub const DROPBOX_SET_AUTH_TOKEN: &str = "dropbox/setAuthToken";
pub const MY_BUTTERCUP_SET_AUTH_ID: &str = "myButtercup/setAuthID";
pub const MY_BUTTERCUP_SET_AUTH_TOKEN: &str = "myButtercup/setAuthToken";
pub const MY_BUTTERCUP_SET_ORGANISATIONS: &str = "myButtercup/setOrganisations";
pub const MY_BUTTERCUP_SET_ORGANISATION_ARCHIVES: &str = "myButtercup/setOrganisationArchives";
pub const MY_BUTTERCUP_SET_SELECTED_ARCHIVES: &str = "myButtercup/setSelectedArchives";
pub const ADD_ARCHIVE_SET_SELECTED_TYPE: &str = "addArchive/setSelectedArchiveType";
pub const ADD_ARCHIVE_SELECT_REMOTE_FILE: &str = "addArchive/selectRemoteFile";
pub const ADD_ARCHIVE_CREATE_REMOTE_FILE: &str = "addArchive/createRemoteFile";
pub const ADD_ARCHIVE_SET_CONNECTED: &str = "addArchive/setConnected";
pub const ADD_ARCHIVE_SET_CONNECTING: &str = "addArchive/setConnecting";
pub const ADD_ARCHIVE_SET_ADDING: &str = "addArchive/setAdding";
pub const ADD_ARCHIVE_RESET: &str = "addArchive/reset";
pub const ARCHIVES_SET_ARCHIVES: &str = "archives/setArchives";
pub const CONFIG_SET_CONFIG: &str = "config/setConfig";
pub const CONFIG_SET_CONFIG_VALUE: &str = "config/setConfigValue";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionDecodeError {
    #[error("action type must not be empty")]
    EmptyType,
    #[error("invalid payload for {action_type}: {message}")]
    InvalidPayload {
        action_type: String,
        message: String,
    },
}

/// Untyped wire form of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// A described state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub enum Action {
    SetEntireState(Box<StateTree>),
    SetBusy(String),
    UnsetBusy,
    SetError(String),
    ClearError,
    SetAuthId {
        provider: AuthProvider,
        auth_id: Option<String>,
    },
    /// `auth_id` is `None` when the token was captured without knowing which
    /// attempt it belongs to; the reducer then pairs it with the pending attempt.
    SetAuthToken {
        provider: AuthProvider,
        token: String,
        auth_id: Option<String>,
    },
    SetOrganisations(Vec<Organisation>),
    SetOrganisationArchives {
        org_id: u64,
        archives: Vec<RemoteArchive>,
    },
    SetSelectedArchives(Vec<u64>),
    SetSelectedArchiveType(Option<ArchiveType>),
    SelectRemoteFile(String),
    CreateRemoteFile(String),
    SetConnected(bool),
    SetConnecting(bool),
    SetAdding(bool),
    ResetAddArchive,
    SetArchives(Vec<ArchiveSourceSummary>),
    SetConfig(BTreeMap<String, Value>),
    SetConfigValue {
        key: String,
        value: Value,
    },
    Unknown {
        action_type: String,
        payload: Value,
    },
}

impl Action {
    #[must_use]
    pub fn action_type(&self) -> &str {
        match self {
            Self::SetEntireState(_) => SET_ENTIRE_STATE,
            Self::SetBusy(_) => SET_BUSY,
            Self::UnsetBusy => UNSET_BUSY,
            Self::SetError(_) => SET_ERROR,
            Self::ClearError => CLEAR_ERROR,
            Self::SetAuthId { provider, .. } => match provider {
                AuthProvider::Dropbox => DROPBOX_SET_AUTH_ID,
                AuthProvider::MyButtercup => MY_BUTTERCUP_SET_AUTH_ID,
            },
            Self::SetAuthToken { provider, .. } => match provider {
                AuthProvider::Dropbox => DROPBOX_SET_AUTH_TOKEN,
                AuthProvider::MyButtercup => MY_BUTTERCUP_SET_AUTH_TOKEN,
            },
            Self::SetOrganisations(_) => MY_BUTTERCUP_SET_ORGANISATIONS,
            Self::SetOrganisationArchives { .. } => MY_BUTTERCUP_SET_ORGANISATION_ARCHIVES,
            Self::SetSelectedArchives(_) => MY_BUTTERCUP_SET_SELECTED_ARCHIVES,
            Self::SetSelectedArchiveType(_) => ADD_ARCHIVE_SET_SELECTED_TYPE,
            Self::SelectRemoteFile(_) => ADD_ARCHIVE_SELECT_REMOTE_FILE,
            Self::CreateRemoteFile(_) => ADD_ARCHIVE_CREATE_REMOTE_FILE,
            Self::SetConnected(_) => ADD_ARCHIVE_SET_CONNECTED,
            Self::SetConnecting(_) => ADD_ARCHIVE_SET_CONNECTING,
            Self::SetAdding(_) => ADD_ARCHIVE_SET_ADDING,
            Self::ResetAddArchive => ADD_ARCHIVE_RESET,
            Self::SetArchives(_) => ARCHIVES_SET_ARCHIVES,
            Self::SetConfig(_) => CONFIG_SET_CONFIG,
            Self::SetConfigValue { .. } => CONFIG_SET_CONFIG_VALUE,
            Self::Unknown { action_type, .. } => action_type.as_str(),
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TokenPayload {
    Bare(String),
    Targeted {
        token: String,
        #[serde(rename = "authID", default, skip_serializing_if = "Option::is_none")]
        auth_id: Option<String>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganisationArchivesPayload {
    #[serde(rename = "orgID")]
    org_id: u64,
    archives: Vec<RemoteArchive>,
}

#[derive(Serialize, Deserialize)]
struct ConfigValuePayload {
    key: String,
    value: Value,
}

fn payload<T: DeserializeOwned>(raw: &RawAction) -> Result<T, ActionDecodeError> {
    serde_json::from_value(raw.payload.clone()).map_err(|error| {
        ActionDecodeError::InvalidPayload {
            action_type: raw.action_type.clone(),
            message: error.to_string(),
        }
    })
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn auth_token_action(
    provider: AuthProvider,
    raw: &RawAction,
) -> Result<Action, ActionDecodeError> {
    let (token, auth_id) = match payload::<TokenPayload>(raw)? {
        TokenPayload::Bare(token) => (token, None),
        TokenPayload::Targeted { token, auth_id } => (token, auth_id),
    };
    Ok(Action::SetAuthToken {
        provider,
        token,
        auth_id,
    })
}

impl TryFrom<RawAction> for Action {
    type Error = ActionDecodeError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        if raw.action_type.trim().is_empty() {
            return Err(ActionDecodeError::EmptyType);
        }
        let action = match raw.action_type.as_str() {
            SET_ENTIRE_STATE => Self::SetEntireState(Box::new(payload(&raw)?)),
            SET_BUSY => Self::SetBusy(payload(&raw)?),
            UNSET_BUSY => Self::UnsetBusy,
            SET_ERROR => Self::SetError(payload(&raw)?),
            CLEAR_ERROR => Self::ClearError,
            DROPBOX_SET_AUTH_ID => Self::SetAuthId {
                provider: AuthProvider::Dropbox,
                auth_id: payload(&raw)?,
            },
            MY_BUTTERCUP_SET_AUTH_ID => Self::SetAuthId {
                provider: AuthProvider::MyButtercup,
                auth_id: payload(&raw)?,
            },
            DROPBOX_SET_AUTH_TOKEN => auth_token_action(AuthProvider::Dropbox, &raw)?,
            MY_BUTTERCUP_SET_AUTH_TOKEN => auth_token_action(AuthProvider::MyButtercup, &raw)?,
            MY_BUTTERCUP_SET_ORGANISATIONS => Self::SetOrganisations(payload(&raw)?),
            MY_BUTTERCUP_SET_ORGANISATION_ARCHIVES => {
                let decoded: OrganisationArchivesPayload = payload(&raw)?;
                Self::SetOrganisationArchives {
                    org_id: decoded.org_id,
                    archives: decoded.archives,
                }
            }
            MY_BUTTERCUP_SET_SELECTED_ARCHIVES => Self::SetSelectedArchives(payload(&raw)?),
            ADD_ARCHIVE_SET_SELECTED_TYPE => Self::SetSelectedArchiveType(payload(&raw)?),
            ADD_ARCHIVE_SELECT_REMOTE_FILE => Self::SelectRemoteFile(payload(&raw)?),
            ADD_ARCHIVE_CREATE_REMOTE_FILE => Self::CreateRemoteFile(payload(&raw)?),
            ADD_ARCHIVE_SET_CONNECTED => Self::SetConnected(payload(&raw)?),
            ADD_ARCHIVE_SET_CONNECTING => Self::SetConnecting(payload(&raw)?),
            ADD_ARCHIVE_SET_ADDING => Self::SetAdding(payload(&raw)?),
            ADD_ARCHIVE_RESET => Self::ResetAddArchive,
            ARCHIVES_SET_ARCHIVES => Self::SetArchives(payload(&raw)?),
            CONFIG_SET_CONFIG => Self::SetConfig(payload(&raw)?),
            CONFIG_SET_CONFIG_VALUE => {
                let decoded: ConfigValuePayload = payload(&raw)?;
                Self::SetConfigValue {
                    key: decoded.key,
                    value: decoded.value,
                }
            }
            _ => Self::Unknown {
                action_type: raw.action_type,
                payload: raw.payload,
            },
        };
        Ok(action)
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let action_type = action.action_type().to_string();
        let payload = match action {
            Action::SetEntireState(state) => to_payload(&state),
            Action::SetBusy(message) | Action::SetError(message) => Value::String(message),
            Action::UnsetBusy | Action::ClearError | Action::ResetAddArchive => Value::Null,
            Action::SetAuthId { auth_id, .. } => to_payload(&auth_id),
            Action::SetAuthToken { token, auth_id, .. } => match auth_id {
                None => Value::String(token),
                Some(auth_id) => to_payload(&TokenPayload::Targeted {
                    token,
                    auth_id: Some(auth_id),
                }),
            },
            Action::SetOrganisations(organisations) => to_payload(&organisations),
            Action::SetOrganisationArchives { org_id, archives } => {
                to_payload(&OrganisationArchivesPayload { org_id, archives })
            }
            Action::SetSelectedArchives(ids) => to_payload(&ids),
            Action::SetSelectedArchiveType(kind) => to_payload(&kind),
            Action::SelectRemoteFile(filename) | Action::CreateRemoteFile(filename) => {
                Value::String(filename)
            }
            Action::SetConnected(flag) | Action::SetConnecting(flag) | Action::SetAdding(flag) => {
                Value::Bool(flag)
            }
            Action::SetArchives(sources) => to_payload(&sources),
            Action::SetConfig(values) => to_payload(&values),
            Action::SetConfigValue { key, value } => {
                to_payload(&ConfigValuePayload { key, value })
            }
            Action::Unknown { payload, .. } => payload,
        };
        Self {
            action_type,
            payload,
        }
    }
}

#[must_use]
pub fn set_entire_state(state: StateTree) -> Action {
    Action::SetEntireState(Box::new(state))
}

#[must_use]
pub fn set_busy(message: impl Into<String>) -> Action {
    Action::SetBusy(message.into())
}

#[must_use]
pub fn unset_busy() -> Action {
    Action::UnsetBusy
}

#[must_use]
pub fn set_error(message: impl Into<String>) -> Action {
    Action::SetError(message.into())
}

#[must_use]
pub fn clear_error() -> Action {
    Action::ClearError
}

/// Registers the auth attempt a UI context is about to start.
#[must_use]
pub fn set_auth_id(provider: AuthProvider, auth_id: impl Into<String>) -> Action {
    Action::SetAuthId {
        provider,
        auth_id: Some(auth_id.into()),
    }
}

#[must_use]
pub fn clear_auth_id(provider: AuthProvider) -> Action {
    Action::SetAuthId {
        provider,
        auth_id: None,
    }
}

/// Token for whichever auth attempt is pending.
#[must_use]
pub fn set_auth_token(provider: AuthProvider, token: impl Into<String>) -> Action {
    Action::SetAuthToken {
        provider,
        token: token.into(),
        auth_id: None,
    }
}

/// Token that only lands if `auth_id` is the pending attempt.
#[must_use]
pub fn set_auth_token_for(
    provider: AuthProvider,
    auth_id: impl Into<String>,
    token: impl Into<String>,
) -> Action {
    Action::SetAuthToken {
        provider,
        token: token.into(),
        auth_id: Some(auth_id.into()),
    }
}

#[must_use]
pub fn set_organisations(organisations: Vec<Organisation>) -> Action {
    Action::SetOrganisations(organisations)
}

#[must_use]
pub fn set_organisation_archives(org_id: u64, archives: Vec<RemoteArchive>) -> Action {
    Action::SetOrganisationArchives { org_id, archives }
}

#[must_use]
pub fn set_selected_archives(ids: Vec<u64>) -> Action {
    Action::SetSelectedArchives(ids)
}

#[must_use]
pub fn set_selected_archive_type(kind: Option<ArchiveType>) -> Action {
    Action::SetSelectedArchiveType(kind)
}

#[must_use]
pub fn select_remote_file(filename: impl Into<String>) -> Action {
    Action::SelectRemoteFile(filename.into())
}

#[must_use]
pub fn create_remote_file(filename: impl Into<String>) -> Action {
    Action::CreateRemoteFile(filename.into())
}

#[must_use]
pub fn set_connected(connected: bool) -> Action {
    Action::SetConnected(connected)
}

#[must_use]
pub fn set_connecting(connecting: bool) -> Action {
    Action::SetConnecting(connecting)
}

#[must_use]
pub fn set_adding(adding: bool) -> Action {
    Action::SetAdding(adding)
}

#[must_use]
pub fn reset_add_archive() -> Action {
    Action::ResetAddArchive
}

#[must_use]
pub fn set_archives(sources: Vec<ArchiveSourceSummary>) -> Action {
    Action::SetArchives(sources)
}

#[must_use]
pub fn set_config(values: BTreeMap<String, Value>) -> Action {
    Action::SetConfig(values)
}

#[must_use]
pub fn set_config_value(key: impl Into<String>, value: Value) -> Action {
    Action::SetConfigValue {
        key: key.into(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_decodes_and_reencodes_verbatim() {
        let wire = json!({ "type": "__unknown__", "payload": { "x": 1 } });
        let action: Action = serde_json::from_value(wire.clone()).expect("unknown decodes");
        assert!(action.is_unknown());
        assert_eq!(action.action_type(), "__unknown__");
        assert_eq!(serde_json::to_value(&action).expect("encode"), wire);
    }

    #[test]
    fn unit_actions_omit_payload() {
        let encoded = serde_json::to_value(unset_busy()).expect("encode");
        assert_eq!(encoded, json!({ "type": UNSET_BUSY }));
    }

    #[test]
    fn auth_token_accepts_bare_and_targeted_payloads() {
        let bare: Action =
            serde_json::from_value(json!({ "type": DROPBOX_SET_AUTH_TOKEN, "payload": "abc" }))
                .expect("bare token decodes");
        assert_eq!(bare, set_auth_token(AuthProvider::Dropbox, "abc"));

        let targeted: Action = serde_json::from_value(json!({
            "type": MY_BUTTERCUP_SET_AUTH_TOKEN,
            "payload": { "token": "xyz", "authID": "attempt-2" }
        }))
        .expect("targeted token decodes");
        assert_eq!(
            targeted,
            set_auth_token_for(AuthProvider::MyButtercup, "attempt-2", "xyz")
        );
        assert_eq!(
            serde_json::to_value(&targeted).expect("encode"),
            json!({
                "type": MY_BUTTERCUP_SET_AUTH_TOKEN,
                "payload": { "token": "xyz", "authID": "attempt-2" }
            })
        );
    }

    #[test]
    fn known_type_with_malformed_payload_is_rejected() {
        let error = serde_json::from_value::<Action>(
            json!({ "type": ADD_ARCHIVE_SET_CONNECTED, "payload": "yes" }),
        )
        .expect_err("bool payload required");
        assert!(error.to_string().contains(ADD_ARCHIVE_SET_CONNECTED));
    }

    #[test]
    fn empty_type_is_rejected() {
        let error = Action::try_from(RawAction {
            action_type: "  ".to_string(),
            payload: Value::Null,
        })
        .expect_err("empty type");
        assert_eq!(error, ActionDecodeError::EmptyType);
    }

    #[test]
    fn organisation_archives_payload_uses_org_id_key() {
        let action = set_organisation_archives(
            7,
            vec![RemoteArchive {
                id: 70,
                name: "Team".to_string(),
            }],
        );
        let encoded = serde_json::to_value(&action).expect("encode");
        assert_eq!(encoded["payload"]["orgID"], json!(7));
        let decoded: Action = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, action);
    }
}
