//! Shape of the shared application state.
//!
//! Each slice sits behind an `Arc` so a transition that only touches one slice
//! hands the untouched slices to the next tree by pointer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth providers whose redirect tokens can be captured from tab navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Dropbox,
    MyButtercup,
}

impl AuthProvider {
    pub const ALL: [Self; 2] = [Self::Dropbox, Self::MyButtercup];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dropbox => "dropbox",
            Self::MyButtercup => "mybuttercup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Dropbox,
    MyButtercup,
    Nextcloud,
    OwnCloud,
    Webdav,
}

impl ArchiveType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dropbox => "dropbox",
            Self::MyButtercup => "mybuttercup",
            Self::Nextcloud => "nextcloud",
            Self::OwnCloud => "owncloud",
            Self::Webdav => "webdav",
        }
    }

    /// WebDAV-family sources are connected with explicit credentials rather than OAuth.
    #[must_use]
    pub const fn is_webdav_based(self) -> bool {
        matches!(self, Self::Nextcloud | Self::OwnCloud | Self::Webdav)
    }
}

/// Busy and error banners shown by every UI context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppState {
    pub busy: Option<String>,
    pub error: Option<String>,
}

/// Pending authentication attempt and the token it produced, per provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderAuthState {
    #[serde(rename = "authID")]
    pub auth_id: Option<String>,
    #[serde(rename = "authToken")]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArchive {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MyButtercupState {
    #[serde(flatten)]
    pub auth: ProviderAuthState,
    pub organisations: Vec<Organisation>,
    /// Archives per organisation, keyed `org-<id>`.
    pub organisation_archives: BTreeMap<String, Vec<RemoteArchive>>,
    pub selected_archives: Vec<u64>,
}

impl MyButtercupState {
    #[must_use]
    pub fn organisation_key(org_id: u64) -> String {
        format!("org-{org_id}")
    }
}

/// Progress of the "add archive" setup flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddArchiveState {
    pub selected_archive_type: Option<ArchiveType>,
    pub selected_filename: Option<String>,
    pub selected_filename_needs_creation: bool,
    pub is_connected: bool,
    pub is_connecting: bool,
    pub is_adding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSourceStatus {
    Locked,
    Unlocked,
}

/// Metadata for one archive source known to the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSourceSummary {
    pub id: String,
    pub name: String,
    pub state: ArchiveSourceStatus,
    pub kind: ArchiveType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArchivesState {
    pub sources: Vec<ArchiveSourceSummary>,
}

/// Mirror of the persisted extension configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigState {
    pub values: BTreeMap<String, Value>,
}

/// The entire shared application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateTree {
    pub app: Arc<AppState>,
    pub dropbox: Arc<ProviderAuthState>,
    pub my_buttercup: Arc<MyButtercupState>,
    pub add_archive: Arc<AddArchiveState>,
    pub archives: Arc<ArchivesState>,
    pub config: Arc<ConfigState>,
}

impl StateTree {
    /// Auth slice for a provider.
    #[must_use]
    pub fn provider_auth(&self, provider: AuthProvider) -> &ProviderAuthState {
        match provider {
            AuthProvider::Dropbox => &self.dropbox,
            AuthProvider::MyButtercup => &self.my_buttercup.auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_tree_serializes_with_camel_case_slices() {
        let value = serde_json::to_value(StateTree::default()).expect("serialize tree");
        let object = value.as_object().expect("tree is an object");
        for key in [
            "app",
            "dropbox",
            "myButtercup",
            "addArchive",
            "archives",
            "config",
        ] {
            assert!(object.contains_key(key), "missing slice {key}");
        }
        assert_eq!(value["dropbox"], json!({ "authID": null, "authToken": null }));
    }

    #[test]
    fn partial_tree_fills_missing_slices_with_defaults() {
        let tree: StateTree = serde_json::from_value(json!({
            "dropbox": { "authID": "auth-1" },
            "myButtercup": { "authToken": "tok", "selectedArchives": [4] }
        }))
        .expect("partial tree decodes");
        assert_eq!(tree.dropbox.auth_id.as_deref(), Some("auth-1"));
        assert_eq!(tree.my_buttercup.auth.auth_token.as_deref(), Some("tok"));
        assert_eq!(tree.my_buttercup.selected_archives, vec![4]);
        assert_eq!(*tree.app, AppState::default());
    }

    #[test]
    fn archive_type_labels_match_wire_names() {
        for kind in [
            ArchiveType::Dropbox,
            ArchiveType::MyButtercup,
            ArchiveType::Nextcloud,
            ArchiveType::OwnCloud,
            ArchiveType::Webdav,
        ] {
            let encoded = serde_json::to_value(kind).expect("serialize archive type");
            assert_eq!(encoded, json!(kind.label()));
        }
        assert!(ArchiveType::OwnCloud.is_webdav_based());
        assert!(!ArchiveType::Dropbox.is_webdav_based());
    }
}
