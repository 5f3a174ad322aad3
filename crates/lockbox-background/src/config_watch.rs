use std::collections::BTreeMap;

use futures::{Stream, StreamExt};
use lockbox_state::actions;
use serde_json::Value;
use tracing::{debug, warn};

use crate::hub::BackgroundHandle;

/// One full snapshot of persisted extension configuration.
pub type ConfigSnapshot = BTreeMap<String, Value>;

/// Dispatches every snapshot from `snapshots` as `config/setConfig`. Returns
/// how many were queued before the stream ended or the hub stopped.
pub async fn watch_config<S>(handle: BackgroundHandle, mut snapshots: S) -> usize
where
    S: Stream<Item = ConfigSnapshot> + Unpin,
{
    let mut queued = 0;
    while let Some(snapshot) = snapshots.next().await {
        debug!(keys = snapshot.len(), "persisted config changed");
        if let Err(error) = handle.dispatch(actions::set_config(snapshot)) {
            warn!(%error, "config watcher stopping");
            break;
        }
        queued += 1;
    }
    queued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::BackgroundHub;
    use lockbox_state::StateTree;
    use serde_json::json;

    #[tokio::test]
    async fn snapshots_flow_into_config_slice() {
        let (handle, _task) = BackgroundHub::new(StateTree::default()).spawn();
        let first: ConfigSnapshot = [("darkMode".to_string(), json!(false))].into();
        let second: ConfigSnapshot = [
            ("darkMode".to_string(), json!(true)),
            ("autoLockMinutes".to_string(), json!(10)),
        ]
        .into();

        let snapshots = futures::stream::iter(vec![first, second.clone()]);
        let queued = watch_config(handle.clone(), snapshots).await;
        assert_eq!(queued, 2);

        let state = handle.snapshot().await.expect("snapshot");
        assert_eq!(state.config.values, second);
        assert_eq!(handle.status().await.expect("status").version, 2);
    }
}
