use std::sync::Arc;

use super::rebuild;
use crate::actions::Action;
use crate::tree::ConfigState;

pub(super) fn reduce(slice: &Arc<ConfigState>, action: &Action) -> Arc<ConfigState> {
    let next = match action {
        Action::SetConfig(values) => Some(ConfigState {
            values: values.clone(),
        }),
        Action::SetConfigValue { key, value } => {
            let mut values = slice.values.clone();
            values.insert(key.clone(), value.clone());
            Some(ConfigState { values })
        }
        _ => None,
    };
    rebuild(slice, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn set_config_replaces_and_set_value_merges() {
        let slice = Arc::new(ConfigState::default());
        let slice = reduce(
            &slice,
            &actions::set_config(BTreeMap::from([
                ("autoLockTimeout".to_string(), json!(300)),
                ("theme".to_string(), json!("dark")),
            ])),
        );
        let slice = reduce(&slice, &actions::set_config_value("theme", json!("light")));
        assert_eq!(slice.values.get("theme"), Some(&json!("light")));
        assert_eq!(slice.values.get("autoLockTimeout"), Some(&json!(300)));

        let slice = reduce(&slice, &actions::set_config(BTreeMap::new()));
        assert!(slice.values.is_empty());
    }
}
