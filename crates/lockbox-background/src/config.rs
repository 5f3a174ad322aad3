use std::env;

use thiserror::Error;

pub const ENV_DROPBOX_REDIRECT_PREFIX: &str = "LOCKBOX_DROPBOX_REDIRECT_PREFIX";
pub const ENV_MYBUTTERCUP_CALLBACK_URL: &str = "LOCKBOX_MYBUTTERCUP_CALLBACK_URL";
pub const ENV_CLOSE_CAPTURED_TABS: &str = "LOCKBOX_CLOSE_CAPTURED_TABS";

pub const DEFAULT_DROPBOX_REDIRECT_PREFIX: &str = "https://buttercup.pw/";
pub const DEFAULT_MYBUTTERCUP_CALLBACK_URL: &str = "https://my.buttercup.pw/oauth/authorized";

/// Background-side settings for the sync bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// URL prefix the Dropbox OAuth flow redirects to.
    pub dropbox_redirect_prefix: String,
    /// Callback URL prefix of the My Buttercup OAuth flow.
    pub my_buttercup_callback_url: String,
    /// Close the tab a token was captured from once the token is accepted.
    pub close_captured_tabs: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            dropbox_redirect_prefix: DEFAULT_DROPBOX_REDIRECT_PREFIX.to_string(),
            my_buttercup_callback_url: DEFAULT_MYBUTTERCUP_CALLBACK_URL.to_string(),
            close_captured_tabs: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    InvalidRedirectPrefix { key: &'static str, message: String },
    #[error("invalid {key}: {message}")]
    InvalidBool { key: &'static str, message: String },
}

impl BusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves settings through `lookup`, falling back to defaults for unset
    /// or blank keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let dropbox_redirect_prefix = match value(ENV_DROPBOX_REDIRECT_PREFIX) {
            Some(raw) => normalize_prefix(ENV_DROPBOX_REDIRECT_PREFIX, &raw)?,
            None => defaults.dropbox_redirect_prefix,
        };
        let my_buttercup_callback_url = match value(ENV_MYBUTTERCUP_CALLBACK_URL) {
            Some(raw) => normalize_prefix(ENV_MYBUTTERCUP_CALLBACK_URL, &raw)?,
            None => defaults.my_buttercup_callback_url,
        };
        let close_captured_tabs = match value(ENV_CLOSE_CAPTURED_TABS) {
            Some(raw) => parse_bool_env(&raw).map_err(|message| ConfigError::InvalidBool {
                key: ENV_CLOSE_CAPTURED_TABS,
                message,
            })?,
            None => defaults.close_captured_tabs,
        };

        Ok(Self {
            dropbox_redirect_prefix,
            my_buttercup_callback_url,
            close_captured_tabs,
        })
    }
}

fn normalize_prefix(key: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::InvalidRedirectPrefix {
            key,
            message: format!("expected an http(s) URL prefix, got {trimmed:?}"),
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::InvalidRedirectPrefix {
            key,
            message: "URL prefix has no host".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Accepts the usual spellings: `1/0`, `true/false`, `yes/no`, `on/off`.
pub(crate) fn parse_bool_env(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BusConfig, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        BusConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config_from(&[]).expect("defaults"), BusConfig::default());
    }

    #[test]
    fn prefixes_are_trimmed_and_validated() {
        let config = config_from(&[
            (ENV_DROPBOX_REDIRECT_PREFIX, "  https://auth.example.test/  "),
            (ENV_MYBUTTERCUP_CALLBACK_URL, "http://localhost:8000/oauth/done"),
        ])
        .expect("valid prefixes");
        assert_eq!(config.dropbox_redirect_prefix, "https://auth.example.test/");
        assert_eq!(
            config.my_buttercup_callback_url,
            "http://localhost:8000/oauth/done"
        );

        let error = config_from(&[(ENV_DROPBOX_REDIRECT_PREFIX, "ftp://buttercup.pw/")])
            .expect_err("scheme rejected");
        assert!(matches!(
            error,
            ConfigError::InvalidRedirectPrefix {
                key: ENV_DROPBOX_REDIRECT_PREFIX,
                ..
            }
        ));
        assert!(config_from(&[(ENV_MYBUTTERCUP_CALLBACK_URL, "https:///oauth")]).is_err());
    }

    #[test]
    fn close_tabs_flag_parses_common_spellings() {
        struct Case {
            raw: &'static str,
            expected: Option<bool>,
        }
        let cases = [
            Case {
                raw: "off",
                expected: Some(false),
            },
            Case {
                raw: "YES",
                expected: Some(true),
            },
            Case {
                raw: "0",
                expected: Some(false),
            },
            Case {
                raw: "sometimes",
                expected: None,
            },
        ];
        for case in cases {
            let result = config_from(&[(ENV_CLOSE_CAPTURED_TABS, case.raw)]);
            match case.expected {
                Some(expected) => assert_eq!(
                    result.expect("flag parses").close_captured_tabs,
                    expected,
                    "raw {}",
                    case.raw
                ),
                None => assert!(result.is_err(), "raw {} should fail", case.raw),
            }
        }
    }
}
