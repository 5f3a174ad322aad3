//! OAuth token capture from tab navigation.
//!
//! Provider redirect pages are never rendered by the extension itself: the
//! browser lands on the provider's redirect URL in an ordinary tab and the
//! background watches for it. A matching navigation yields a
//! [`CapturedToken`], which is dispatched straight into the background store
//! without going through any UI relay.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lockbox_state::{Action, AuthProvider, actions};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BusConfig;
use crate::error::BusError;
use crate::hub::BackgroundHandle;

/// Browser tab identifier.
pub type TabId = i64;

/// A tab finished (or changed) navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabNavigation {
    pub tab_id: TabId,
    /// Absent for navigations the browser does not expose a URL for.
    pub url: Option<String>,
}

impl TabNavigation {
    #[must_use]
    pub fn new(tab_id: TabId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            url: Some(url.into()),
        }
    }
}

/// Token pulled out of a provider redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedToken {
    pub provider: AuthProvider,
    pub auth_id: Option<String>,
    pub token: String,
}

impl CapturedToken {
    #[must_use]
    pub fn into_action(self) -> Action {
        match self.auth_id {
            Some(auth_id) => actions::set_auth_token_for(self.provider, auth_id, self.token),
            None => actions::set_auth_token(self.provider, self.token),
        }
    }
}

/// What the store made of a captured token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDisposition {
    /// This capture committed the token.
    Stored,
    /// The token was already in state, so nothing was committed.
    AlreadyStored,
    /// No pending auth attempt took the token.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Not a provider redirect.
    Idle,
    /// Provider redirect without a usable token.
    Malformed { provider: AuthProvider },
    Matched(CapturedToken),
}

#[derive(Debug, Clone)]
struct RedirectSignature {
    provider: AuthProvider,
    prefix: Regex,
}

/// Recognizes provider redirect URLs. Signatures are checked in order and the
/// first match wins.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    signatures: Vec<RedirectSignature>,
    token: Regex,
}

impl TokenMatcher {
    pub fn new(dropbox_prefix: &str, my_buttercup_callback: &str) -> Result<Self, BusError> {
        let signatures = vec![
            RedirectSignature {
                provider: AuthProvider::Dropbox,
                prefix: prefix_pattern(dropbox_prefix)?,
            },
            RedirectSignature {
                provider: AuthProvider::MyButtercup,
                prefix: prefix_pattern(my_buttercup_callback)?,
            },
        ];
        Ok(Self {
            signatures,
            token: Regex::new(r"access_token=([^&#]+)")?,
        })
    }

    pub fn from_config(config: &BusConfig) -> Result<Self, BusError> {
        Self::new(
            &config.dropbox_redirect_prefix,
            &config.my_buttercup_callback_url,
        )
    }

    #[must_use]
    pub fn match_url(&self, url: &str) -> CaptureOutcome {
        let Some(signature) = self
            .signatures
            .iter()
            .find(|signature| signature.prefix.is_match(url))
        else {
            return CaptureOutcome::Idle;
        };
        let token = self
            .token
            .captures(url)
            .and_then(|captures| captures.get(1))
            .map(|token| token.as_str().to_string());
        match token {
            Some(token) => CaptureOutcome::Matched(CapturedToken {
                provider: signature.provider,
                auth_id: None,
                token,
            }),
            None => CaptureOutcome::Malformed {
                provider: signature.provider,
            },
        }
    }

    #[must_use]
    pub fn match_navigation(&self, navigation: &TabNavigation) -> CaptureOutcome {
        navigation
            .url
            .as_deref()
            .map_or(CaptureOutcome::Idle, |url| self.match_url(url))
    }
}

fn prefix_pattern(prefix: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^{}", regex::escape(prefix.trim())))
}

#[derive(Debug, Error)]
#[error("tab host failed: {message}")]
pub struct TabHostError {
    pub message: String,
}

/// Browser tab control used after a capture.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), TabHostError>;
}

/// Result of handling one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Ignored,
    Malformed,
    /// Token matched but state did not take it (no pending auth attempt).
    Rejected,
    Captured { tab_closed: bool },
    /// Same token as the one already in state; the tab is left alone.
    AlreadyCaptured,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchSummary {
    pub seen: usize,
    pub captured: usize,
    pub rejected: usize,
    pub malformed: usize,
    pub duplicates: usize,
}

/// Consumes tab navigation events and feeds captured tokens to the hub.
pub struct TabWatcher<H> {
    matcher: TokenMatcher,
    handle: BackgroundHandle,
    host: H,
    close_captured_tabs: bool,
}

impl<H: TabHost> TabWatcher<H> {
    pub fn new(matcher: TokenMatcher, handle: BackgroundHandle, host: H) -> Self {
        Self {
            matcher,
            handle,
            host,
            close_captured_tabs: true,
        }
    }

    pub fn from_config(
        config: &BusConfig,
        handle: BackgroundHandle,
        host: H,
    ) -> Result<Self, BusError> {
        let mut watcher = Self::new(TokenMatcher::from_config(config)?, handle, host);
        watcher.close_captured_tabs = config.close_captured_tabs;
        Ok(watcher)
    }

    #[must_use]
    pub fn with_close_captured_tabs(mut self, close: bool) -> Self {
        self.close_captured_tabs = close;
        self
    }

    /// Runs until the event stream ends or the hub stops.
    pub async fn run<S>(&self, mut navigations: S) -> WatchSummary
    where
        S: Stream<Item = TabNavigation> + Unpin,
    {
        let mut summary = WatchSummary::default();
        while let Some(navigation) = navigations.next().await {
            summary.seen += 1;
            match self.handle_navigation(&navigation).await {
                Ok(NavigationOutcome::Ignored) => {}
                Ok(NavigationOutcome::Malformed) => summary.malformed += 1,
                Ok(NavigationOutcome::Rejected) => summary.rejected += 1,
                Ok(NavigationOutcome::Captured { .. }) => summary.captured += 1,
                Ok(NavigationOutcome::AlreadyCaptured) => summary.duplicates += 1,
                Err(error) => {
                    warn!(%error, "tab watcher stopping");
                    break;
                }
            }
        }
        summary
    }

    pub async fn handle_navigation(
        &self,
        navigation: &TabNavigation,
    ) -> Result<NavigationOutcome, BusError> {
        let captured = match self.matcher.match_navigation(navigation) {
            CaptureOutcome::Idle => return Ok(NavigationOutcome::Ignored),
            CaptureOutcome::Malformed { provider } => {
                debug!(
                    tab_id = navigation.tab_id,
                    provider = provider.label(),
                    "provider redirect without access token"
                );
                return Ok(NavigationOutcome::Malformed);
            }
            CaptureOutcome::Matched(captured) => captured,
        };

        let provider = captured.provider;
        match self.handle.capture(captured).await? {
            CaptureDisposition::Stored => {}
            CaptureDisposition::AlreadyStored => {
                debug!(
                    tab_id = navigation.tab_id,
                    provider = provider.label(),
                    "token already captured; nothing committed"
                );
                return Ok(NavigationOutcome::AlreadyCaptured);
            }
            CaptureDisposition::Rejected => {
                debug!(
                    tab_id = navigation.tab_id,
                    provider = provider.label(),
                    "captured token not accepted; no pending auth attempt"
                );
                return Ok(NavigationOutcome::Rejected);
            }
        }

        info!(
            tab_id = navigation.tab_id,
            provider = provider.label(),
            "captured provider token"
        );
        let mut tab_closed = false;
        if self.close_captured_tabs {
            match self.host.remove_tab(navigation.tab_id).await {
                Ok(()) => tab_closed = true,
                Err(error) => warn!(tab_id = navigation.tab_id, %error, "failed to close capture tab"),
            }
        }
        Ok(NavigationOutcome::Captured { tab_closed })
    }
}
