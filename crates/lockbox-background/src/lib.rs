//! Background side of the lockbox sync bus.
//!
//! The background owns the only authoritative [`lockbox_state::StateTree`].
//! UI contexts connect through ports, relay actions in, and receive committed
//! state back out. OAuth redirect tokens seen in ordinary browser tabs are fed
//! straight into the store.

#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

pub mod broadcast;
pub mod capture;
pub mod config;
pub mod config_watch;
pub mod error;
pub mod hub;
pub mod registry;
pub mod store;

pub use broadcast::{BroadcastStats, SyncBroadcaster};
pub use capture::{
    CaptureDisposition, CaptureOutcome, CapturedToken, NavigationOutcome, TabHost, TabHostError, TabId,
    TabNavigation, TabWatcher, TokenMatcher, WatchSummary,
};
pub use config::{BusConfig, ConfigError};
pub use config_watch::{ConfigSnapshot, watch_config};
pub use error::{BusError, DeliveryError, Result};
pub use hub::{BackgroundHandle, BackgroundHub, EntryQueryHandler, HubStatus, LoggedEntryQueries};
pub use registry::{DeliveryReport, PortEvent, PortRegistry};
pub use store::{Commit, StateStore};
