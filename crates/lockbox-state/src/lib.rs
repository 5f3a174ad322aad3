//! Canonical state tree and reducer pipeline for the lockbox sync bus.
//!
//! This crate is pure: it owns the shape of the shared application state, the
//! action vocabulary that describes transitions, and the reducers that compute
//! the next tree. It never performs I/O and never holds a "current" tree itself;
//! the background store owns the authoritative instance and UI contexts keep
//! read replicas.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod actions;
pub mod reducers;
pub mod selectors;
pub mod tree;

pub use actions::{Action, ActionDecodeError, RawAction};
pub use reducers::{reduce, reduce_all};
pub use tree::{
    AddArchiveState, AppState, ArchiveSourceStatus, ArchiveSourceSummary, ArchiveType,
    ArchivesState, AuthProvider, ConfigState, MyButtercupState, Organisation,
    ProviderAuthState, RemoteArchive, StateTree,
};
