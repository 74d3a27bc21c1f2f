#![forbid(unsafe_code)]

//! Sliceview Runtime
//!
//! The moving parts around the `sliceview-core` snapshots: an in-memory
//! store of sparse id lists, viewers that rebuild snapshots whenever the
//! store changes, and the requests viewers send when a window is short.
//!
//! # Key Components
//!
//! - [`SparseIdsStore`] - Per-peer, per-type id lists with change events
//! - [`sparse_viewer`], [`merged_viewer`], [`with_last_viewer`] - Live
//!   snapshot streams, cancelled by dropping their [`ViewerHandle`]
//! - [`FetchRequester`] - Where viewers send [`LoadRequest`]s
//! - [`ViewerConfig`] - Window sizes and delivery policy
//! - [`reactive`] - `Observable`, `Subscription` and `BatchScope`
//!
//! # Threading
//!
//! Everything here is single-threaded (`Rc`, `RefCell`). Notifications are
//! delivered synchronously on the thread that mutated the store, unless a
//! [`BatchScope`] is open, in which case they are coalesced and delivered
//! when the outermost scope ends.

pub mod config;
pub mod fetch;
pub mod reactive;
pub mod store;
pub mod viewer;

pub use config::{ConfigError, ViewerConfig};
pub use fetch::{FetchRequester, LoadDirection, LoadRequest, QueuedRequester, insufficient_loads};
pub use reactive::{BatchScope, Observable, Subscription};
pub use store::{ListKey, SparseIdsList, SparseIdsStore, StoreEvent, StoreRevision};
pub use viewer::{
    Snapshot, ViewerContext, ViewerHandle, merged_viewer, sparse_viewer, with_last_reversed_viewer,
    with_last_viewer, with_last_viewer_keyed,
};
