#![forbid(unsafe_code)]

//! Sliceview public facade crate.
//!
//! Re-exports the snapshot types of `sliceview-core` and the store and
//! viewers of `sliceview-runtime`, plus a prelude for day-to-day use.
//!
//! ```rust,ignore
//! use sliceview::prelude::*;
//!
//! let store = SparseIdsStore::new();
//! let ctx = ViewerContext::new(store.clone(), Rc::new(MemoryDirectory::new()));
//! let key = Key::new(peer, None, SharedMediaType::ChatPhoto, UniversalMsgId::Message(id));
//! let _viewer = with_last_viewer(&ctx, key, &ViewerConfig::default(), |slice| {
//!     for value in slice.iter() {
//!         // ...
//!     }
//! });
//! ```

// --- Snapshot re-exports ---------------------------------------------------

pub use sliceview_core::{
    Count, FullMsgId, Key, MemoryDirectory, MergedKey, MergedSlice, MsgId, MsgRange, PeerDirectory,
    PeerId, PeerPhoto, PhotoId, SERVER_MAX_MSG_ID, SharedMediaKey, SharedMediaMergedKey,
    SharedMediaType, SharedMediaTypes, SparseIdsSlice, UniversalMsgId, Value, WithLastSlice,
};

// --- Runtime re-exports ----------------------------------------------------

pub use sliceview_runtime::{
    BatchScope, FetchRequester, ListKey, LoadDirection, LoadRequest, Observable, QueuedRequester,
    SparseIdsStore, StoreEvent, Subscription, ViewerConfig, ViewerContext, ViewerHandle,
    merged_viewer, sparse_viewer, with_last_reversed_viewer, with_last_viewer,
    with_last_viewer_keyed,
};

#[cfg(feature = "tracing-json")]
pub use sliceview_core::logging::init_json_logging;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for sliceview hosts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A snapshot handed in from outside failed validation.
    #[error(transparent)]
    Slice(#[from] sliceview_core::SliceError),
    /// A key could not address anything.
    #[error(transparent)]
    Key(#[from] sliceview_core::KeyError),
    /// Viewer configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] sliceview_runtime::ConfigError),
}

/// Standard result type for sliceview APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Common imports for hosts.
pub mod prelude {
    pub use crate::{
        BatchScope, Error, FetchRequester, Key, LoadRequest, MemoryDirectory, MergedSlice,
        PeerDirectory, PeerId, PeerPhoto, Result, SharedMediaKey, SharedMediaMergedKey,
        SharedMediaType, SparseIdsSlice, SparseIdsStore, UniversalMsgId, Value, ViewerConfig,
        ViewerContext, ViewerHandle, WithLastSlice, merged_viewer, sparse_viewer,
        with_last_reversed_viewer, with_last_viewer,
    };

    pub use crate::{core, runtime};
}

pub use sliceview_core as core;
pub use sliceview_runtime as runtime;

#[cfg(test)]
mod tests {
    use super::*;

    fn checked_key(peer: PeerId, id: MsgId) -> Result<Key> {
        Ok(Key::try_new(
            peer,
            None,
            SharedMediaType::Photo,
            UniversalMsgId::Message(id),
        )?)
    }

    #[test]
    fn key_errors_convert() {
        assert!(checked_key(PeerId::user(1), 5).is_ok());
        let error = checked_key(PeerId::user(1), -5).expect_err("no migrated peer");
        assert!(matches!(error, Error::Key(_)));
    }

    #[test]
    fn slice_errors_convert() {
        let result: Result<SparseIdsSlice> =
            SparseIdsSlice::checked(vec![3, 1], MsgRange::FULL, None, None, None)
                .map_err(Error::from);
        assert!(matches!(result, Err(Error::Slice(_))));
    }

    #[test]
    fn prelude_builds_a_viewer() {
        use crate::prelude::*;
        use std::cell::Cell;
        use std::rc::Rc;

        let store = SparseIdsStore::new();
        let ctx = ViewerContext::new(store, Rc::new(MemoryDirectory::new()));
        let delivered = Rc::new(Cell::new(0));
        let counter = Rc::clone(&delivered);
        let key = SharedMediaKey::new(PeerId::user(3), SharedMediaType::Link, 1);
        let handle = sparse_viewer(&ctx, key, &ViewerConfig::default(), move |_| {
            counter.set(counter.get() + 1);
        });
        assert!(handle.is_active());
        assert_eq!(delivered.get(), 1);
    }
}
