#![forbid(unsafe_code)]

//! Requests for more data when a queried window comes back short.

use std::cell::RefCell;

use sliceview_core::{MsgId, SparseIdsSlice};

use crate::store::ListKey;

/// Which side of the anchor needs loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadDirection {
    /// Only the total count is missing.
    Around,
    Before,
    After,
}

/// Ask the fetch layer for ids of `key` on one side of `around`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadRequest {
    pub key: ListKey,
    pub around: MsgId,
    pub direction: LoadDirection,
}

/// Receives load requests from viewers.
///
/// Implementations may answer synchronously by writing into the store.
pub trait FetchRequester {
    fn request(&self, request: LoadRequest);
}

impl<F: Fn(LoadRequest)> FetchRequester for F {
    fn request(&self, request: LoadRequest) {
        self(request);
    }
}

/// Collects requests for a host that polls instead of reacting.
#[derive(Debug, Default)]
pub struct QueuedRequester {
    queue: RefCell<Vec<LoadRequest>>,
}

impl QueuedRequester {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every queued request, oldest first.
    pub fn drain(&self) -> Vec<LoadRequest> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl FetchRequester for QueuedRequester {
    fn request(&self, request: LoadRequest) {
        self.queue.borrow_mut().push(request);
    }
}

/// Loads needed to fill a window of `before` older and `after + 1` newer
/// ids around `around`.
///
/// A side is requested when it holds fewer ids than asked for and is not
/// known to be exhausted, from the loaded id nearest that side or from
/// `around` when nothing is loaded. When no side needs loading but the
/// total is unknown, the total alone is requested.
#[must_use]
pub fn insufficient_loads(
    key: ListKey,
    around: MsgId,
    slice: &SparseIdsSlice,
    before: usize,
    after: usize,
) -> Vec<LoadRequest> {
    let ids = slice.known_ids();
    let position = ids.partition_point(|&id| id < around);
    let mut requests = Vec::new();
    if position < before && slice.skipped_before() != Some(0) {
        requests.push(LoadRequest {
            key,
            around: ids.first().copied().unwrap_or(around),
            direction: LoadDirection::Before,
        });
    }
    if ids.len() - position <= after && slice.skipped_after() != Some(0) {
        requests.push(LoadRequest {
            key,
            around: ids.last().copied().unwrap_or(around),
            direction: LoadDirection::After,
        });
    }
    if requests.is_empty() && slice.full_count().is_none() {
        requests.push(LoadRequest {
            key,
            around: 0,
            direction: LoadDirection::Around,
        });
    }
    requests
}
