#![forbid(unsafe_code)]

//! Coalescing of [`Observable`](super::Observable) notifications.
//!
//! A store update often touches several lists at once (a message added to
//! the photo and the file lists, a migrated history arriving with the
//! primary one). Without batching every touched list would wake every
//! viewer, and viewers would rebuild their snapshot once per list.
//!
//! ```ignore
//! use sliceview_runtime::reactive::BatchScope;
//!
//! {
//!     let _batch = BatchScope::new();
//!     store.add_slice(part_key, part_ids, part_range, Some(120));
//!     store.add_slice(migrated_key, migrated_ids, migrated_range, Some(40));
//! } // every affected viewer recomputes once here
//! ```
//!
//! # Invariants
//!
//! 1. Only the outermost of nested scopes flushes.
//! 2. Values update immediately; only notifications are deferred.
//! 3. Keyed entries coalesce: the same key queued twice runs once, at the
//!    position where it was first queued.
//! 4. A callback that panics during flush does not stop the others; the
//!    first panic is re-raised after all of them ran.

use std::cell::RefCell;

use tracing::{debug, debug_span};
use web_time::Instant;

type DeferredNotify = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: Option<usize>,
    notify: DeferredNotify,
}

struct BatchContext {
    depth: u32,
    deferred: Vec<DeferredEntry>,
    /// Source mutations folded into this batch.
    sources_changed: u64,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// Whether a [`BatchScope`] is open on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` for the end of the current batch, or run it now.
///
/// Returns `true` when `f` was deferred.
pub fn defer_or_run(f: impl FnOnce() + 'static) -> bool {
    enqueue(None, Box::new(f))
}

/// Like [`defer_or_run`], but a later entry with the same `key` replaces
/// the queued one in place.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    enqueue(Some(key), Box::new(f))
}

fn enqueue(key: Option<usize>, notify: DeferredNotify) -> bool {
    let immediate = BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        let Some(batch) = guard.as_mut() else {
            return Some(notify);
        };
        let existing = key.and_then(|key| {
            batch
                .deferred
                .iter()
                .position(|entry| entry.key == Some(key))
        });
        match existing {
            Some(index) => batch.deferred[index].notify = notify,
            None => batch.deferred.push(DeferredEntry { key, notify }),
        }
        None
    });
    match immediate {
        Some(notify) => {
            notify();
            false
        }
        None => true,
    }
}

/// Count source mutations while a batch is open; ignored otherwise.
pub fn record_sources_changed(count: u64) {
    if count == 0 {
        return;
    }
    BATCH_CTX.with(|ctx| {
        if let Some(batch) = ctx.borrow_mut().as_mut() {
            batch.sources_changed = batch.sources_changed.saturating_add(count);
        }
    });
}

fn flush() {
    let (sources_changed, deferred): (u64, Vec<DeferredNotify>) = BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        match guard.as_mut() {
            Some(batch) => (
                std::mem::take(&mut batch.sources_changed),
                std::mem::take(&mut batch.deferred)
                    .into_iter()
                    .map(|entry| entry.notify)
                    .collect(),
            ),
            None => (0, Vec::new()),
        }
    });
    if deferred.is_empty() {
        return;
    }

    let notifications = deferred.len() as u64;
    let started = Instant::now();
    let span = debug_span!(
        target: "sliceview.notify",
        "sliceview.batch_flush",
        sources_changed,
        notifications,
        duration_us = tracing::field::Empty
    );
    let _entered = span.enter();

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    for notify in deferred {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(notify));
        if let Err(payload) = result
            && first_panic.is_none()
        {
            first_panic = Some(payload);
        }
    }

    let duration_us = started.elapsed().as_micros() as u64;
    span.record("duration_us", duration_us);
    debug!(
        target: "sliceview.notify",
        sources_changed,
        notifications,
        duration_us,
        "batch flushed"
    );

    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard that defers notifications until the outermost scope drops.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match guard.as_mut() {
                Some(batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        deferred: Vec::new(),
                        sources_changed: 0,
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Notifications queued in the open batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let outermost = BATCH_CTX.with(|ctx| match ctx.borrow_mut().as_mut() {
            Some(batch) => {
                batch.depth -= 1;
                batch.depth == 0
            }
            None => false,
        });
        if outermost {
            // The context stays open during flush so notifications queued
            // by flushed callbacks are picked up by the loop below.
            loop {
                let pending = BATCH_CTX.with(|ctx| {
                    ctx.borrow()
                        .as_ref()
                        .is_some_and(|batch| !batch.deferred.is_empty())
                });
                if !pending {
                    break;
                }
                let guard = ClearOnUnwind;
                flush();
                std::mem::forget(guard);
            }
            BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
        }
    }
}

/// Closes the batch if a flushed callback panics, so the thread does not
/// stay in batching mode forever.
struct ClearOnUnwind;

impl Drop for ClearOnUnwind {
    fn drop(&mut self) {
        BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
