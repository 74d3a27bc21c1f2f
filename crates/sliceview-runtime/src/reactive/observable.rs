#![forbid(unsafe_code)]

//! Shared value with change notification and version tracking.
//!
//! [`Observable<T>`] keeps a value in `Rc<RefCell<..>>` storage. A `set`
//! that changes the value (by `PartialEq`) bumps the version and notifies
//! every live subscriber in registration order.
//!
//! Subscribers are held weakly and upgraded one at a time, right before
//! each call. A [`Subscription`] dropped while a notification is running
//! (for instance from inside an earlier subscriber) is therefore never
//! called again, not even by the notification in progress.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: guards kept forever keep their callbacks alive.
//!   Dead entries are pruned lazily during notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span};
use web_time::Instant;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Clones are handles to the same state and share subscribers.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. A dropped [`Subscription`] is never called again.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    ///
    /// Safe to call from inside a subscriber callback.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Mutate the value in place, notifying subscribers if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                false
            } else {
                inner.version += 1;
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Register `callback` for value changes until the guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Notify live subscribers, or queue them when a batch is open.
    fn notify(&self) {
        let subscribers: Vec<CallbackWeak<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            inner.subscribers.clone()
        };
        if subscribers.is_empty() {
            return;
        }

        if super::batch::is_batching() {
            super::batch::record_sources_changed(1);
            for weak in subscribers {
                let key = Weak::as_ptr(&weak) as *const () as usize;
                let source = self.clone();
                super::batch::defer_or_run_keyed(key, move || {
                    if let Some(callback) = weak.upgrade() {
                        let latest = source.get();
                        callback(&latest);
                    }
                });
            }
            return;
        }

        let value = self.get();
        let started = Instant::now();
        let span = debug_span!(
            target: "sliceview.notify",
            "sliceview.notify",
            subscribers = subscribers.len() as u64,
            delivered = tracing::field::Empty,
            duration_us = tracing::field::Empty
        );
        let _entered = span.enter();

        let mut delivered = 0_u64;
        for weak in &subscribers {
            // Upgrade late: an earlier callback may have dropped this one.
            if let Some(callback) = weak.upgrade() {
                callback(&value);
                delivered += 1;
            }
        }

        let duration_us = started.elapsed().as_micros() as u64;
        span.record("delivered", delivered);
        span.record("duration_us", duration_us);
        debug!(
            target: "sliceview.notify",
            delivered,
            duration_us,
            "observable change delivered"
        );
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping it releases the only strong reference to the callback, so the
/// observable can no longer upgrade it.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
