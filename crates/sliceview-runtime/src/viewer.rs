#![forbid(unsafe_code)]

//! Live snapshot streams over the store.
//!
//! A viewer owns one subscription to the store (plus one to the key
//! source for keyed viewers). On every relevant notification it rebuilds
//! the whole snapshot from the store in one pass and hands it to the sink
//! if it differs from the last one delivered. Snapshots are never patched
//! in place.
//!
//! # Delivery rules
//!
//! 1. The first snapshot is delivered synchronously on creation.
//! 2. Unchanged snapshots are not delivered again.
//! 3. With [`ViewerConfig::monotonic`], counts the last delivered snapshot
//!    knew are carried into the next one while the edge they were measured
//!    from is still loaded. A snapshot that would still forget a count is
//!    withheld, unless its items changed: item changes are always
//!    delivered. Changing the key resets this baseline.
//! 4. Nothing is delivered and no load is requested after the
//!    [`ViewerHandle`] is dropped, even from a notification in progress.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashSet;
use sliceview_core::count::Count;
use sliceview_core::{
    Key, MergedSlice, PeerDirectory, SharedMediaKey, SharedMediaMergedKey, SparseIdsSlice,
    WithLastSlice,
};
use tracing::{debug, debug_span, info, trace};

use crate::config::ViewerConfig;
use crate::fetch::{FetchRequester, LoadRequest, insufficient_loads};
use crate::reactive::{Observable, Subscription};
use crate::store::{ListKey, SparseIdsStore, StoreRevision};

/// What viewers read from and where they send load requests.
#[derive(Clone)]
pub struct ViewerContext {
    pub store: SparseIdsStore,
    pub directory: Rc<dyn PeerDirectory>,
    pub requester: Option<Rc<dyn FetchRequester>>,
}

impl std::fmt::Debug for ViewerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerContext")
            .field("store", &self.store)
            .field("requester", &self.requester.is_some())
            .finish_non_exhaustive()
    }
}

impl ViewerContext {
    #[must_use]
    pub fn new(store: SparseIdsStore, directory: Rc<dyn PeerDirectory>) -> Self {
        Self {
            store,
            directory,
            requester: None,
        }
    }

    #[must_use]
    pub fn with_requester(mut self, requester: Rc<dyn FetchRequester>) -> Self {
        self.requester = Some(requester);
        self
    }

    /// One-off window of a single list, without subscribing.
    #[must_use]
    pub fn sparse_snapshot(&self, key: SharedMediaKey, config: &ViewerConfig) -> SparseIdsSlice {
        self.query_sparse(key, config.limit_before, config.limit_after, &mut Vec::new())
    }

    /// One-off merged window, without subscribing.
    #[must_use]
    pub fn merged_snapshot(&self, key: SharedMediaMergedKey, config: &ViewerConfig) -> MergedSlice {
        self.query_merged(key, config.limit_before, config.limit_after, &mut Vec::new())
    }

    /// One-off overlay window, without subscribing.
    #[must_use]
    pub fn with_last_snapshot(&self, key: Key, config: &ViewerConfig) -> WithLastSlice {
        self.query_with_last(key, config, &mut Vec::new())
    }

    fn query_sparse(
        &self,
        key: SharedMediaKey,
        before: usize,
        after: usize,
        loads: &mut Vec<LoadRequest>,
    ) -> SparseIdsSlice {
        let slice = self.store.query(key, before, after);
        loads.extend(insufficient_loads(
            ListKey::from(key),
            key.message_id,
            &slice,
            before,
            after,
        ));
        slice
    }

    fn query_merged(
        &self,
        key: SharedMediaMergedKey,
        before: usize,
        after: usize,
        loads: &mut Vec<LoadRequest>,
    ) -> MergedSlice {
        let part = self.query_sparse(key.part(), before, after, loads);
        let migrated = key
            .migrated()
            .map(|migrated| self.query_sparse(migrated, before, after, loads));
        MergedSlice::new(key.merged, part, migrated)
    }

    fn query_with_last(
        &self,
        key: Key,
        config: &ViewerConfig,
        loads: &mut Vec<LoadRequest>,
    ) -> WithLastSlice {
        let media_type = key.media_type();
        let slice = self.query_merged(
            SharedMediaMergedKey::new(key.viewer_key(), media_type),
            config.limit_before,
            config.limit_after,
            loads,
        );
        let ending = key.needs_ending().then(|| {
            self.query_merged(
                SharedMediaMergedKey::new(key.ending_key(), media_type),
                config.ending_limit_before,
                config.ending_limit_after,
                loads,
            )
        });
        WithLastSlice::new(key, slice, ending, self.directory.as_ref())
    }
}

/// A snapshot type a viewer can deliver.
pub trait Snapshot: Clone + PartialEq + 'static {
    /// `[full_count, skipped_before, skipped_after]`.
    fn known_counts(&self) -> [Count; 3];

    /// Whether both snapshots show the same items in the same order.
    fn same_items(&self, other: &Self) -> bool;

    /// Carries counts `previous` knew into `self` where they still hold.
    #[must_use]
    fn refined_by(self, previous: &Self, directory: &dyn PeerDirectory) -> Self;
}

impl Snapshot for SparseIdsSlice {
    fn known_counts(&self) -> [Count; 3] {
        [self.full_count(), self.skipped_before(), self.skipped_after()]
    }

    fn same_items(&self, other: &Self) -> bool {
        self.known_ids() == other.known_ids()
    }

    fn refined_by(self, previous: &Self, _directory: &dyn PeerDirectory) -> Self {
        SparseIdsSlice::refined_by(self, previous)
    }
}

impl Snapshot for MergedSlice {
    fn known_counts(&self) -> [Count; 3] {
        [self.full_count(), self.skipped_before(), self.skipped_after()]
    }

    fn same_items(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }

    fn refined_by(self, previous: &Self, _directory: &dyn PeerDirectory) -> Self {
        MergedSlice::refined_by(self, previous)
    }
}

impl Snapshot for WithLastSlice {
    fn known_counts(&self) -> [Count; 3] {
        [self.full_count(), self.skipped_before(), self.skipped_after()]
    }

    fn same_items(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }

    fn refined_by(self, previous: &Self, directory: &dyn PeerDirectory) -> Self {
        WithLastSlice::refined_by(self, previous, directory)
    }
}

/// Whether `next` forgets a count that `previous` knew.
fn retracts(previous: &impl Snapshot, next: &impl Snapshot) -> bool {
    previous
        .known_counts()
        .iter()
        .zip(next.known_counts())
        .any(|(before, after)| before.is_some() && after.is_none())
}

/// Keeps a viewer alive. Dropping it stops delivery immediately.
pub struct ViewerHandle {
    cancelled: Rc<Cell<bool>>,
    subscriptions: Vec<Subscription>,
}

impl ViewerHandle {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancelled.get()
    }

    /// Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.cancelled.set(true);
        self.subscriptions.clear();
        trace!(target: "sliceview.viewer", "viewer cancelled");
    }
}

impl std::fmt::Debug for ViewerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerHandle")
            .field("active", &self.is_active())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// How one kind of viewer turns a key into a snapshot.
trait Source: 'static {
    type Key: Clone + PartialEq + std::fmt::Debug + 'static;
    type Snapshot: Snapshot;

    const NAME: &'static str;

    /// Lists whose changes can alter the snapshot.
    fn lists(&self, key: &Self::Key) -> Vec<ListKey>;

    fn compute(
        &self,
        ctx: &ViewerContext,
        config: &ViewerConfig,
        key: &Self::Key,
        loads: &mut Vec<LoadRequest>,
    ) -> Self::Snapshot;
}

struct SparseSource;

impl Source for SparseSource {
    type Key = SharedMediaKey;
    type Snapshot = SparseIdsSlice;

    const NAME: &'static str = "sparse";

    fn lists(&self, key: &SharedMediaKey) -> Vec<ListKey> {
        vec![ListKey::from(*key)]
    }

    fn compute(
        &self,
        ctx: &ViewerContext,
        config: &ViewerConfig,
        key: &SharedMediaKey,
        loads: &mut Vec<LoadRequest>,
    ) -> SparseIdsSlice {
        ctx.query_sparse(*key, config.limit_before, config.limit_after, loads)
    }
}

struct MergedSource;

impl Source for MergedSource {
    type Key = SharedMediaMergedKey;
    type Snapshot = MergedSlice;

    const NAME: &'static str = "merged";

    fn lists(&self, key: &SharedMediaMergedKey) -> Vec<ListKey> {
        std::iter::once(key.part())
            .chain(key.migrated())
            .map(ListKey::from)
            .collect()
    }

    fn compute(
        &self,
        ctx: &ViewerContext,
        config: &ViewerConfig,
        key: &SharedMediaMergedKey,
        loads: &mut Vec<LoadRequest>,
    ) -> MergedSlice {
        ctx.query_merged(*key, config.limit_before, config.limit_after, loads)
    }
}

struct WithLastSource {
    reversed: bool,
}

impl Source for WithLastSource {
    type Key = Key;
    type Snapshot = WithLastSlice;

    const NAME: &'static str = "with_last";

    fn lists(&self, key: &Key) -> Vec<ListKey> {
        std::iter::once(key.peer_id())
            .chain(key.migrated_peer_id())
            .map(|peer_id| ListKey::new(peer_id, key.media_type()))
            .collect()
    }

    fn compute(
        &self,
        ctx: &ViewerContext,
        config: &ViewerConfig,
        key: &Key,
        loads: &mut Vec<LoadRequest>,
    ) -> WithLastSlice {
        let slice = ctx.query_with_last(*key, config, loads);
        if self.reversed { slice.reversed() } else { slice }
    }
}

struct DriverState<K, S> {
    key: K,
    last: Option<S>,
    requested: AHashSet<LoadRequest>,
}

struct Driver<S: Source> {
    source: S,
    ctx: ViewerContext,
    config: ViewerConfig,
    sink: Box<dyn Fn(&S::Snapshot)>,
    state: RefCell<DriverState<S::Key, S::Snapshot>>,
    seen_revision: Cell<u64>,
    cancelled: Rc<Cell<bool>>,
}

impl<S: Source> Driver<S> {
    fn on_store(&self, revision: &StoreRevision) {
        let previous = self.seen_revision.replace(revision.revision);
        // Coalesced notifications skip revisions; only a contiguous one
        // can be filtered by its event.
        if revision.revision == previous + 1
            && let Some(event) = &revision.event
        {
            let key = self.state.borrow().key.clone();
            if !self
                .source
                .lists(&key)
                .into_iter()
                .any(|list| event.touches(list))
            {
                trace!(target: "sliceview.viewer", viewer = S::NAME, ?event, "event ignored");
                return;
            }
        }
        self.refresh();
    }

    fn set_key(&self, key: S::Key) {
        {
            let mut state = self.state.borrow_mut();
            if state.key == key {
                return;
            }
            debug!(target: "sliceview.viewer", viewer = S::NAME, ?key, "viewer key changed");
            state.key = key;
            state.last = None;
            state.requested.clear();
        }
        self.refresh();
    }

    fn refresh(&self) {
        if self.cancelled.get() {
            return;
        }
        let span = debug_span!(
            target: "sliceview.viewer",
            "sliceview.viewer.refresh",
            viewer = S::NAME
        );
        let _entered = span.enter();

        let key = self.state.borrow().key.clone();
        let mut loads = Vec::new();
        let computed = self.source.compute(&self.ctx, &self.config, &key, &mut loads);

        let (delivery, fresh_loads) = {
            let mut state = self.state.borrow_mut();
            if state.key != key {
                return;
            }
            let snapshot = match &state.last {
                Some(last) if self.config.monotonic => {
                    computed.refined_by(last, self.ctx.directory.as_ref())
                }
                _ => computed,
            };
            let deliver = match &state.last {
                Some(last) if *last == snapshot => false,
                Some(last)
                    if self.config.monotonic
                        && retracts(last, &snapshot)
                        && last.same_items(&snapshot) =>
                {
                    debug!(
                        target: "sliceview.viewer",
                        viewer = S::NAME,
                        previous = ?last.known_counts(),
                        next = ?snapshot.known_counts(),
                        "snapshot withheld: it would forget known counts"
                    );
                    false
                }
                _ => true,
            };
            if deliver {
                state.requested.clear();
                state.last = Some(snapshot.clone());
            }
            let fresh_loads: Vec<LoadRequest> = if self.config.request_loads {
                loads
                    .into_iter()
                    .filter(|load| state.requested.insert(*load))
                    .collect()
            } else {
                Vec::new()
            };
            (deliver.then_some(snapshot), fresh_loads)
        };

        if let Some(snapshot) = delivery {
            let [full_count, skipped_before, skipped_after] = snapshot.known_counts();
            debug!(
                target: "sliceview.viewer",
                viewer = S::NAME,
                ?full_count,
                ?skipped_before,
                ?skipped_after,
                "snapshot delivered"
            );
            (self.sink)(&snapshot);
        }

        if let Some(requester) = &self.ctx.requester {
            for load in fresh_loads {
                if self.cancelled.get() {
                    return;
                }
                debug!(target: "sliceview.store", ?load, "load requested");
                requester.request(load);
            }
        }
    }
}

fn start<S: Source>(
    source: S,
    ctx: &ViewerContext,
    key: S::Key,
    config: &ViewerConfig,
    sink: Box<dyn Fn(&S::Snapshot)>,
) -> (Rc<Driver<S>>, ViewerHandle) {
    let cancelled = Rc::new(Cell::new(false));
    let driver = Rc::new(Driver {
        source,
        ctx: ctx.clone(),
        config: config.clone(),
        sink,
        state: RefCell::new(DriverState {
            key,
            last: None,
            requested: AHashSet::new(),
        }),
        seen_revision: Cell::new(ctx.store.revision()),
        cancelled: Rc::clone(&cancelled),
    });
    let subscription = {
        let driver = Rc::clone(&driver);
        ctx.store.subscribe(move |revision| driver.on_store(revision))
    };
    info!(target: "sliceview.viewer", viewer = S::NAME, "viewer started");
    let handle = ViewerHandle {
        cancelled,
        subscriptions: vec![subscription],
    };
    driver.refresh();
    (driver, handle)
}

/// Live window over one peer's list.
pub fn sparse_viewer(
    ctx: &ViewerContext,
    key: SharedMediaKey,
    config: &ViewerConfig,
    sink: impl Fn(&SparseIdsSlice) + 'static,
) -> ViewerHandle {
    start(SparseSource, ctx, key, config, Box::new(sink)).1
}

/// Live window over a peer's history merged with its migrated history.
pub fn merged_viewer(
    ctx: &ViewerContext,
    key: SharedMediaMergedKey,
    config: &ViewerConfig,
    sink: impl Fn(&MergedSlice) + 'static,
) -> ViewerHandle {
    start(MergedSource, ctx, key, config, Box::new(sink)).1
}

/// Live merged window with the peer photo as the newest item, oldest first.
pub fn with_last_viewer(
    ctx: &ViewerContext,
    key: Key,
    config: &ViewerConfig,
    sink: impl Fn(&WithLastSlice) + 'static,
) -> ViewerHandle {
    start(WithLastSource { reversed: false }, ctx, key, config, Box::new(sink)).1
}

/// [`with_last_viewer`] delivering newest-first snapshots.
pub fn with_last_reversed_viewer(
    ctx: &ViewerContext,
    key: Key,
    config: &ViewerConfig,
    sink: impl Fn(&WithLastSlice) + 'static,
) -> ViewerHandle {
    start(WithLastSource { reversed: true }, ctx, key, config, Box::new(sink)).1
}

/// [`with_last_viewer`] that follows `keys`, restarting its baseline on
/// every key change.
pub fn with_last_viewer_keyed(
    ctx: &ViewerContext,
    keys: &Observable<Key>,
    config: &ViewerConfig,
    sink: impl Fn(&WithLastSlice) + 'static,
) -> ViewerHandle {
    let (driver, mut handle) = start(
        WithLastSource { reversed: false },
        ctx,
        keys.get(),
        config,
        Box::new(sink),
    );
    let subscription = keys.subscribe(move |key| driver.set_key(*key));
    handle.subscriptions.push(subscription);
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use sliceview_core::{
        MemoryDirectory, MergedKey, MsgRange, PeerId, PeerPhoto, SERVER_MAX_MSG_ID,
        SharedMediaType, UniversalMsgId,
    };

    const PEER: PeerId = PeerId::channel(5);

    fn context() -> (ViewerContext, Rc<MemoryDirectory>) {
        let directory = Rc::new(MemoryDirectory::new());
        let ctx = ViewerContext::new(SparseIdsStore::new(), directory.clone());
        (ctx, directory)
    }

    fn collect<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        (seen, move |snapshot: &T| seen_clone.borrow_mut().push(snapshot.clone()))
    }

    #[test]
    fn retraction_detection() {
        let known = SparseIdsSlice::new([1], MsgRange::FULL, Some(1), Some(0), Some(0));
        let forgotten = SparseIdsSlice::new([1], MsgRange::FULL, None, Some(0), None);
        assert!(retracts(&known, &forgotten));
        assert!(!retracts(&forgotten, &known));
        assert!(!retracts(&known, &known));
    }

    #[test]
    fn sparse_viewer_emits_initial_and_changed_snapshots() {
        let (ctx, _) = context();
        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);

        let (seen, sink) = collect::<SparseIdsSlice>();
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let _handle = sparse_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].known_ids(), &[1, 2, 3]);

        // Another type of the same peer does not wake this viewer.
        ctx.store
            .add_slice(ListKey::new(PEER, SharedMediaType::File), &[9], MsgRange::FULL, None);
        assert_eq!(seen.borrow().len(), 1);

        ctx.store.add_new(PEER, SharedMediaType::Photo.into(), 4);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].known_ids(), &[1, 2, 3, 4]);
    }

    #[test]
    fn monotonic_gate_withholds_retractions() {
        let (ctx, _) = context();
        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);

        let (seen, sink) = collect::<SparseIdsSlice>();
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let _handle = sparse_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);

        ctx.store.invalidate_bottom(PEER);
        assert_eq!(seen.borrow().len(), 1);

        ctx.store.add_slice(list, &[3, 4], MsgRange::new(3, SERVER_MAX_MSG_ID), Some(4));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].full_count(), Some(4));
    }

    #[test]
    fn removal_after_invalidation_keeps_known_counts() {
        let (ctx, _) = context();
        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);

        let (seen, sink) = collect::<SparseIdsSlice>();
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let _handle = sparse_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);

        ctx.store.invalidate_bottom(PEER);
        ctx.store.remove_one(PEER, SharedMediaType::Photo.into(), 2);
        assert_eq!(seen.borrow().len(), 2);
        let latest = seen.borrow()[1].clone();
        assert_eq!(latest.known_ids(), &[1, 3]);
        assert_eq!(latest.skipped_before(), Some(0));
        assert_eq!(latest.skipped_after(), Some(0));
        assert_eq!(latest.full_count(), Some(2));
    }

    #[test]
    fn item_change_is_delivered_even_when_it_forgets_counts() {
        let (ctx, _) = context();
        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);

        let (seen, sink) = collect::<SparseIdsSlice>();
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let _handle = sparse_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);

        // The newest id goes away, so the count measured from it cannot stay.
        ctx.store.invalidate_bottom(PEER);
        ctx.store.remove_one(PEER, SharedMediaType::Photo.into(), 3);
        assert_eq!(seen.borrow().len(), 2);
        let latest = seen.borrow()[1].clone();
        assert_eq!(latest.known_ids(), &[1, 2]);
        assert_eq!(latest.skipped_after(), None);
        assert_eq!(latest.full_count(), None);
    }

    #[test]
    fn gate_can_be_disabled() {
        let (ctx, _) = context();
        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);

        let (seen, sink) = collect::<SparseIdsSlice>();
        let config = ViewerConfig {
            monotonic: false,
            ..ViewerConfig::with_limits(5, 5)
        };
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let _handle = sparse_viewer(&ctx, key, &config, sink);

        ctx.store.invalidate_bottom(PEER);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].full_count(), None);
    }

    #[test]
    fn dropped_handle_stops_delivery() {
        let (ctx, _) = context();
        let (seen, sink) = collect::<SparseIdsSlice>();
        let key = SharedMediaKey::new(PEER, SharedMediaType::Photo, 2);
        let handle = sparse_viewer(&ctx, key, &ViewerConfig::default(), sink);
        assert!(handle.is_active());
        handle.cancel();

        let list = ListKey::new(PEER, SharedMediaType::Photo);
        ctx.store.add_slice(list, &[1, 2, 3], MsgRange::FULL, None);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn merged_viewer_reads_both_peers() {
        let (ctx, _) = context();
        let migrated = PeerId::chat(6);
        ctx.store.add_slice(
            ListKey::new(migrated, SharedMediaType::Video),
            &[1, 2],
            MsgRange::FULL,
            None,
        );
        ctx.store.add_slice(
            ListKey::new(PEER, SharedMediaType::Video),
            &[1, 2, 3],
            MsgRange::FULL,
            None,
        );

        let (seen, sink) = collect::<MergedSlice>();
        let key = SharedMediaMergedKey::new(
            MergedKey::new(PEER, Some(migrated), 1),
            SharedMediaType::Video,
        );
        let _handle = merged_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);
        let snapshot = seen.borrow()[0].clone();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.full_count(), Some(5));

        ctx.store.add_new(migrated, SharedMediaType::Video.into(), 3);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn reversed_viewer_puts_photo_first() {
        let (ctx, directory) = context();
        directory.set_peer_photo(PEER, PeerPhoto::Photo(99));
        ctx.store.add_slice(
            ListKey::new(PEER, SharedMediaType::ChatPhoto),
            &[1, 2, 3],
            MsgRange::FULL,
            None,
        );

        let (seen, sink) = collect::<WithLastSlice>();
        let key = Key::new(
            PEER,
            None,
            SharedMediaType::ChatPhoto,
            UniversalMsgId::Message(2),
        );
        let _handle = with_last_reversed_viewer(&ctx, key, &ViewerConfig::with_limits(5, 5), sink);
        let snapshot = seen.borrow()[0].clone();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.at(0), sliceview_core::Value::Photo(99));
        assert!(snapshot.is_reversed());
    }
}
