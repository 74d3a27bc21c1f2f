#![forbid(unsafe_code)]

//! In-memory sparse id lists, one per peer and media type.
//!
//! A [`SparseIdsList`] remembers which id ranges are known to have no gaps
//! ("no-skip" ranges) and which ids were seen inside them. Queries cut a
//! window out of the range containing the anchor and report how much is
//! known to lie on either side.
//!
//! [`SparseIdsStore`] owns the lists of every peer and announces each
//! mutation as a [`StoreEvent`] to subscribers. Viewers rebuild their
//! snapshots from the store when notified.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use sliceview_core::count::Count;
use sliceview_core::{
    MsgId, MsgRange, PeerId, SERVER_MAX_MSG_ID, SharedMediaKey, SharedMediaType, SharedMediaTypes,
    SparseIdsSlice,
};
use tracing::debug;

use crate::reactive::{Observable, Subscription};

/// Contiguous no-skip range and the ids seen inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListSlice {
    ids: Vec<MsgId>,
    range: MsgRange,
}

impl ListSlice {
    fn merge(&mut self, ids: &[MsgId], range: MsgRange) {
        self.ids.extend_from_slice(ids);
        self.ids.sort_unstable();
        self.ids.dedup();
        self.range.from = self.range.from.min(range.from);
        self.range.till = self.range.till.max(range.till);
    }
}

/// Known ids of one peer's media list, in disjoint ascending ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseIdsList {
    slices: Vec<ListSlice>,
    count: Count,
}

impl SparseIdsList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of ids in the list, if the server reported it.
    #[must_use]
    pub fn count(&self) -> Count {
        self.count
    }

    /// Number of disjoint no-skip ranges.
    #[must_use]
    pub fn range_count(&self) -> usize {
        self.slices.len()
    }

    /// A freshly arrived id. It is the newest, so its range reaches the end.
    ///
    /// Returns the number of ids in the newest range.
    pub fn add_new(&mut self, id: MsgId) -> usize {
        let range = MsgRange::new(id, SERVER_MAX_MSG_ID);
        let unite_from = self.slices.partition_point(|slice| slice.range.till < id);
        if unite_from < self.slices.len() {
            let end = self.slices.len();
            self.unite_and_add(unite_from, end, &[id], range);
        } else {
            self.slices.push(ListSlice {
                ids: vec![id],
                range,
            });
        }
        if let Some(count) = self.count.as_mut() {
            *count += 1;
        }
        self.slices.last().map_or(0, |slice| slice.ids.len())
    }

    /// An id loaded together with the no-skip range around it.
    ///
    /// Returns the number of ids in the range it landed in, or 0 if the
    /// range is empty.
    pub fn add_existing(&mut self, id: MsgId, range: MsgRange) -> usize {
        self.add_range(&[id], range, None)
    }

    /// A server answer: `ids` cover `range` without gaps.
    pub fn add_slice(&mut self, ids: &[MsgId], range: MsgRange, count: Count) {
        self.add_range(ids, range, count);
    }

    pub fn remove_one(&mut self, id: MsgId) {
        let index = self.slices.partition_point(|slice| slice.range.till < id);
        if let Some(slice) = self.slices.get_mut(index)
            && slice.range.from <= id
            && let Ok(position) = slice.ids.binary_search(&id)
        {
            slice.ids.remove(position);
        }
        if let Some(count) = self.count.as_mut() {
            *count = count.saturating_sub(1);
        }
    }

    /// The list is known to be empty.
    pub fn remove_all(&mut self) {
        self.slices = vec![ListSlice {
            ids: Vec::new(),
            range: MsgRange::FULL,
        }];
        self.count = Some(0);
    }

    /// Newer ids may exist that were never announced: the newest range no
    /// longer reaches the end and the total is unknown again.
    pub fn invalidate_bottom(&mut self) {
        if let Some(last) = self.slices.last_mut()
            && last.range.till == SERVER_MAX_MSG_ID
        {
            last.range.till = last.ids.last().copied().unwrap_or(last.range.from);
        }
        self.count = None;
    }

    /// Window of at most `before` ids older than `around` and `after + 1`
    /// ids at or newer than it.
    ///
    /// Skipped counts are known when the range reaches the corresponding
    /// end, or can be derived from the total count. Anchor 0, or an anchor
    /// outside every known range, yields no ids and only the total count.
    #[must_use]
    pub fn query(&self, around: MsgId, before: usize, after: usize) -> SparseIdsSlice {
        let found = (around != 0)
            .then(|| self.slices.partition_point(|slice| slice.range.till < around))
            .and_then(|index| self.slices.get(index))
            .filter(|slice| slice.range.from <= around);
        let Some(slice) = found else {
            return SparseIdsSlice::new(
                Vec::new(),
                MsgRange::new(around, around),
                self.count,
                None,
                None,
            );
        };

        let position = slice.ids.partition_point(|&id| id < around);
        let have_before = position;
        let have_equal_or_after = slice.ids.len() - position;
        let take_before = have_before.min(before);
        let take_after = have_equal_or_after.min(after.saturating_add(1));
        let ids = &slice.ids[position - take_before..position + take_after];

        let mut skipped_before =
            slice.range.reaches_oldest().then_some(have_before - take_before);
        let mut skipped_after = slice
            .range
            .reaches_newest()
            .then_some(have_equal_or_after - take_after);
        if let Some(count) = self.count {
            match (skipped_before, skipped_after) {
                (None, Some(after)) => {
                    skipped_before = count.checked_sub(after + ids.len());
                }
                (Some(before), None) => {
                    skipped_after = count.checked_sub(before + ids.len());
                }
                _ => {}
            }
        }
        SparseIdsSlice::new(
            ids.iter().copied(),
            slice.range,
            self.count,
            skipped_before,
            skipped_after,
        )
    }

    fn add_range(&mut self, ids: &[MsgId], range: MsgRange, count: Count) -> usize {
        if count.is_some() {
            self.count = count;
        }
        if range.from > range.till {
            return 0;
        }
        let unite_from = self.slices.partition_point(|slice| slice.range.till < range.from);
        let unite_till = self.slices.partition_point(|slice| slice.range.from <= range.till);
        let index = if unite_from < unite_till {
            self.unite_and_add(unite_from, unite_till, ids, range)
        } else {
            let mut sorted = ids.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            self.slices.insert(unite_from, ListSlice { ids: sorted, range });
            unite_from
        };
        if self.slices.len() == 1 && self.slices[0].range == MsgRange::FULL {
            self.count = Some(self.slices[0].ids.len());
        }
        self.slices[index].ids.len()
    }

    /// Folds `slices[from..till]` and the new ids into `slices[from]`.
    fn unite_and_add(&mut self, from: usize, till: usize, ids: &[MsgId], range: MsgRange) -> usize {
        let absorbed: Vec<ListSlice> = self.slices.drain(from + 1..till).collect();
        let front = &mut self.slices[from];
        front.merge(ids, range);
        for slice in absorbed {
            front.merge(&slice.ids, slice.range);
        }
        from
    }
}

/// Identity of one list inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub peer_id: PeerId,
    pub media_type: SharedMediaType,
}

impl ListKey {
    #[must_use]
    pub const fn new(peer_id: PeerId, media_type: SharedMediaType) -> Self {
        Self {
            peer_id,
            media_type,
        }
    }
}

impl From<SharedMediaKey> for ListKey {
    fn from(key: SharedMediaKey) -> Self {
        Self::new(key.peer_id, key.media_type)
    }
}

/// One mutation of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    NewAdded {
        peer_id: PeerId,
        types: SharedMediaTypes,
        id: MsgId,
    },
    ExistingAdded {
        peer_id: PeerId,
        types: SharedMediaTypes,
        id: MsgId,
        range: MsgRange,
    },
    SliceAdded {
        key: ListKey,
        loaded: usize,
        range: MsgRange,
        count: Count,
    },
    OneRemoved {
        peer_id: PeerId,
        types: SharedMediaTypes,
        id: MsgId,
    },
    AllRemoved {
        peer_id: PeerId,
        types: SharedMediaTypes,
    },
    BottomInvalidated {
        peer_id: PeerId,
    },
    /// Entity data of the peer (such as its photo) changed.
    PeerUpdated {
        peer_id: PeerId,
    },
}

impl StoreEvent {
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        match self {
            Self::NewAdded { peer_id, .. }
            | Self::ExistingAdded { peer_id, .. }
            | Self::OneRemoved { peer_id, .. }
            | Self::AllRemoved { peer_id, .. }
            | Self::BottomInvalidated { peer_id }
            | Self::PeerUpdated { peer_id } => *peer_id,
            Self::SliceAdded { key, .. } => key.peer_id,
        }
    }

    /// Whether the event can change the answer of a query on `key`.
    #[must_use]
    pub fn touches(&self, key: ListKey) -> bool {
        if self.peer_id() != key.peer_id {
            return false;
        }
        match self {
            Self::NewAdded { types, .. }
            | Self::ExistingAdded { types, .. }
            | Self::OneRemoved { types, .. }
            | Self::AllRemoved { types, .. } => types.has(key.media_type),
            Self::SliceAdded { key: touched, .. } => *touched == key,
            Self::BottomInvalidated { .. } | Self::PeerUpdated { .. } => true,
        }
    }
}

/// Latest store mutation, numbered so every mutation is a distinct value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreRevision {
    pub revision: u64,
    pub event: Option<StoreEvent>,
}

struct StoreInner {
    lists: RefCell<AHashMap<ListKey, SparseIdsList>>,
    changes: Observable<StoreRevision>,
}

/// Shared handle to every peer's sparse id lists.
///
/// Clones share state. Mutations notify subscribers through an
/// [`Observable`], so they honor an open
/// [`BatchScope`](crate::reactive::BatchScope).
#[derive(Clone)]
pub struct SparseIdsStore {
    inner: Rc<StoreInner>,
}

impl std::fmt::Debug for SparseIdsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseIdsStore")
            .field("lists", &self.inner.lists.borrow().len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl Default for SparseIdsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseIdsStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                lists: RefCell::new(AHashMap::new()),
                changes: Observable::new(StoreRevision::default()),
            }),
        }
    }

    /// Number of mutations so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.changes.with(|latest| latest.revision)
    }

    /// Call `callback` after every mutation until the guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&StoreRevision) + 'static) -> Subscription {
        self.inner.changes.subscribe(callback)
    }

    pub fn add_new(&self, peer_id: PeerId, types: SharedMediaTypes, id: MsgId) {
        self.for_each_list(peer_id, types, |list| {
            list.add_new(id);
        });
        self.publish(StoreEvent::NewAdded { peer_id, types, id });
    }

    pub fn add_existing(
        &self,
        peer_id: PeerId,
        types: SharedMediaTypes,
        id: MsgId,
        range: MsgRange,
    ) {
        self.for_each_list(peer_id, types, |list| {
            list.add_existing(id, range);
        });
        self.publish(StoreEvent::ExistingAdded {
            peer_id,
            types,
            id,
            range,
        });
    }

    pub fn add_slice(&self, key: ListKey, ids: &[MsgId], range: MsgRange, count: Count) {
        self.inner
            .lists
            .borrow_mut()
            .entry(key)
            .or_default()
            .add_slice(ids, range, count);
        self.publish(StoreEvent::SliceAdded {
            key,
            loaded: ids.len(),
            range,
            count,
        });
    }

    pub fn remove_one(&self, peer_id: PeerId, types: SharedMediaTypes, id: MsgId) {
        self.for_each_list(peer_id, types, |list| list.remove_one(id));
        self.publish(StoreEvent::OneRemoved { peer_id, types, id });
    }

    pub fn remove_all(&self, peer_id: PeerId, types: SharedMediaTypes) {
        self.for_each_list(peer_id, types, SparseIdsList::remove_all);
        self.publish(StoreEvent::AllRemoved { peer_id, types });
    }

    /// Invalidates the newest end of every list of `peer_id`.
    pub fn invalidate_bottom(&self, peer_id: PeerId) {
        {
            let mut lists = self.inner.lists.borrow_mut();
            for (_, list) in lists.iter_mut().filter(|(key, _)| key.peer_id == peer_id) {
                list.invalidate_bottom();
            }
        }
        self.publish(StoreEvent::BottomInvalidated { peer_id });
    }

    /// Wakes viewers of `peer_id` after its entity data changed.
    pub fn peer_updated(&self, peer_id: PeerId) {
        self.publish(StoreEvent::PeerUpdated { peer_id });
    }

    /// Window around `key.message_id`. A list never touched answers like an
    /// empty one with unknown count.
    #[must_use]
    pub fn query(&self, key: SharedMediaKey, before: usize, after: usize) -> SparseIdsSlice {
        let lists = self.inner.lists.borrow();
        match lists.get(&ListKey::from(key)) {
            Some(list) => list.query(key.message_id, before, after),
            None => SparseIdsList::new().query(key.message_id, before, after),
        }
    }

    /// Total count of one list, if known.
    #[must_use]
    pub fn count(&self, key: ListKey) -> Count {
        self.inner
            .lists
            .borrow()
            .get(&key)
            .and_then(SparseIdsList::count)
    }

    fn for_each_list(
        &self,
        peer_id: PeerId,
        types: SharedMediaTypes,
        mut apply: impl FnMut(&mut SparseIdsList),
    ) {
        let mut lists = self.inner.lists.borrow_mut();
        for media_type in types.types() {
            apply(lists.entry(ListKey::new(peer_id, media_type)).or_default());
        }
    }

    fn publish(&self, event: StoreEvent) {
        debug!(target: "sliceview.store", ?event, "store mutated");
        let revision = self.revision() + 1;
        self.inner.changes.set(StoreRevision {
            revision,
            event: Some(event),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const PEER: PeerId = PeerId::channel(3);

    fn list_with(ids: &[MsgId], range: MsgRange, count: Count) -> SparseIdsList {
        let mut list = SparseIdsList::new();
        list.add_slice(ids, range, count);
        list
    }

    #[test]
    fn query_inside_a_middle_range_leaves_sides_unknown() {
        let list = list_with(&[10, 12, 14, 16, 18], MsgRange::new(9, 20), None);
        let slice = list.query(14, 1, 1);

        assert_eq!(slice.known_ids(), &[12, 14, 16]);
        assert_eq!(slice.skipped_before(), None);
        assert_eq!(slice.skipped_after(), None);
        assert_eq!(slice.full_count(), None);
    }

    #[test]
    fn query_at_edges_knows_skipped_counts() {
        let list = list_with(&[1, 2, 3, 4, 5], MsgRange::FULL, None);
        assert_eq!(list.count(), Some(5));

        let slice = list.query(3, 1, 0);
        assert_eq!(slice.known_ids(), &[2, 3]);
        assert_eq!(slice.skipped_before(), Some(1));
        assert_eq!(slice.skipped_after(), Some(2));
        assert_eq!(slice.full_count(), Some(5));
    }

    #[test]
    fn count_fills_in_the_missing_side() {
        let list = list_with(&[50, 60, 70], MsgRange::new(45, SERVER_MAX_MSG_ID), Some(30));
        let slice = list.query(60, 5, 5);

        assert_eq!(slice.skipped_after(), Some(0));
        assert_eq!(slice.skipped_before(), Some(27));
    }

    #[test]
    fn overlapping_slices_unite() {
        let mut list = list_with(&[1, 2], MsgRange::new(1, 5), None);
        list.add_slice(&[20], MsgRange::new(18, 22), None);
        assert_eq!(list.range_count(), 2);

        list.add_slice(&[4, 8, 19], MsgRange::new(4, 19), None);
        assert_eq!(list.range_count(), 1);
        assert_eq!(list.query(8, 10, 10).known_ids(), &[1, 2, 4, 8, 19, 20]);
    }

    #[test]
    fn add_new_extends_the_newest_range() {
        let mut list = list_with(&[5, 6], MsgRange::new(0, SERVER_MAX_MSG_ID), Some(2));
        assert_eq!(list.add_new(9), 3);
        assert_eq!(list.count(), Some(3));
        let slice = list.query(9, 10, 0);
        assert_eq!(slice.known_ids(), &[5, 6, 9]);
        assert_eq!(slice.skipped_after(), Some(0));
    }

    #[test]
    fn remove_one_and_remove_all() {
        let mut list = list_with(&[1, 2, 3], MsgRange::FULL, None);
        list.remove_one(2);
        assert_eq!(list.count(), Some(2));
        assert_eq!(list.query(1, 0, 5).known_ids(), &[1, 3]);

        list.remove_all();
        assert_eq!(list.count(), Some(0));
        let slice = list.query(1, 5, 5);
        assert!(slice.is_empty());
        assert_eq!(slice.skipped_before(), Some(0));
        assert_eq!(slice.skipped_after(), Some(0));
    }

    #[test]
    fn invalidate_bottom_forgets_the_newest_end() {
        let mut list = list_with(&[1, 2, 3], MsgRange::FULL, None);
        list.invalidate_bottom();
        assert_eq!(list.count(), None);

        let slice = list.query(3, 5, 5);
        assert_eq!(slice.known_ids(), &[1, 2, 3]);
        assert_eq!(slice.skipped_before(), Some(0));
        assert_eq!(slice.skipped_after(), None);
    }

    #[test]
    fn anchor_zero_or_outside_ranges_returns_count_only() {
        let list = list_with(&[10, 11], MsgRange::new(10, 11), Some(40));
        for around in [0, 5, 100] {
            let slice = list.query(around, 5, 5);
            assert!(slice.is_empty());
            assert_eq!(slice.full_count(), Some(40));
            assert_eq!(slice.skipped_before(), None);
        }
    }

    #[test]
    fn store_routes_type_sets_and_notifies() {
        let store = SparseIdsStore::new();
        let events = Rc::new(Cell::new(0u32));
        let events_clone = Rc::clone(&events);
        let _sub = store.subscribe(move |_| events_clone.set(events_clone.get() + 1));

        let photos = ListKey::new(PEER, SharedMediaType::Photo);
        let files = ListKey::new(PEER, SharedMediaType::File);
        store.add_slice(photos, &[1, 2], MsgRange::FULL, None);
        store.add_slice(files, &[1], MsgRange::FULL, None);
        store.add_new(PEER, SharedMediaTypes::PHOTO | SharedMediaTypes::FILE, 7);

        assert_eq!(store.count(photos), Some(3));
        assert_eq!(store.count(files), Some(2));
        assert_eq!(events.get(), 3);
        assert_eq!(store.revision(), 3);

        store.remove_all(PEER, SharedMediaTypes::FILE);
        assert_eq!(store.count(files), Some(0));
        assert_eq!(store.count(photos), Some(3));
    }

    #[test]
    fn events_know_which_lists_they_touch() {
        let photos = ListKey::new(PEER, SharedMediaType::Photo);
        let event = StoreEvent::NewAdded {
            peer_id: PEER,
            types: SharedMediaTypes::FILE,
            id: 1,
        };
        assert!(!event.touches(photos));
        assert!(StoreEvent::BottomInvalidated { peer_id: PEER }.touches(photos));
        assert!(!StoreEvent::PeerUpdated { peer_id: PeerId::user(1) }.touches(photos));
    }

    #[test]
    fn unknown_list_answers_empty() {
        let store = SparseIdsStore::new();
        let slice = store.query(SharedMediaKey::new(PEER, SharedMediaType::Gif, 5), 3, 3);
        assert!(slice.is_empty());
        assert_eq!(slice.full_count(), None);
    }
}
