#![forbid(unsafe_code)]

//! One continuous sequence over a peer's history and the history it
//! inherited from a migrated predecessor.
//!
//! The merged index space puts the migrated range first (it is older) and
//! the primary range after it. Universal ids address both: non-negative
//! values are primary ids, negative values count back from
//! [`SERVER_MAX_MSG_ID`] into the migrated range.
//!
//! When the anchor sits deep inside one range and the loaded window does
//! not reach the seam between the two, the other range is *isolated*: it
//! contributes only its full count to the skipped side and nothing to the
//! window.

use crate::count::{Count, add_known, signed_distance};
use crate::ids::{
    FullMsgId, MsgId, PeerId, SERVER_MAX_MSG_ID, is_server_msg_id, migrated_local_id,
};
use crate::sparse::SparseIdsSlice;

/// Identifies a merged view: the primary peer, its optional migrated
/// predecessor, and a universal anchor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergedKey {
    pub peer_id: PeerId,
    pub migrated_peer_id: Option<PeerId>,
    pub universal_id: MsgId,
}

impl MergedKey {
    /// # Panics
    ///
    /// Panics if the anchor is invalid, see [`MergedKey::is_valid`].
    #[must_use]
    pub fn new(peer_id: PeerId, migrated_peer_id: Option<PeerId>, universal_id: MsgId) -> Self {
        let key = Self {
            peer_id,
            migrated_peer_id,
            universal_id,
        };
        assert!(
            key.is_valid(),
            "merged key anchor {universal_id} is not addressable for {peer_id} \
             (migrated: {migrated_peer_id:?})"
        );
        key
    }

    /// The anchor is a server id, 0, or a migrated id with a migrated peer.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_server_msg_id(self.universal_id)
            || self.universal_id == 0
            || (migrated_local_id(self.universal_id).is_some() && self.migrated_peer_id.is_some())
    }

    /// Anchor to use inside the primary list.
    #[must_use]
    pub const fn part_key(universal_id: MsgId) -> MsgId {
        if universal_id < 0 { 1 } else { universal_id }
    }

    /// Anchor to use inside the migrated list.
    #[must_use]
    pub const fn migrated_key(universal_id: MsgId) -> MsgId {
        if universal_id < 0 {
            SERVER_MAX_MSG_ID + universal_id
        } else if universal_id > 0 {
            SERVER_MAX_MSG_ID - 1
        } else {
            0
        }
    }

    /// Flat identity of the anchored message.
    #[must_use]
    pub fn compute_id(&self) -> FullMsgId {
        compute_message_id(self.peer_id, self.migrated_peer_id, self.universal_id)
    }
}

/// Qualifies a universal id against the primary or migrated peer.
pub(crate) fn compute_message_id(
    peer_id: PeerId,
    migrated_peer_id: Option<PeerId>,
    universal_id: MsgId,
) -> FullMsgId {
    if universal_id >= 0 {
        FullMsgId::of_peer(peer_id, universal_id)
    } else {
        FullMsgId::of_peer(
            migrated_peer_id.unwrap_or(PeerId::NONE),
            SERVER_MAX_MSG_ID + universal_id,
        )
    }
}

/// Window over the merged primary + migrated sequence.
///
/// Owns nothing beyond the two input snapshots; every count and index is
/// derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSlice {
    key: MergedKey,
    part: SparseIdsSlice,
    migrated: Option<SparseIdsSlice>,
}

impl MergedSlice {
    #[must_use]
    pub fn new(key: MergedKey, part: SparseIdsSlice, migrated: Option<SparseIdsSlice>) -> Self {
        Self {
            key,
            part,
            migrated,
        }
    }

    /// Nothing loaded yet: every count is unknown.
    #[must_use]
    pub fn empty(key: MergedKey) -> Self {
        let migrated = key.migrated_peer_id.map(|_| SparseIdsSlice::default());
        Self::new(key, SparseIdsSlice::default(), migrated)
    }

    #[must_use]
    pub fn key(&self) -> &MergedKey {
        &self.key
    }

    #[must_use]
    pub fn part(&self) -> &SparseIdsSlice {
        &self.part
    }

    #[must_use]
    pub fn migrated(&self) -> Option<&SparseIdsSlice> {
        self.migrated.as_ref()
    }

    #[must_use]
    pub fn full_count(&self) -> Count {
        add_known(
            self.part.full_count(),
            self.migrated.as_ref().map_or(Some(0), SparseIdsSlice::full_count),
        )
    }

    #[must_use]
    pub fn skipped_before(&self) -> Count {
        let part = if self.isolated_in_migrated() {
            Some(0)
        } else {
            self.part.skipped_before()
        };
        let migrated = match &self.migrated {
            Some(migrated) if self.isolated_in_part() => migrated.full_count(),
            Some(migrated) => migrated.skipped_before(),
            None => Some(0),
        };
        add_known(part, migrated)
    }

    #[must_use]
    pub fn skipped_after(&self) -> Count {
        let part = if self.isolated_in_migrated() {
            self.part.full_count()
        } else {
            self.part.skipped_after()
        };
        let migrated = if self.isolated_in_part() {
            Some(0)
        } else {
            self.migrated
                .as_ref()
                .map_or(Some(0), SparseIdsSlice::skipped_after)
        };
        add_known(part, migrated)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let part = if self.isolated_in_migrated() {
            0
        } else {
            self.part.len()
        };
        self.migrated_len() + part
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of `id` in the merged window, if loaded.
    #[must_use]
    pub fn index_of(&self, id: FullMsgId) -> Option<usize> {
        if self.is_from_part(id) {
            if self.isolated_in_migrated() {
                return None;
            }
            self.part
                .index_of(id.msg)
                .map(|index| index + self.migrated_len())
        } else if self.isolated_in_part() || !self.is_from_migrated(id) {
            None
        } else {
            self.migrated.as_ref()?.index_of(id.msg)
        }
    }

    /// Message at `index` of the merged window.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn at(&self, index: usize) -> FullMsgId {
        let len = self.len();
        assert!(
            index < len,
            "merged slice index {index} out of range for window of {len}"
        );
        let migrated_len = self.migrated_len();
        match &self.migrated {
            Some(migrated) if index < migrated_len => FullMsgId::of_peer(
                self.key.migrated_peer_id.unwrap_or(PeerId::NONE),
                migrated.at(index),
            ),
            _ => FullMsgId::of_peer(self.key.peer_id, self.part.at(index - migrated_len)),
        }
    }

    /// Signed offset between the anchors of two keys, when both are loaded.
    #[must_use]
    pub fn distance(&self, a: &MergedKey, b: &MergedKey) -> Option<isize> {
        signed_distance(self.index_of(a.compute_id()), self.index_of(b.compute_id()))
    }

    /// Loaded universal id closest to `universal_id`, see
    /// [`SparseIdsSlice::nearest`].
    #[must_use]
    pub fn nearest(&self, universal_id: MsgId) -> Option<MsgId> {
        let from_migrated = |local: MsgId| local - SERVER_MAX_MSG_ID;
        if is_server_msg_id(universal_id) {
            if let Some(nearest) = self.part.nearest(universal_id) {
                return Some(nearest);
            }
            if self.isolated_in_part() {
                return None;
            }
            return self
                .migrated
                .as_ref()?
                .nearest(SERVER_MAX_MSG_ID - 1)
                .map(from_migrated);
        }
        let migrated_nearest = self
            .migrated
            .as_ref()
            .and_then(|migrated| migrated.nearest(SERVER_MAX_MSG_ID + universal_id));
        if let Some(nearest) = migrated_nearest {
            return Some(from_migrated(nearest));
        }
        if self.isolated_in_migrated() {
            return None;
        }
        self.part.nearest(0)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = FullMsgId> + '_ {
        (0..self.len()).map(|index| self.at(index))
    }

    /// [`SparseIdsSlice::refined_by`] applied to both inputs.
    #[must_use]
    pub fn refined_by(self, previous: &Self) -> Self {
        let part = self.part.refined_by(&previous.part);
        let migrated = match (self.migrated, &previous.migrated) {
            (Some(migrated), Some(old)) => Some(migrated.refined_by(old)),
            (migrated, _) => migrated,
        };
        Self::new(self.key, part, migrated)
    }

    fn is_from_part(&self, id: FullMsgId) -> bool {
        id.channel == FullMsgId::of_peer(self.key.peer_id, 0).channel
    }

    fn is_from_migrated(&self, id: FullMsgId) -> bool {
        self.key
            .migrated_peer_id
            .is_some_and(|peer| id.channel == FullMsgId::of_peer(peer, 0).channel)
    }

    /// The anchor is a primary id and the window does not reach back into
    /// migrated history.
    fn isolated_in_part(&self) -> bool {
        is_server_msg_id(self.key.universal_id)
            && (self.migrated.is_none() || self.part.skipped_before() != Some(0))
    }

    /// The anchor is a migrated id and the window does not reach forward
    /// into primary history.
    fn isolated_in_migrated(&self) -> bool {
        migrated_local_id(self.key.universal_id).is_some()
            && self
                .migrated
                .as_ref()
                .is_some_and(|migrated| migrated.skipped_after() != Some(0))
    }

    fn migrated_len(&self) -> usize {
        if self.isolated_in_part() {
            0
        } else {
            self.migrated.as_ref().map_or(0, SparseIdsSlice::len)
        }
    }
}
