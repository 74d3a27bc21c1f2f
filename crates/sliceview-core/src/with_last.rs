#![forbid(unsafe_code)]

//! Merged slice with the peer's current photo spliced in as the newest item.
//!
//! A chat's photo timeline is made of "photo changed" service messages, but
//! the photo the peer currently shows is not necessarily one of them (it
//! may have been set before the history starts, or the history may be
//! cleared). [`WithLastSlice`] presents that photo as the newest entry:
//!
//! - if the newest loaded message already carries the photo, nothing is
//!   added and the photo maps onto that message;
//! - otherwise the photo is *isolated* and occupies a slot of its own at
//!   the newest boundary, counted in `full_count` and, while the window
//!   does not reach the newest end, in `skipped_after`.
//!
//! Forward order is oldest-first, like [`MergedSlice`]. After
//! [`WithLastSlice::reverse`] the order is newest-first, so the isolated
//! slot becomes index 0.
//!
//! # Invariants
//!
//! 1. `len() == inner.len() + 1` exactly when the slot is present.
//! 2. `index_of(at(i)) == Some(i)` for every valid `i`.
//! 3. Whenever all counts are known,
//!    `skipped_before + len + skipped_after == full_count`.

use crate::count::{Count, add_known, signed_distance};
use crate::entity::{PeerDirectory, PeerPhoto};
use crate::error::KeyError;
use crate::ids::{
    FullMsgId, MsgId, PeerId, PhotoId, SERVER_MAX_MSG_ID, is_server_msg_id, migrated_local_id,
};
use crate::media::SharedMediaType;
use crate::merged::{MergedKey, MergedSlice, compute_message_id};

/// Anchor of a [`Key`]: a universal message id or the photo itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniversalMsgId {
    Message(MsgId),
    Photo(PhotoId),
}

/// Identity of one item of a [`WithLastSlice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Message(FullMsgId),
    Photo(PhotoId),
}

/// What is being viewed and where the view is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    peer_id: PeerId,
    migrated_peer_id: Option<PeerId>,
    media_type: SharedMediaType,
    universal_id: UniversalMsgId,
}

impl Key {
    /// # Panics
    ///
    /// Panics when the anchor is not valid for the media type or peers,
    /// see [`Key::try_new`].
    #[must_use]
    pub fn new(
        peer_id: PeerId,
        migrated_peer_id: Option<PeerId>,
        media_type: SharedMediaType,
        universal_id: UniversalMsgId,
    ) -> Self {
        match Self::try_new(peer_id, migrated_peer_id, media_type, universal_id) {
            Ok(key) => key,
            Err(error) => panic!("invalid shared media key: {error}"),
        }
    }

    /// Validates the anchor before building the key.
    pub fn try_new(
        peer_id: PeerId,
        migrated_peer_id: Option<PeerId>,
        media_type: SharedMediaType,
        universal_id: UniversalMsgId,
    ) -> Result<Self, KeyError> {
        match universal_id {
            UniversalMsgId::Photo(_) if media_type != SharedMediaType::ChatPhoto => {
                return Err(KeyError::PhotoAnchorForType { media_type });
            }
            UniversalMsgId::Photo(_) => {}
            UniversalMsgId::Message(id) if id < 0 => {
                if migrated_local_id(id).is_none() {
                    return Err(KeyError::InvalidAnchor { universal_id: id });
                }
                if migrated_peer_id.is_none() {
                    return Err(KeyError::MigratedAnchorWithoutPeer {
                        peer_id,
                        universal_id: id,
                    });
                }
            }
            UniversalMsgId::Message(id) => {
                if id != 0 && !is_server_msg_id(id) {
                    return Err(KeyError::InvalidAnchor { universal_id: id });
                }
            }
        }
        Ok(Self {
            peer_id,
            migrated_peer_id,
            media_type,
            universal_id,
        })
    }

    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    #[must_use]
    pub fn migrated_peer_id(&self) -> Option<PeerId> {
        self.migrated_peer_id
    }

    #[must_use]
    pub fn media_type(&self) -> SharedMediaType {
        self.media_type
    }

    #[must_use]
    pub fn universal_id(&self) -> UniversalMsgId {
        self.universal_id
    }

    /// Same key re-anchored at `universal_id`.
    ///
    /// # Panics
    ///
    /// Panics when the new anchor is invalid for this key.
    #[must_use]
    pub fn with_anchor(&self, universal_id: UniversalMsgId) -> Self {
        Self::new(
            self.peer_id,
            self.migrated_peer_id,
            self.media_type,
            universal_id,
        )
    }

    /// Key of the windowed merged view. Photo anchors start at the newest end.
    #[must_use]
    pub fn viewer_key(&self) -> MergedKey {
        let universal_id = match self.universal_id {
            UniversalMsgId::Message(id) => id,
            UniversalMsgId::Photo(_) => SERVER_MAX_MSG_ID - 1,
        };
        MergedKey::new(self.peer_id, self.migrated_peer_id, universal_id)
    }

    /// Key of the merged view anchored at the newest end.
    #[must_use]
    pub fn ending_key(&self) -> MergedKey {
        MergedKey::new(self.peer_id, self.migrated_peer_id, SERVER_MAX_MSG_ID - 1)
    }

    /// Whether a separate ending slice is needed to settle isolation.
    #[must_use]
    pub fn needs_ending(&self) -> bool {
        matches!(self.universal_id, UniversalMsgId::Message(_))
    }

    /// Flat identity of the anchored item.
    #[must_use]
    pub fn compute_id(&self) -> Value {
        match self.universal_id {
            UniversalMsgId::Message(id) => Value::Message(compute_message_id(
                self.peer_id,
                self.migrated_peer_id,
                id,
            )),
            UniversalMsgId::Photo(photo) => Value::Photo(photo),
        }
    }
}

/// Snapshot of a merged window with the last-item overlay applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithLastSlice {
    key: Key,
    slice: MergedSlice,
    ending: Option<MergedSlice>,
    last_photo: PeerPhoto,
    isolated_last_photo: Option<bool>,
    reversed: bool,
}

impl WithLastSlice {
    /// Resolves the peer photo and its isolation once, from `directory`.
    #[must_use]
    pub fn new(
        key: Key,
        slice: MergedSlice,
        ending: Option<MergedSlice>,
        directory: &dyn PeerDirectory,
    ) -> Self {
        let last_photo = directory.peer_photo(key.peer_id);
        let isolated_last_photo = if key.media_type == SharedMediaType::ChatPhoto {
            is_last_isolated(&slice, ending.as_ref(), last_photo, directory)
        } else {
            Some(false)
        };
        tracing::trace!(
            target: "sliceview.overlay",
            peer = %key.peer_id,
            media_type = key.media_type.as_str(),
            ?last_photo,
            ?isolated_last_photo,
            window = slice.len(),
            "overlay slice built"
        );
        Self {
            key,
            slice,
            ending,
            last_photo,
            isolated_last_photo,
            reversed: false,
        }
    }

    /// Nothing loaded yet.
    #[must_use]
    pub fn empty(key: Key, directory: &dyn PeerDirectory) -> Self {
        let ending = key
            .needs_ending()
            .then(|| MergedSlice::empty(key.ending_key()));
        Self::new(key, MergedSlice::empty(key.viewer_key()), ending, directory)
    }

    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The windowed merged slice, without the overlay.
    #[must_use]
    pub fn inner(&self) -> &MergedSlice {
        &self.slice
    }

    #[must_use]
    pub fn ending(&self) -> Option<&MergedSlice> {
        self.ending.as_ref()
    }

    #[must_use]
    pub fn last_photo(&self) -> PeerPhoto {
        self.last_photo
    }

    /// Whether the photo is absent from the history, if that is known.
    #[must_use]
    pub fn is_last_isolated(&self) -> Option<bool> {
        self.isolated_last_photo
    }

    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    #[must_use]
    pub fn full_count(&self) -> Count {
        add_known(self.slice.full_count(), self.last_photo_skip())
    }

    #[must_use]
    pub fn skipped_before(&self) -> Count {
        if self.reversed {
            self.skipped_after_impl()
        } else {
            self.skipped_before_impl()
        }
    }

    #[must_use]
    pub fn skipped_after(&self) -> Count {
        if self.reversed {
            self.skipped_before_impl()
        } else {
            self.skipped_after_impl()
        }
    }

    /// Position of `value`, if it is loaded.
    ///
    /// The photo maps onto the isolated slot, or onto the newest message
    /// when that message already carries it.
    #[must_use]
    pub fn index_of(&self, value: Value) -> Option<usize> {
        let len = self.len();
        let index = self.index_of_impl(value)?;
        if index >= len {
            tracing::warn!(
                target: "sliceview.overlay",
                index,
                len,
                ?value,
                "overlay index lookup landed outside the window"
            );
            return None;
        }
        Some(if self.reversed { len - 1 - index } else { index })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slice.len() + usize::from(self.isolated_slot().is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn at(&self, index: usize) -> Value {
        let len = self.len();
        assert!(
            index < len,
            "overlay slice index {index} out of range for window of {len}"
        );
        let index = if self.reversed { len - 1 - index } else { index };
        match self.isolated_slot() {
            Some(photo) if index == self.slice.len() => Value::Photo(photo),
            _ => Value::Message(self.slice.at(index)),
        }
    }

    /// Signed offset between the anchors of two keys, when both are loaded.
    #[must_use]
    pub fn distance(&self, a: &Key, b: &Key) -> Option<isize> {
        signed_distance(self.index_of(a.compute_id()), self.index_of(b.compute_id()))
    }

    /// Flips index interpretation in place; nothing is recomputed.
    pub fn reverse(&mut self) {
        self.reversed = !self.reversed;
    }

    /// Owned form of [`reverse`](Self::reverse).
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reverse();
        self
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Value> + '_ {
        (0..self.len()).map(|index| self.at(index))
    }

    /// Refines both merged windows against `previous`, then settles the
    /// overlay again. Orientation is kept.
    #[must_use]
    pub fn refined_by(self, previous: &Self, directory: &dyn PeerDirectory) -> Self {
        let slice = self.slice.refined_by(&previous.slice);
        let ending = match (self.ending, &previous.ending) {
            (Some(ending), Some(old)) => Some(ending.refined_by(old)),
            (ending, _) => ending,
        };
        let mut refined = Self::new(self.key, slice, ending, directory);
        refined.reversed = self.reversed;
        refined
    }

    /// The window already reaches the newest end of the history.
    fn window_reaches_end(&self) -> bool {
        self.slice.skipped_after() == Some(0)
    }

    fn last_photo_skip(&self) -> Count {
        self.isolated_last_photo.map(usize::from)
    }

    /// Photo occupying the extra slot, when the slot exists.
    fn isolated_slot(&self) -> Option<PhotoId> {
        if self.window_reaches_end() && self.isolated_last_photo == Some(true) {
            self.last_photo.photo_id()
        } else {
            None
        }
    }

    fn skipped_before_impl(&self) -> Count {
        self.slice.skipped_before()
    }

    fn skipped_after_impl(&self) -> Count {
        if self.window_reaches_end() {
            self.last_photo_skip().map(|_| 0)
        } else {
            add_known(self.slice.skipped_after(), self.last_photo_skip())
        }
    }

    fn index_of_impl(&self, value: Value) -> Option<usize> {
        match value {
            Value::Message(id) => self.slice.index_of(id),
            Value::Photo(photo) => {
                if !self.window_reaches_end() || self.last_photo.photo_id() != Some(photo) {
                    return None;
                }
                (self.slice.len() + self.last_photo_skip()?).checked_sub(1)
            }
        }
    }
}

/// Decides whether the peer photo is missing from the newest end of the
/// history. Unknown while the peer photo or the newest message is unknown.
fn is_last_isolated(
    slice: &MergedSlice,
    ending: Option<&MergedSlice>,
    last_photo: PeerPhoto,
    directory: &dyn PeerDirectory,
) -> Option<bool> {
    let photo = match last_photo {
        PeerPhoto::Unknown => return None,
        PeerPhoto::Empty => return Some(false),
        PeerPhoto::Photo(photo) => photo,
    };
    let newest = last_full_msg_id(ending.unwrap_or(slice))?;
    let newest_photo = if newest.is_empty() {
        None
    } else {
        directory.message_photo(newest)
    };
    Some(newest_photo != Some(photo))
}

/// Newest message of the history, `Some(empty)` for an empty history and
/// `None` while the newest end is not loaded.
fn last_full_msg_id(slice: &MergedSlice) -> Option<FullMsgId> {
    if slice.full_count() == Some(0) {
        Some(FullMsgId::default())
    } else if slice.is_empty() || slice.skipped_after() != Some(0) {
        None
    } else {
        Some(slice.at(slice.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MemoryDirectory;
    use crate::ids::MsgRange;
    use crate::sparse::SparseIdsSlice;

    const PEER: PeerId = PeerId::channel(77);
    const PHOTO: PhotoId = 42;

    fn key_at(id: MsgId) -> Key {
        Key::new(
            PEER,
            None,
            SharedMediaType::ChatPhoto,
            UniversalMsgId::Message(id),
        )
    }

    fn window(ids: &[MsgId], before: Count, after: Count) -> SparseIdsSlice {
        let full = add_known(add_known(before, Some(ids.len())), after);
        SparseIdsSlice::new(ids.iter().copied(), MsgRange::FULL, full, before, after)
    }

    fn merged(key: &Key, part: SparseIdsSlice) -> MergedSlice {
        MergedSlice::new(key.viewer_key(), part, None)
    }

    fn directory_with_photo(photo: PeerPhoto) -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        directory.set_peer_photo(PEER, photo);
        directory
    }

    #[test]
    fn isolated_photo_gets_a_slot_at_the_newest_end() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7, 8, 9, 10], Some(4), Some(0));
        let ending = merged(&key, part.clone());
        let slice = WithLastSlice::new(key, merged(&key, part), Some(ending), &directory);

        assert_eq!(slice.is_last_isolated(), Some(true));
        assert_eq!(slice.len(), 7);
        assert_eq!(slice.full_count(), Some(11));
        assert_eq!(slice.skipped_before(), Some(4));
        assert_eq!(slice.skipped_after(), Some(0));
        assert_eq!(slice.at(6), Value::Photo(PHOTO));
        assert_eq!(slice.index_of(Value::Photo(PHOTO)), Some(6));

        let reversed = slice.reversed();
        assert_eq!(reversed.at(0), Value::Photo(PHOTO));
        assert_eq!(reversed.index_of(Value::Photo(PHOTO)), Some(0));
        assert_eq!(reversed.skipped_before(), Some(0));
        assert_eq!(reversed.skipped_after(), Some(4));
    }

    #[test]
    fn photo_carried_by_newest_message_is_not_duplicated() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        directory.set_message_photo(FullMsgId::of_peer(PEER, 10), PHOTO);
        let part = window(&[5, 6, 7, 8, 9, 10], Some(4), Some(0));
        let ending = merged(&key, part.clone());
        let slice = WithLastSlice::new(key, merged(&key, part), Some(ending), &directory);

        assert_eq!(slice.is_last_isolated(), Some(false));
        assert_eq!(slice.len(), slice.inner().len());
        assert_eq!(slice.full_count(), Some(10));
        let newest = slice
            .inner()
            .index_of(FullMsgId::of_peer(PEER, 10))
            .expect("newest loaded");
        assert_eq!(slice.index_of(Value::Photo(PHOTO)), Some(newest));
    }

    #[test]
    fn absent_photo_is_pure_passthrough() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Empty);
        let part = window(&[5, 6, 7], Some(2), Some(3));
        let inner = merged(&key, part);
        let slice = WithLastSlice::new(key, inner.clone(), Some(inner.clone()), &directory);

        assert_eq!(slice.len(), inner.len());
        assert_eq!(slice.full_count(), inner.full_count());
        assert_eq!(slice.skipped_before(), inner.skipped_before());
        assert_eq!(slice.skipped_after(), inner.skipped_after());
        for index in 0..inner.len() {
            assert_eq!(slice.at(index), Value::Message(inner.at(index)));
        }
        assert_eq!(slice.index_of(Value::Photo(PHOTO)), None);
    }

    #[test]
    fn unknown_ending_keeps_isolation_unknown() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7], Some(2), None);
        let ending = MergedSlice::empty(key.ending_key());
        let slice = WithLastSlice::new(key, merged(&key, part), Some(ending), &directory);

        assert_eq!(slice.is_last_isolated(), None);
        assert_eq!(slice.full_count(), None);
        assert_eq!(slice.skipped_after(), None);
        assert_eq!(slice.len(), 3);
    }

    #[test]
    fn window_short_of_the_end_counts_photo_as_skipped() {
        let key = key_at(6);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7], Some(2), Some(3));
        let ending = merged(
            &key.with_anchor(UniversalMsgId::Message(10)),
            window(&[10], Some(7), Some(0)),
        );
        let slice = WithLastSlice::new(key, merged(&key, part), Some(ending), &directory);

        assert_eq!(slice.is_last_isolated(), Some(true));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.skipped_after(), Some(4));
        assert_eq!(slice.full_count(), Some(9));
        assert_eq!(slice.index_of(Value::Photo(PHOTO)), None);
    }

    #[test]
    fn unknown_peer_photo_propagates() {
        let key = key_at(7);
        let directory = MemoryDirectory::new();
        let part = window(&[5, 6, 7], Some(2), Some(0));
        let slice = WithLastSlice::new(
            key,
            merged(&key, part.clone()),
            Some(merged(&key, part)),
            &directory,
        );

        assert_eq!(slice.last_photo(), PeerPhoto::Unknown);
        assert_eq!(slice.full_count(), None);
        assert_eq!(slice.skipped_after(), None);
        assert_eq!(slice.skipped_before(), Some(2));
        assert_eq!(slice.len(), 3);
    }

    #[test]
    fn other_media_types_never_overlay() {
        let key = Key::new(PEER, None, SharedMediaType::Photo, UniversalMsgId::Message(7));
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7], Some(0), Some(0));
        let slice = WithLastSlice::new(
            key,
            merged(&key, part.clone()),
            Some(merged(&key, part)),
            &directory,
        );

        assert_eq!(slice.is_last_isolated(), Some(false));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.full_count(), Some(3));
    }

    #[test]
    fn photo_anchor_settles_isolation_from_its_own_window() {
        let key = Key::new(
            PEER,
            None,
            SharedMediaType::ChatPhoto,
            UniversalMsgId::Photo(PHOTO),
        );
        assert!(!key.needs_ending());
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[3, 4], Some(0), Some(0));
        let slice = WithLastSlice::new(key, merged(&key, part), None, &directory);

        assert_eq!(slice.len(), 3);
        assert_eq!(slice.distance(&key, &key.with_anchor(UniversalMsgId::Message(3))), Some(-2));
    }

    #[test]
    fn empty_history_with_photo_is_a_single_slot() {
        let key = key_at(0);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[], Some(0), Some(0));
        let slice = WithLastSlice::new(
            key,
            merged(&key, part.clone()),
            Some(merged(&key, part)),
            &directory,
        );

        assert_eq!(slice.len(), 1);
        assert_eq!(slice.full_count(), Some(1));
        assert_eq!(slice.at(0), Value::Photo(PHOTO));
        assert_eq!(slice.index_of(Value::Photo(PHOTO)), Some(0));
    }

    #[test]
    fn refinement_restores_isolation_and_keeps_orientation() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7, 8, 9, 10], Some(4), Some(0));
        let previous = WithLastSlice::new(
            key,
            merged(&key, part.clone()),
            Some(merged(&key, part)),
            &directory,
        )
        .reversed();

        let forgotten = SparseIdsSlice::new(5..=10, MsgRange::new(0, 10), None, Some(4), None);
        let next = WithLastSlice::new(
            key,
            merged(&key, forgotten.clone()),
            Some(merged(&key, forgotten)),
            &directory,
        )
        .reversed();
        assert_eq!(next.is_last_isolated(), None);

        let refined = next.refined_by(&previous, &directory);
        assert!(refined.is_reversed());
        assert_eq!(refined.is_last_isolated(), Some(true));
        assert_eq!(refined.at(0), Value::Photo(PHOTO));
        assert_eq!(refined.full_count(), Some(11));
    }

    #[test]
    fn double_reverse_restores_order() {
        let key = key_at(7);
        let directory = directory_with_photo(PeerPhoto::Photo(PHOTO));
        let part = window(&[5, 6, 7], Some(2), Some(0));
        let original = WithLastSlice::new(
            key,
            merged(&key, part.clone()),
            Some(merged(&key, part)),
            &directory,
        );
        let mut twice = original.clone();
        twice.reverse();
        twice.reverse();

        assert_eq!(twice, original);
        let forward: Vec<_> = original.iter().collect();
        let backward: Vec<_> = original.clone().reversed().iter().collect();
        assert_eq!(forward.iter().rev().copied().collect::<Vec<_>>(), backward);
    }

    #[test]
    fn key_constructor_rejects_bad_anchors() {
        assert_eq!(
            Key::try_new(PEER, None, SharedMediaType::Photo, UniversalMsgId::Photo(1)),
            Err(KeyError::PhotoAnchorForType {
                media_type: SharedMediaType::Photo
            })
        );
        assert_eq!(
            Key::try_new(PEER, None, SharedMediaType::File, UniversalMsgId::Message(-5)),
            Err(KeyError::MigratedAnchorWithoutPeer {
                peer_id: PEER,
                universal_id: -5
            })
        );
        assert_eq!(
            Key::try_new(
                PEER,
                None,
                SharedMediaType::File,
                UniversalMsgId::Message(SERVER_MAX_MSG_ID)
            ),
            Err(KeyError::InvalidAnchor {
                universal_id: SERVER_MAX_MSG_ID
            })
        );
    }

    #[test]
    #[should_panic(expected = "invalid shared media key")]
    fn photo_anchor_on_other_type_is_fatal() {
        let _ = Key::new(PEER, None, SharedMediaType::Video, UniversalMsgId::Photo(1));
    }

    #[test]
    fn compute_id_routes_negative_anchors_to_migrated_peer() {
        let migrated = PeerId::chat(5);
        let key = Key::new(
            PEER,
            Some(migrated),
            SharedMediaType::File,
            UniversalMsgId::Message(12 - SERVER_MAX_MSG_ID),
        );
        assert_eq!(key.compute_id(), Value::Message(FullMsgId::new(0, 12)));
        assert_eq!(key_at(12).compute_id(), Value::Message(FullMsgId::new(77, 12)));
    }
}
