#![forbid(unsafe_code)]

//! Point-in-time snapshot of one loaded window over a peer's id list.
//!
//! The fetch layer builds these; everything downstream only reads them.
//! Ids are kept ascending (oldest first), so "before" is the older side and
//! "after" the newer side of the window.

use crate::count::{Count, signed_distance};
use crate::error::SliceError;
use crate::ids::{MsgId, MsgRange};

/// Loaded window of known ids plus counts of what lies outside it.
///
/// # Invariants
///
/// 1. `ids` is strictly ascending.
/// 2. Counts are `None` when unknown; they are never defaulted to 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseIdsSlice {
    ids: Vec<MsgId>,
    range: MsgRange,
    full_count: Count,
    skipped_before: Count,
    skipped_after: Count,
}

impl SparseIdsSlice {
    /// Builds a snapshot from ids in any order; duplicates are collapsed.
    #[must_use]
    pub fn new(
        ids: impl IntoIterator<Item = MsgId>,
        range: MsgRange,
        full_count: Count,
        skipped_before: Count,
        skipped_after: Count,
    ) -> Self {
        let mut ids: Vec<MsgId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            ids,
            range,
            full_count,
            skipped_before,
            skipped_after,
        }
    }

    /// Builds a snapshot, rejecting unsorted ids and contradictory counts.
    pub fn checked(
        ids: Vec<MsgId>,
        range: MsgRange,
        full_count: Count,
        skipped_before: Count,
        skipped_after: Count,
    ) -> Result<Self, SliceError> {
        if let Some(position) = ids.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(SliceError::UnsortedIds {
                position: position + 1,
            });
        }
        if let Some(&id) = ids.iter().find(|&&id| !range.contains(id)) {
            return Err(SliceError::IdOutsideRange {
                id,
                from: range.from,
                till: range.till,
            });
        }
        if let (Some(full), Some(before), Some(after)) = (full_count, skipped_before, skipped_after)
            && before + ids.len() + after != full
        {
            return Err(SliceError::InconsistentCounts {
                before,
                loaded: ids.len(),
                after,
                full,
            });
        }
        Ok(Self {
            ids,
            range,
            full_count,
            skipped_before,
            skipped_after,
        })
    }

    /// Snapshot of a list known to be completely loaded.
    #[must_use]
    pub fn complete(ids: impl IntoIterator<Item = MsgId>) -> Self {
        let mut slice = Self::new(ids, MsgRange::FULL, None, Some(0), Some(0));
        slice.full_count = Some(slice.ids.len());
        slice
    }

    #[must_use]
    pub fn known_ids(&self) -> &[MsgId] {
        &self.ids
    }

    #[must_use]
    pub fn range(&self) -> MsgRange {
        self.range
    }

    #[must_use]
    pub fn full_count(&self) -> Count {
        self.full_count
    }

    #[must_use]
    pub fn skipped_before(&self) -> Count {
        self.skipped_before
    }

    #[must_use]
    pub fn skipped_after(&self) -> Count {
        self.skipped_after
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Position of `id` in the window, if loaded.
    #[must_use]
    pub fn index_of(&self, id: MsgId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Id at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn at(&self, index: usize) -> MsgId {
        assert!(
            index < self.ids.len(),
            "sparse slice index {index} out of range for window of {}",
            self.ids.len()
        );
        self.ids[index]
    }

    /// Signed offset between two loaded ids.
    #[must_use]
    pub fn distance(&self, a: MsgId, b: MsgId) -> Option<isize> {
        signed_distance(self.index_of(a), self.index_of(b))
    }

    /// First loaded id at or after `id`, falling back to the newest loaded id.
    #[must_use]
    pub fn nearest(&self, id: MsgId) -> Option<MsgId> {
        let position = self.ids.partition_point(|&known| known < id);
        self.ids
            .get(position)
            .or_else(|| self.ids.last())
            .copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = MsgId> + ExactSizeIterator + '_ {
        self.ids.iter().copied()
    }

    /// Takes back counts this window forgot but `previous` still knew.
    ///
    /// A side count is kept only while the loaded id on that edge is the
    /// same one it was measured from. The full count follows from both
    /// sides, or from `previous` when the ids did not change. Nothing is
    /// kept if the result would contradict counts this window does know.
    #[must_use]
    pub fn refined_by(self, previous: &Self) -> Self {
        let edge_kept = |edge: Option<&MsgId>, old: Option<&MsgId>| edge.is_some() && edge == old;
        let mut refined = self.clone();
        if refined.skipped_before.is_none() && edge_kept(self.ids.first(), previous.ids.first()) {
            refined.skipped_before = previous.skipped_before;
        }
        if refined.skipped_after.is_none() && edge_kept(self.ids.last(), previous.ids.last()) {
            refined.skipped_after = previous.skipped_after;
        }
        if refined.full_count.is_none() {
            refined.full_count = match (refined.skipped_before, refined.skipped_after) {
                (Some(before), Some(after)) => Some(before + refined.ids.len() + after),
                _ if refined.ids == previous.ids => previous.full_count,
                _ => None,
            };
        }
        let loaded = refined.ids.len();
        match (refined.full_count, refined.skipped_before, refined.skipped_after) {
            (Some(full), Some(before), Some(after)) if before + loaded + after != full => self,
            _ => refined,
        }
    }
}
