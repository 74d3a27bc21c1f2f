#![forbid(unsafe_code)]

//! Lookup of peer and message facts owned by the surrounding application.

use std::cell::RefCell;

use ahash::AHashMap;

use crate::ids::{FullMsgId, PeerId, PhotoId};

/// What is known about a peer's current photo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PeerPhoto {
    /// The peer (or its photo) has not been loaded yet.
    #[default]
    Unknown,
    /// The peer has no photo; there is no last item to overlay.
    Empty,
    /// The peer's current photo.
    Photo(PhotoId),
}

impl PeerPhoto {
    /// Builds the resolved state from a raw photo id, 0 meaning "no photo".
    #[must_use]
    pub const fn from_raw(photo_id: PhotoId) -> Self {
        if photo_id == 0 {
            Self::Empty
        } else {
            Self::Photo(photo_id)
        }
    }

    #[must_use]
    pub const fn photo_id(self) -> Option<PhotoId> {
        match self {
            Self::Photo(id) => Some(id),
            Self::Unknown | Self::Empty => None,
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Read-only queries answered by the application's entity cache.
pub trait PeerDirectory {
    /// Current photo of `peer`.
    fn peer_photo(&self, peer: PeerId) -> PeerPhoto;

    /// Photo attached to a loaded message, `None` when the message is not
    /// loaded or carries no photo.
    fn message_photo(&self, id: FullMsgId) -> Option<PhotoId>;
}

/// In-memory [`PeerDirectory`], filled by whoever owns the data.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    peers: RefCell<AHashMap<PeerId, PeerPhoto>>,
    messages: RefCell<AHashMap<FullMsgId, PhotoId>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_peer_photo(&self, peer: PeerId, photo: PeerPhoto) {
        self.peers.borrow_mut().insert(peer, photo);
    }

    pub fn set_message_photo(&self, id: FullMsgId, photo: PhotoId) {
        self.messages.borrow_mut().insert(id, photo);
    }

    pub fn forget_message(&self, id: FullMsgId) {
        self.messages.borrow_mut().remove(&id);
    }
}

impl PeerDirectory for MemoryDirectory {
    fn peer_photo(&self, peer: PeerId) -> PeerPhoto {
        self.peers
            .borrow()
            .get(&peer)
            .copied()
            .unwrap_or(PeerPhoto::Unknown)
    }

    fn message_photo(&self, id: FullMsgId) -> Option<PhotoId> {
        self.messages.borrow().get(&id).copied()
    }
}
