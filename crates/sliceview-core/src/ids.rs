#![forbid(unsafe_code)]

//! Identifier encodings for peers, messages and photos.
//!
//! Message ids are only globally unique when qualified by a channel, so a
//! [`FullMsgId`] carries the bare channel id (or 0 for every other peer
//! kind). Migrated history is addressed through *universal* ids: a negative
//! value `u` points at the migrated message `SERVER_MAX_MSG_ID + u`.

use std::fmt;

/// Local message id inside one peer's history.
pub type MsgId = i32;

/// Bare id of a channel-like peer. 0 means "not a channel".
pub type ChannelId = u32;

/// Opaque handle of a photo (the synthetic last item).
pub type PhotoId = u64;

/// Exclusive upper bound of server-assigned message ids.
///
/// `SERVER_MAX_MSG_ID - 1` is used as an anchor meaning "start at the
/// newest end".
pub const SERVER_MAX_MSG_ID: MsgId = 0x3FFF_FFFF;

/// Returns `true` for ids the server could have assigned.
#[inline]
#[must_use]
pub const fn is_server_msg_id(id: MsgId) -> bool {
    id > 0 && id < SERVER_MAX_MSG_ID
}

/// Translates a negative universal id into the migrated peer's local id.
///
/// Returns `None` when `universal_id` does not address migrated history.
#[inline]
#[must_use]
pub fn migrated_local_id(universal_id: MsgId) -> Option<MsgId> {
    SERVER_MAX_MSG_ID
        .checked_add(universal_id)
        .filter(|&local| universal_id < 0 && is_server_msg_id(local))
}

const PEER_ID_MASK: u64 = 0xFFFF_FFFF;
const PEER_ID_TYPE_MASK: u64 = 0x3_0000_0000;
const PEER_ID_CHAT_SHIFT: u64 = 0x1_0000_0000;
const PEER_ID_CHANNEL_SHIFT: u64 = 0x2_0000_0000;

/// Kind of a peer, encoded in bits 32..34 of its [`PeerId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerKind {
    User,
    Chat,
    Channel,
}

/// Peer identifier with the peer kind packed into the high bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// The "no peer" id.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn user(bare: u32) -> Self {
        Self(bare as u64)
    }

    #[must_use]
    pub const fn chat(bare: u32) -> Self {
        Self(PEER_ID_CHAT_SHIFT | bare as u64)
    }

    #[must_use]
    pub const fn channel(bare: u32) -> Self {
        Self(PEER_ID_CHANNEL_SHIFT | bare as u64)
    }

    /// Reconstructs a peer id from its packed representation.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn kind(self) -> PeerKind {
        match self.0 & PEER_ID_TYPE_MASK {
            PEER_ID_CHAT_SHIFT => PeerKind::Chat,
            PEER_ID_CHANNEL_SHIFT => PeerKind::Channel,
            _ => PeerKind::User,
        }
    }

    #[must_use]
    pub const fn is_channel(self) -> bool {
        matches!(self.kind(), PeerKind::Channel)
    }

    /// Bare numeric id without the kind bits.
    #[must_use]
    pub const fn bare(self) -> u32 {
        (self.0 & PEER_ID_MASK) as u32
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind() {
            PeerKind::User => "user",
            PeerKind::Chat => "chat",
            PeerKind::Channel => "channel",
        };
        write!(f, "{prefix}#{}", self.bare())
    }
}

/// Message id qualified by its channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FullMsgId {
    pub channel: ChannelId,
    pub msg: MsgId,
}

impl FullMsgId {
    #[must_use]
    pub const fn new(channel: ChannelId, msg: MsgId) -> Self {
        Self { channel, msg }
    }

    /// Qualifies `msg` as a message of `peer`.
    ///
    /// Channel-like peers tag the id with their bare id; every other kind
    /// tags it with 0 ("use the key's own peer").
    #[must_use]
    pub const fn of_peer(peer: PeerId, msg: MsgId) -> Self {
        let channel = if peer.is_channel() { peer.bare() } else { 0 };
        Self { channel, msg }
    }

    /// The empty id, used for "no message".
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.channel == 0 && self.msg == 0
    }
}

/// Inclusive range of message ids known to contain no gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgRange {
    pub from: MsgId,
    pub till: MsgId,
}

impl MsgRange {
    /// The whole id space.
    pub const FULL: Self = Self {
        from: 0,
        till: SERVER_MAX_MSG_ID,
    };

    #[must_use]
    pub const fn new(from: MsgId, till: MsgId) -> Self {
        Self { from, till }
    }

    #[must_use]
    pub const fn contains(self, id: MsgId) -> bool {
        self.from <= id && id <= self.till
    }

    /// The range reaches the oldest end of the history.
    #[must_use]
    pub const fn reaches_oldest(self) -> bool {
        self.from == 0
    }

    /// The range reaches the newest end of the history.
    #[must_use]
    pub const fn reaches_newest(self) -> bool {
        self.till == SERVER_MAX_MSG_ID
    }
}

impl Default for MsgRange {
    fn default() -> Self {
        Self::FULL
    }
}
