#![forbid(unsafe_code)]

use thiserror::Error;

use crate::ids::{MsgId, PeerId};
use crate::media::SharedMediaType;

/// Rejections raised while validating a sparse slice snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceError {
    #[error("slice ids are not strictly ascending at position {position}")]
    UnsortedIds { position: usize },

    #[error("slice id {id} lies outside its no-skip range {from}..={till}")]
    IdOutsideRange { id: MsgId, from: MsgId, till: MsgId },

    #[error(
        "slice counts disagree: before {before} + loaded {loaded} + after {after} != full {full}"
    )]
    InconsistentCounts {
        before: usize,
        loaded: usize,
        after: usize,
        full: usize,
    },
}

/// Rejections raised by [`Key::try_new`](crate::with_last::Key::try_new).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("a photo anchor requires the chat_photo media type, got {media_type:?}")]
    PhotoAnchorForType { media_type: SharedMediaType },

    #[error("anchor {universal_id} addresses migrated history but {peer_id} has no migrated peer")]
    MigratedAnchorWithoutPeer { peer_id: PeerId, universal_id: MsgId },

    #[error("anchor {universal_id} is neither a server id, 0, nor a migrated id")]
    InvalidAnchor { universal_id: MsgId },
}
