#![forbid(unsafe_code)]

//! Sliceview Core
//!
//! Read-only snapshots that answer "what is at index `i` of a huge, mostly
//! unloaded, ordered id list" for virtual-scrolling media browsers.
//!
//! # Key Components
//!
//! - [`SparseIdsSlice`] - One loaded window over a single peer's id list
//! - [`MergedSlice`] - Primary history and migrated history as one sequence
//! - [`WithLastSlice`] - Merged sequence with the peer photo spliced in as
//!   the newest item
//! - [`PeerDirectory`] - Entity lookups the overlay needs
//!
//! # Role in Sliceview
//! `sliceview-core` is pure data: no I/O, no callbacks. The runtime crate
//! (`sliceview-runtime`) owns the stores and rebuilds these snapshots when
//! the underlying lists change.

pub mod count;
pub mod entity;
pub mod error;
pub mod ids;
pub mod logging;
pub mod media;
pub mod merged;
pub mod sparse;
pub mod with_last;

pub use count::Count;
pub use entity::{MemoryDirectory, PeerDirectory, PeerPhoto};
pub use error::{KeyError, SliceError};
pub use ids::{
    ChannelId, FullMsgId, MsgId, MsgRange, PeerId, PeerKind, PhotoId, SERVER_MAX_MSG_ID,
    is_server_msg_id, migrated_local_id,
};
pub use media::{SharedMediaKey, SharedMediaMergedKey, SharedMediaType, SharedMediaTypes};
pub use merged::{MergedKey, MergedSlice};
pub use sparse::SparseIdsSlice;
pub use with_last::{Key, UniversalMsgId, Value, WithLastSlice};
