#![forbid(unsafe_code)]

//! Shared media categories and the keys that address them.

use bitflags::bitflags;

use crate::ids::{MsgId, PeerId};
use crate::merged::MergedKey;

/// Category of shared media tracked per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SharedMediaType {
    Photo,
    Video,
    MusicFile,
    File,
    VoiceFile,
    Link,
    /// Profile photo changes; the only type that carries the last-item overlay.
    ChatPhoto,
    RoundVoiceFile,
    Gif,
    RoundFile,
}

impl SharedMediaType {
    pub const ALL: [Self; 10] = [
        Self::Photo,
        Self::Video,
        Self::MusicFile,
        Self::File,
        Self::VoiceFile,
        Self::Link,
        Self::ChatPhoto,
        Self::RoundVoiceFile,
        Self::Gif,
        Self::RoundFile,
    ];

    /// The type shown when opening the overview for this type, if any.
    #[must_use]
    pub const fn overview_type(self) -> Option<Self> {
        match self {
            Self::Photo
            | Self::Video
            | Self::MusicFile
            | Self::File
            | Self::VoiceFile
            | Self::Link => Some(self),
            Self::ChatPhoto | Self::RoundVoiceFile | Self::Gif | Self::RoundFile => None,
        }
    }

    #[must_use]
    pub const fn allows_search(self) -> bool {
        matches!(self, Self::MusicFile | Self::File | Self::Link)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::MusicFile => "music_file",
            Self::File => "file",
            Self::VoiceFile => "voice_file",
            Self::Link => "link",
            Self::ChatPhoto => "chat_photo",
            Self::RoundVoiceFile => "round_voice_file",
            Self::Gif => "gif",
            Self::RoundFile => "round_file",
        }
    }
}

bitflags! {
    /// Set of media types touched by one message.
    ///
    /// A single message can belong to several lists at once (a round video
    /// is both `RoundFile` and `RoundVoiceFile`), so additions and removals
    /// address a set.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SharedMediaTypes: u16 {
        const PHOTO = 1 << 0;
        const VIDEO = 1 << 1;
        const MUSIC_FILE = 1 << 2;
        const FILE = 1 << 3;
        const VOICE_FILE = 1 << 4;
        const LINK = 1 << 5;
        const CHAT_PHOTO = 1 << 6;
        const ROUND_VOICE_FILE = 1 << 7;
        const GIF = 1 << 8;
        const ROUND_FILE = 1 << 9;
    }
}

impl SharedMediaTypes {
    #[must_use]
    pub const fn of(media_type: SharedMediaType) -> Self {
        match media_type {
            SharedMediaType::Photo => Self::PHOTO,
            SharedMediaType::Video => Self::VIDEO,
            SharedMediaType::MusicFile => Self::MUSIC_FILE,
            SharedMediaType::File => Self::FILE,
            SharedMediaType::VoiceFile => Self::VOICE_FILE,
            SharedMediaType::Link => Self::LINK,
            SharedMediaType::ChatPhoto => Self::CHAT_PHOTO,
            SharedMediaType::RoundVoiceFile => Self::ROUND_VOICE_FILE,
            SharedMediaType::Gif => Self::GIF,
            SharedMediaType::RoundFile => Self::ROUND_FILE,
        }
    }

    #[must_use]
    pub const fn has(self, media_type: SharedMediaType) -> bool {
        self.contains(Self::of(media_type))
    }

    /// Member types in declaration order.
    pub fn types(self) -> impl Iterator<Item = SharedMediaType> {
        SharedMediaType::ALL
            .into_iter()
            .filter(move |&media_type| self.has(media_type))
    }
}

impl From<SharedMediaType> for SharedMediaTypes {
    fn from(media_type: SharedMediaType) -> Self {
        Self::of(media_type)
    }
}

/// Addresses one peer's media list of one type around a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedMediaKey {
    pub peer_id: PeerId,
    pub media_type: SharedMediaType,
    pub message_id: MsgId,
}

impl SharedMediaKey {
    #[must_use]
    pub const fn new(peer_id: PeerId, media_type: SharedMediaType, message_id: MsgId) -> Self {
        Self {
            peer_id,
            media_type,
            message_id,
        }
    }
}

/// A [`MergedKey`] narrowed to one media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedMediaMergedKey {
    pub merged: MergedKey,
    pub media_type: SharedMediaType,
}

impl SharedMediaMergedKey {
    #[must_use]
    pub const fn new(merged: MergedKey, media_type: SharedMediaType) -> Self {
        Self { merged, media_type }
    }

    /// Key of the primary peer's list.
    #[must_use]
    pub fn part(&self) -> SharedMediaKey {
        SharedMediaKey::new(
            self.merged.peer_id,
            self.media_type,
            MergedKey::part_key(self.merged.universal_id),
        )
    }

    /// Key of the migrated peer's list, when there is a migrated peer.
    #[must_use]
    pub fn migrated(&self) -> Option<SharedMediaKey> {
        self.merged.migrated_peer_id.map(|peer| {
            SharedMediaKey::new(
                peer,
                self.media_type,
                MergedKey::migrated_key(self.merged.universal_id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SERVER_MAX_MSG_ID;

    #[test]
    fn overview_and_search_tables() {
        assert_eq!(
            SharedMediaType::Photo.overview_type(),
            Some(SharedMediaType::Photo)
        );
        assert_eq!(SharedMediaType::ChatPhoto.overview_type(), None);
        assert_eq!(SharedMediaType::Gif.overview_type(), None);

        let searchable: Vec<_> = SharedMediaType::ALL
            .into_iter()
            .filter(|t| t.allows_search())
            .collect();
        assert_eq!(
            searchable,
            vec![
                SharedMediaType::MusicFile,
                SharedMediaType::File,
                SharedMediaType::Link
            ]
        );
    }

    #[test]
    fn merged_key_splits_into_part_and_migrated() {
        let merged = MergedKey::new(PeerId::channel(1), Some(PeerId::chat(2)), -10);
        let key = SharedMediaMergedKey::new(merged, SharedMediaType::Photo);

        assert_eq!(key.part().message_id, 1);
        assert_eq!(key.part().peer_id, PeerId::channel(1));
        let migrated = key.migrated().expect("migrated key");
        assert_eq!(migrated.peer_id, PeerId::chat(2));
        assert_eq!(migrated.message_id, SERVER_MAX_MSG_ID - 10);
    }

    #[test]
    fn no_migrated_key_without_migrated_peer() {
        let merged = MergedKey::new(PeerId::user(1), None, 5);
        let key = SharedMediaMergedKey::new(merged, SharedMediaType::File);
        assert_eq!(key.migrated(), None);
    }

    #[test]
    fn type_sets_enumerate_members() {
        let round = SharedMediaTypes::ROUND_FILE | SharedMediaTypes::ROUND_VOICE_FILE;
        assert!(round.has(SharedMediaType::RoundFile));
        assert!(!round.has(SharedMediaType::Gif));
        assert_eq!(
            round.types().collect::<Vec<_>>(),
            vec![SharedMediaType::RoundVoiceFile, SharedMediaType::RoundFile]
        );
        assert_eq!(
            SharedMediaTypes::from(SharedMediaType::ChatPhoto),
            SharedMediaTypes::CHAT_PHOTO
        );
    }
}
