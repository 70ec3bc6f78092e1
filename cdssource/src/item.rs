//! Item model shared by every item source.

use std::time::Duration;

/// Kind of a media item.
///
/// The discriminants group the kinds into families (audio `10..20`,
/// video `20..30`, image `30..`), which is what [`ItemKind::is_audio`] and
/// friends rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ItemKind {
    #[default]
    None = 0,

    Audio = 10,
    Music,
    AudioBroadcast,
    AudioBook,

    Video = 20,
    Movie,
    VideoBroadcast,
    MusicVideo,

    Image = 30,
    Photo,
}

impl ItemKind {
    pub fn is_audio(self) -> bool {
        (10..20).contains(&(self as u8))
    }

    pub fn is_video(self) -> bool {
        (20..30).contains(&(self as u8))
    }

    pub fn is_image(self) -> bool {
        (self as u8) >= 30
    }

    /// Music tracks and music videos, which are grouped in music albums.
    pub fn is_music(self) -> bool {
        matches!(self, ItemKind::Music | ItemKind::MusicVideo)
    }
}

/// A named position inside a continuous-time item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub position: Duration,
}

impl Chapter {
    pub fn new(title: impl Into<String>, position: Duration) -> Self {
        Self {
            title: title.into(),
            position,
        }
    }
}

/// One node of the browsable tree, as produced by an item source.
///
/// Items are value objects: sources build them on demand and the content
/// directory never keeps them beyond a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub is_dir: bool,
    pub kind: ItemKind,

    /// Virtual path of the node (trailing `/` for directories).
    pub path: String,
    /// Opaque content locator, only meaningful to the owning source.
    pub mrl: String,
    pub icon_url: Option<String>,

    pub title: String,
    pub artist: String,
    pub album: String,
    pub track: u32,

    pub sample_rate: u32,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,

    pub duration: Duration,
    /// Start offset requested for playback.
    pub position: Duration,
    /// Where the last playback session stopped.
    pub last_position: Duration,
    /// 1-based chapter requested for playback, 0 when none.
    pub chapter: u32,
    pub chapters: Vec<Chapter>,
}

impl Item {
    /// Creates a directory node.
    pub fn directory(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            is_dir: true,
            path: path.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Creates a playable leaf.
    pub fn file(
        kind: ItemKind,
        path: impl Into<String>,
        title: impl Into<String>,
        mrl: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            title: title.into(),
            mrl: mrl.into(),
            ..Default::default()
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_last_position(mut self, last_position: Duration) -> Self {
        self.last_position = last_position;
        self
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    /// A source answers with a null item (no content locator) when the
    /// requested path does not exist.
    pub fn is_null(&self) -> bool {
        self.mrl.is_empty()
    }

    pub fn is_audio(&self) -> bool {
        self.kind.is_audio()
    }

    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }

    pub fn is_image(&self) -> bool {
        self.kind.is_image()
    }

    pub fn is_music(&self) -> bool {
        self.kind.is_music()
    }

    /// Last segment of the virtual path, without the trailing `/`.
    pub fn file_name(&self) -> &str {
        let trimmed = self.path.strip_suffix('/').unwrap_or(&self.path);
        match trimmed.rfind('/') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_families() {
        assert!(ItemKind::AudioBook.is_audio());
        assert!(!ItemKind::AudioBook.is_video());
        assert!(ItemKind::MusicVideo.is_video());
        assert!(ItemKind::MusicVideo.is_music());
        assert!(ItemKind::Photo.is_image());
        assert!(!ItemKind::None.is_audio());
        assert!(!ItemKind::None.is_image());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(Item::directory("/Movies/", "").file_name(), "Movies");
        assert_eq!(
            Item::file(ItemKind::Movie, "/Movies/Inception", "", "m").file_name(),
            "Inception"
        );
        assert_eq!(Item::directory("/", "").file_name(), "");
    }

    #[test]
    fn test_null_item() {
        assert!(Item::default().is_null());
        assert!(!Item::file(ItemKind::Music, "/a", "a", "file:///a").is_null());
    }
}
