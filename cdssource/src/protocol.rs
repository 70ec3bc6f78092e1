//! Delivery profiles offered to clients for playable items.

use crate::item::Item;

/// DLNA flags: streaming transfer mode, background transfer, DLNA 1.5.
const DLNA_ORG_FLAGS: &str = "01500000000000000000000000000000";

/// Media family a delivery profile applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFamily {
    Audio,
    Video,
    Image,
}

impl MediaFamily {
    /// Family of an item, `None` for kinds that have no stream.
    pub fn of(item: &Item) -> Option<Self> {
        if item.is_audio() {
            Some(MediaFamily::Audio)
        } else if item.is_video() {
            Some(MediaFamily::Video)
        } else if item.is_image() {
            Some(MediaFamily::Image)
        } else {
            None
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "audio" => Some(MediaFamily::Audio),
            "video" => Some(MediaFamily::Video),
            "image" => Some(MediaFamily::Image),
            _ => None,
        }
    }
}

/// A delivery profile: the encoding a stream is served with.
///
/// `profile` is the key interned in resource URLs; it is usually a DLNA
/// profile name (`MPEG_PS_PAL`, `MP3`, ...) but any opaque string works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub profile: String,
    pub mime: String,
    pub suffix: String,
    pub family: MediaFamily,
    /// Whether `profile` is an official DLNA profile name.
    pub dlna: bool,
}

impl Protocol {
    pub fn new(
        profile: impl Into<String>,
        mime: impl Into<String>,
        suffix: impl Into<String>,
        family: MediaFamily,
    ) -> Self {
        Self {
            profile: profile.into(),
            mime: mime.into(),
            suffix: suffix.into(),
            family,
            dlna: true,
        }
    }

    /// Marks the profile key as private (not advertised as `DLNA.ORG_PN`).
    pub fn private(mut self) -> Self {
        self.dlna = false;
        self
    }

    /// The `protocolInfo` string advertised in `<res>` elements and by
    /// the connection manager.
    pub fn protocol_info(&self) -> String {
        if self.dlna && !self.profile.is_empty() {
            format!(
                "http-get:*:{}:DLNA.ORG_PN={};DLNA.ORG_OP=01;DLNA.ORG_FLAGS={}",
                self.mime, self.profile, DLNA_ORG_FLAGS
            )
        } else {
            format!(
                "http-get:*:{}:DLNA.ORG_OP=01;DLNA.ORG_FLAGS={}",
                self.mime, DLNA_ORG_FLAGS
            )
        }
    }
}
