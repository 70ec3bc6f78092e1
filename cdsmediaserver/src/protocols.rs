//! Catalogue des profils de diffusion proposés aux clients.

use cdsconfig::ProfileConfig;
use cdssource::{Item, MediaFamily, Protocol};
use tracing::warn;

/// Profils de diffusion, dans l'ordre de préférence
#[derive(Debug, Clone, Default)]
pub struct ProtocolCatalog {
    protocols: Vec<Protocol>,
}

impl ProtocolCatalog {
    pub fn new(protocols: Vec<Protocol>) -> Self {
        Self { protocols }
    }

    /// Construit le catalogue depuis la configuration. Les profils dont la
    /// famille est inconnue sont ignorés.
    pub fn from_profiles(profiles: &[ProfileConfig]) -> Self {
        let protocols = profiles
            .iter()
            .filter_map(|p| {
                let Some(family) = MediaFamily::parse(&p.kind) else {
                    warn!(profile = %p.name, kind = %p.kind, "Unknown media family, profile ignored");
                    return None;
                };
                let protocol = Protocol::new(&p.name, &p.mime, &p.suffix, family);
                Some(if p.dlna { protocol } else { protocol.private() })
            })
            .collect();
        Self { protocols }
    }

    /// Profils candidats pour `item` (avant négociation avec la source)
    pub fn candidates(&self, item: &Item) -> Vec<Protocol> {
        let Some(family) = MediaFamily::of(item) else {
            return Vec::new();
        };
        self.protocols
            .iter()
            .filter(|p| p.family == family)
            .cloned()
            .collect()
    }

    /// Valeur `SourceProtocolInfo` du ConnectionManager
    pub fn source_protocol_info(&self) -> String {
        self.protocols
            .iter()
            .map(Protocol::protocol_info)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdssource::ItemKind;

    fn profile(name: &str, kind: &str, mime: &str, suffix: &str, dlna: bool) -> ProfileConfig {
        ProfileConfig {
            name: name.to_string(),
            kind: kind.to_string(),
            mime: mime.to_string(),
            suffix: suffix.to_string(),
            dlna,
        }
    }

    #[test]
    fn test_candidates_by_family() {
        let catalog = ProtocolCatalog::from_profiles(&[
            profile("MP3", "audio", "audio/mpeg", "mp3", true),
            profile("MPEG_PS_PAL", "video", "video/mpeg", "mpeg", true),
            profile("mkv", "video", "video/x-matroska", "mkv", false),
            profile("weird", "hologram", "x/y", "z", true),
        ]);
        assert_eq!(catalog.len(), 3);

        let movie = Item::file(ItemKind::Movie, "/m", "m", "mrl");
        let names: Vec<_> = catalog
            .candidates(&movie)
            .into_iter()
            .map(|p| p.profile)
            .collect();
        assert_eq!(names, vec!["MPEG_PS_PAL", "mkv"]);

        let dir = Item::directory("/d/", "d");
        assert!(catalog.candidates(&dir).is_empty());
    }

    #[test]
    fn test_source_protocol_info() {
        let catalog = ProtocolCatalog::from_profiles(&[
            profile("MP3", "audio", "audio/mpeg", "mp3", true),
            profile("mkv", "video", "video/x-matroska", "mkv", false),
        ]);
        let info = catalog.source_protocol_info();
        let parts: Vec<_> = info.split(",http-get").collect();
        assert_eq!(parts.len(), 2);
        assert!(info.starts_with("http-get:*:audio/mpeg:DLNA.ORG_PN=MP3;"));
        assert!(!parts[1].contains("DLNA.ORG_PN"));
    }
}
