//! Codec des URLs de ressources.
//!
//! Une URL de ressource désigne un couple (chemin, profil de diffusion) :
//! `<base><index chemin en hex sur 5>-<index profil en hex sur 2>.<suffixe>`,
//! par exemple `/upnp/condir/00001-03.mkv`. Chemins et profils sont
//! internés dans deux tables indépendantes, append-only.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::errors::{ContentDirectoryError, Result};

#[derive(Debug, Default)]
struct InternTable {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl InternTable {
    fn intern(&mut self, value: &str) -> usize {
        if let Some(&i) = self.index.get(value) {
            return i;
        }
        let i = self.values.len();
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), i);
        i
    }

    fn get(&self, i: usize) -> Option<&String> {
        self.values.get(i)
    }
}

#[derive(Debug, Default)]
struct Tables {
    paths: InternTable,
    profiles: InternTable,
}

/// Encodeur/décodeur des tokens de ressource
#[derive(Debug)]
pub struct ResourceUrlCodec {
    base_dir: String,
    tables: Mutex<Tables>,
}

impl ResourceUrlCodec {
    /// `base_dir` est le préfixe HTTP des ressources, délimité par des `/`.
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Token (chemin HTTP absolu) pour `path` diffusé avec `profile`.
    pub fn encode(&self, path: &str, profile: &str, suffix: &str) -> String {
        let (path_id, profile_id) = {
            let mut tables = self.tables.lock();
            (tables.paths.intern(path), tables.profiles.intern(profile))
        };
        format!("{}{:05x}-{:02x}.{}", self.base_dir, path_id, profile_id, suffix)
    }

    /// Retrouve (chemin, profil) depuis un token, ou `NotFound` pour tout
    /// token mal formé ou hors des tables (par exemple rejoué après un
    /// redémarrage).
    pub fn decode(&self, token: &str) -> Result<(String, String)> {
        let not_found = || ContentDirectoryError::NotFound(token.to_string());

        let name = match token.rfind('/') {
            Some(slash) => &token[slash + 1..],
            None => token,
        };
        let (path_hex, rest) = name.split_once('-').ok_or_else(not_found)?;
        let (profile_hex, _suffix) = rest.split_once('.').ok_or_else(not_found)?;

        let path_id = usize::from_str_radix(path_hex, 16).map_err(|_| not_found())?;
        let profile_id = usize::from_str_radix(profile_hex, 16).map_err(|_| not_found())?;

        let tables = self.tables.lock();
        match (tables.paths.get(path_id), tables.profiles.get(profile_id)) {
            (Some(path), Some(profile)) => Ok((path.clone(), profile.clone())),
            _ => Err(not_found()),
        }
    }

    /// Vrai si `request_path` est servi par ce codec
    pub fn handles(&self, request_path: &str) -> bool {
        request_path.starts_with(&self.base_dir)
    }

    pub fn clear(&self) {
        *self.tables.lock() = Tables::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let codec = ResourceUrlCodec::new("/cds/");
        assert_eq!(codec.encode("/Movies/a", "MPEG_PS_PAL", "mpeg"), "/cds/00000-00.mpeg");
        assert_eq!(codec.encode("/Movies/b", "MPEG_PS_PAL", "mpeg"), "/cds/00001-00.mpeg");
        assert_eq!(codec.encode("/Movies/b", "mkv", "mkv"), "/cds/00001-01.mkv");
    }

    #[test]
    fn test_round_trip() {
        let codec = ResourceUrlCodec::new("/upnp/condir/");
        let pairs = [
            ("/Movies/Inception", "mkv"),
            ("/Movies/Inception///p&position=60000#Resume (0:01:00/2:30:00)", "mkv"),
            ("/Music/a.mp3", "MP3"),
            ("/Movies/Inception", "MPEG_PS_PAL"),
        ];
        let tokens: Vec<String> = pairs
            .iter()
            .map(|(path, profile)| codec.encode(path, profile, "bin"))
            .collect();

        for ((path, profile), token) in pairs.iter().zip(&tokens) {
            let (p, pr) = codec.decode(token).unwrap();
            assert_eq!((p.as_str(), pr.as_str()), (*path, *profile));
        }

        // un couple distinct donne un token distinct
        let mut unique = tokens.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), tokens.len());
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = ResourceUrlCodec::new("/cds/");
        codec.encode("/a", "MP3", "mp3");

        for token in [
            "/cds/00000-00",
            "/cds/0000000.mp3",
            "/cds/zz-00.mp3",
            "/cds/00001-00.mp3",
            "/cds/00000-05.mp3",
            "",
        ] {
            let err = codec.decode(token).unwrap_err();
            assert!(matches!(err, ContentDirectoryError::NotFound(_)), "{token}");
        }
    }

    #[test]
    fn test_stale_tokens_after_clear() {
        let codec = ResourceUrlCodec::new("/cds/");
        let token = codec.encode("/a", "MP3", "mp3");
        codec.clear();
        assert!(codec.decode(&token).is_err());
        assert!(codec.handles(&token));
    }
}
