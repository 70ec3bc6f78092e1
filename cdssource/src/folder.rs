//! Filesystem-backed item source.
//!
//! Mounts a real directory at a virtual prefix. Directories are listed
//! first, then media files, each group sorted by name. Files whose
//! extension is not a known audio, video or image type are hidden.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{Item, ItemKind, ItemSource, ItemSourceError, Listing, Result, ServedResource};

const FILE_SCHEME: &str = "file://";

/// Extension -> (kind, mime type)
fn classify(name: &str) -> Option<(ItemKind, &'static str)> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let found = match ext.as_str() {
        "mp3" => (ItemKind::Music, "audio/mpeg"),
        "flac" => (ItemKind::Music, "audio/flac"),
        "ogg" | "oga" => (ItemKind::Music, "audio/ogg"),
        "opus" => (ItemKind::Music, "audio/opus"),
        "m4a" | "aac" => (ItemKind::Music, "audio/mp4"),
        "wav" => (ItemKind::Music, "audio/wav"),
        "m4b" => (ItemKind::AudioBook, "audio/mp4"),
        "mkv" => (ItemKind::Video, "video/x-matroska"),
        "mp4" | "m4v" => (ItemKind::Video, "video/mp4"),
        "avi" => (ItemKind::Video, "video/x-msvideo"),
        "mov" => (ItemKind::Video, "video/quicktime"),
        "webm" => (ItemKind::Video, "video/webm"),
        "mpg" | "mpeg" | "ts" => (ItemKind::Video, "video/mpeg"),
        "jpg" | "jpeg" => (ItemKind::Photo, "image/jpeg"),
        "png" => (ItemKind::Image, "image/png"),
        "gif" => (ItemKind::Image, "image/gif"),
        "webp" => (ItemKind::Image, "image/webp"),
        _ => return None,
    };
    Some(found)
}

/// A directory of media files mounted at a virtual prefix.
#[derive(Debug)]
pub struct FolderSource {
    name: String,
    directory: PathBuf,
    mount: String,
}

impl FolderSource {
    /// Mounts `directory` at `mount` (for example `/Library/`).
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, mount: impl Into<String>) -> Self {
        let mut mount = mount.into();
        if !mount.ends_with('/') {
            mount.push('/');
        }
        Self {
            name: name.into(),
            directory: directory.into(),
            mount,
        }
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Maps a virtual path to a filesystem path, refusing anything that
    /// would escape the mounted directory.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path
            .strip_prefix(&self.mount)
            .ok_or_else(|| ItemSourceError::NotFound(path.to_string()))?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ItemSourceError::NotFound(path.to_string()));
        }

        Ok(self.directory.join(relative))
    }

    fn file_item(path: String, name: &str, location: &Path) -> Option<Item> {
        let (kind, _) = classify(name)?;
        let title = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_string();
        let mrl = format!("{FILE_SCHEME}{}", location.display());
        Some(Item::file(kind, path, title, mrl))
    }
}

#[async_trait]
impl ItemSource for FolderSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_children(
        &self,
        _client: &str,
        path: &str,
        start: usize,
        count: usize,
    ) -> Result<Listing> {
        if !path.ends_with('/') {
            return Err(ItemSourceError::NotFound(path.to_string()));
        }
        let location = self.resolve(path)?;
        debug!(path = %path, location = %location.display(), "📂 Listing folder");

        let mut dirs = Vec::new();
        let mut files = Vec::new();

        let mut entries = tokio::fs::read_dir(&location).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ItemSourceError::NotFound(path.to_string()),
            _ => ItemSourceError::Io(e),
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %path, "Skipping entry with a non UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                dirs.push(Item::directory(format!("{path}{name}/"), name));
            } else if let Some(item) = Self::file_item(format!("{path}{name}"), &name, &entry.path()) {
                files.push(item);
            }
        }

        dirs.sort_by(|a, b| a.title.cmp(&b.title));
        files.sort_by(|a, b| a.path.cmp(&b.path));
        dirs.extend(files);

        Ok(Listing::paginate(dirs, start, count))
    }

    async fn get_item(&self, _client: &str, path: &str) -> Result<Item> {
        let location = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&location)
            .await
            .map_err(|_| ItemSourceError::NotFound(path.to_string()))?;

        if metadata.is_dir() {
            let dir_path = if path.ends_with('/') {
                path.to_string()
            } else {
                format!("{path}/")
            };
            let mut item = Item::directory(dir_path, String::new());
            item.title = item.file_name().to_string();
            return Ok(item);
        }

        let name = location
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ItemSourceError::NotFound(path.to_string()))?;

        Self::file_item(path.to_string(), name, &location)
            .ok_or_else(|| ItemSourceError::NotFound(path.to_string()))
    }

    async fn serve(
        &self,
        _source_address: &str,
        item: &Item,
        _profile: &str,
    ) -> Result<ServedResource> {
        let location = item
            .mrl
            .strip_prefix(FILE_SCHEME)
            .map(PathBuf::from)
            .ok_or_else(|| ItemSourceError::NotFound(item.mrl.clone()))?;

        let content_type = location
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(classify)
            .map(|(_, mime)| mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let file = tokio::fs::File::open(&location).await?;
        let length = file.metadata().await.ok().map(|m| m.len());

        Ok(ServedResource {
            content_type,
            length,
            body: Box::pin(file),
        })
    }
}
