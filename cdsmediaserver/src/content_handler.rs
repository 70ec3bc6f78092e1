//! # ContentDirectory Handler - Moteur de parcours du ContentDirectory
//!
//! Ce module implémente la logique métier du service ContentDirectory :
//! résolution des ObjectID, sélection de la source responsable, classement
//! des enfants (conteneur ou item), expansion des items longs en
//! sous-items virtuels et génération du DIDL-Lite.
//!
//! ## Fonctionnalités
//!
//! - **Browse** : parcours des conteneurs, des items et de leurs sous-items
//! - **Search** : accepté, ne retourne jamais de résultat
//! - **Ressources** : URLs de diffusion et service des flux correspondants
//! - **Update ID** : suivi des changements pour l'eventing UPnP

use std::str::FromStr;
use std::time::Duration;

use cdsconfig::Config;
use cdsdidl::{Container, DIDLLite, Resource};
use cdssource::{Item, ItemKind, ItemSource, ServedResource};
use tracing::{debug, warn};

use crate::errors::{ContentDirectoryError, Result};
use crate::object_ids::{IdentifierRegistry, NO_OBJECT_ID, ROOT_ID, ROOT_PATH};
use crate::paths::{display_name, is_container, is_valid_child, parent_path};
use crate::protocols::ProtocolCatalog;
use crate::resource_urls::ResourceUrlCodec;
use crate::source_registry::ItemSourceRegistry;
use crate::update_tracker::UpdateTracker;
use crate::virtual_items::{Entry, Expander, ItemAddress, SubItem, marked_title};

const DEFAULT_HTTP_BASE_DIR: &str = "/upnp/condir/";
const DEFAULT_ROOT_TITLE: &str = "root";

/// Paramètres du service
#[derive(Debug, Clone)]
pub struct ContentDirectorySettings {
    /// Préfixe HTTP des URLs de ressources
    pub http_base_dir: String,
    /// Titre du conteneur racine
    pub root_title: String,
    /// Durée à partir de laquelle un item audio/vidéo devient un conteneur
    pub long_item: Duration,
    /// Pas du menu "Seek"
    pub seek_interval: Duration,
    /// Délai de coalescence des évènements
    pub update_interval: Duration,
    /// Préfixe des URLs quand la requête ne porte pas d'hôte
    pub base_url: Option<String>,
    pub protocols: ProtocolCatalog,
}

impl ContentDirectorySettings {
    /// Lit les paramètres depuis la configuration, en gardant les valeurs
    /// par défaut pour les clés invalides.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();

        let update_interval = config.get_update_interval().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid update interval, using default");
            defaults.update_interval
        });

        let protocols = match config.get_profiles() {
            Ok(profiles) => ProtocolCatalog::from_profiles(&profiles),
            Err(e) => {
                warn!(error = %e, "Invalid delivery profiles, none will be offered");
                ProtocolCatalog::default()
            }
        };

        Self {
            http_base_dir: config.get_http_base_dir(),
            root_title: config.get_root_title(),
            long_item: secs_or(config.get_long_item_secs(), "long_item_secs", defaults.long_item),
            seek_interval: secs_or(
                config.get_seek_interval_secs(),
                "seek_interval_secs",
                defaults.seek_interval,
            ),
            update_interval,
            base_url: config.get_base_url(),
            protocols,
        }
    }
}

fn secs_or<E: std::fmt::Display>(
    value: std::result::Result<usize, E>,
    key: &str,
    default: Duration,
) -> Duration {
    match value {
        Ok(v) => Duration::from_secs(v as u64),
        Err(e) => {
            warn!(key, error = %e, "Invalid configuration value, using default");
            default
        }
    }
}

impl Default for ContentDirectorySettings {
    fn default() -> Self {
        Self {
            http_base_dir: DEFAULT_HTTP_BASE_DIR.to_string(),
            root_title: DEFAULT_ROOT_TITLE.to_string(),
            long_item: Duration::from_secs(300),
            seek_interval: Duration::from_secs(120),
            update_interval: Duration::from_secs(2),
            base_url: None,
            protocols: ProtocolCatalog::default(),
        }
    }
}

/// Valeur de l'argument `BrowseFlag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

impl FromStr for BrowseFlag {
    type Err = ContentDirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BrowseMetadata" => Ok(BrowseFlag::Metadata),
            "BrowseDirectChildren" => Ok(BrowseFlag::DirectChildren),
            other => Err(ContentDirectoryError::InvalidArgument(format!(
                "BrowseFlag {other}"
            ))),
        }
    }
}

/// Réponse d'un Browse ou d'un Search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseResponse {
    /// Document DIDL-Lite
    pub result: String,
    pub number_returned: usize,
    pub total_matches: usize,
    pub update_id: u32,
}

/// Contexte HTTP d'une requête
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub user_agent: String,
    pub source_address: String,
    /// Valeur de l'en-tête `Host` (`ip:port`), utilisée dans les URLs
    pub host: String,
}

impl RequestInfo {
    pub fn new(
        user_agent: impl Into<String>,
        source_address: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            source_address: source_address.into(),
            host: host.into(),
        }
    }

    /// Identité du client transmise aux sources : premier mot du user agent
    pub fn client_id(&self) -> &str {
        self.user_agent.split(' ').next().unwrap_or_default()
    }
}

/// Représentation d'un enfant dans la réponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    Container,
    Item { marked: bool },
}

/// Moteur du ContentDirectory
///
/// Possède les tables d'identifiants et d'URLs, le registre des sources et
/// le suivi des UpdateID pour toute la durée de vie du service.
#[derive(Debug)]
pub struct ContentHandler {
    settings: ContentDirectorySettings,
    ids: IdentifierRegistry,
    urls: ResourceUrlCodec,
    sources: ItemSourceRegistry,
    tracker: UpdateTracker,
    expander: Expander,
}

impl ContentHandler {
    pub fn new(settings: ContentDirectorySettings) -> Self {
        Self {
            ids: IdentifierRegistry::new(),
            urls: ResourceUrlCodec::new(settings.http_base_dir.clone()),
            sources: ItemSourceRegistry::new(),
            tracker: UpdateTracker::new(settings.update_interval),
            expander: Expander::new(settings.seek_interval),
            settings,
        }
    }

    pub fn settings(&self) -> &ContentDirectorySettings {
        &self.settings
    }

    pub fn ids(&self) -> &IdentifierRegistry {
        &self.ids
    }

    pub fn urls(&self) -> &ResourceUrlCodec {
        &self.urls
    }

    pub fn sources(&self) -> &ItemSourceRegistry {
        &self.sources
    }

    pub fn tracker(&self) -> &UpdateTracker {
        &self.tracker
    }

    pub fn protocols(&self) -> &ProtocolCatalog {
        &self.settings.protocols
    }

    /// Browse un conteneur ou récupère les métadonnées d'un objet
    ///
    /// # Arguments
    ///
    /// * `object_id` - L'ID de l'objet à parcourir ("0" pour la racine)
    /// * `flag` - métadonnées de l'objet ou enfants directs
    /// * `start` - Index de départ pour la pagination
    /// * `count` - Nombre d'éléments demandés (0 = tous)
    pub async fn browse(
        &self,
        object_id: &str,
        flag: BrowseFlag,
        start: usize,
        count: usize,
        request: &RequestInfo,
    ) -> Result<BrowseResponse> {
        debug!(
            object_id = %object_id,
            flag = ?flag,
            start,
            count,
            client = %request.client_id(),
            "ContentDirectory::Browse"
        );

        let path = self.ids.from_id(object_id)?;
        let (_, source) = self
            .sources
            .resolve(&path)
            .await
            .ok_or_else(|| ContentDirectoryError::NotFound(path.clone()))?;

        let mut didl = DIDLLite::new();
        let total_matches = if is_container(&path) {
            self.browse_container(&mut didl, &path, flag, start, count, source.as_ref(), request)
                .await?
        } else {
            self.browse_leaf(&mut didl, &path, flag, start, count, source.as_ref(), request)
                .await?
        };

        let update_id = match flag {
            BrowseFlag::DirectChildren => self.tracker.observe_browse(object_id, start, total_matches),
            BrowseFlag::Metadata => self.tracker.current_update_id(object_id),
        };

        Ok(BrowseResponse {
            number_returned: didl.len(),
            result: didl.to_xml()?,
            total_matches,
            update_id,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn browse_container(
        &self,
        didl: &mut DIDLLite,
        path: &str,
        flag: BrowseFlag,
        start: usize,
        count: usize,
        source: &dyn ItemSource,
        request: &RequestInfo,
    ) -> Result<usize> {
        match flag {
            BrowseFlag::Metadata => {
                let title = if path == ROOT_PATH {
                    self.settings.root_title.clone()
                } else {
                    display_name(path).to_string()
                };
                didl.push_container(self.container(path, &title, ItemKind::None, true));
                Ok(1)
            }
            BrowseFlag::DirectChildren => {
                let listing = source
                    .list_children(request.client_id(), path, start, count)
                    .await?;

                for item in &listing.items {
                    if !is_valid_child(path, item) {
                        warn!(
                            container = %path,
                            child = %item.path,
                            source = %source.name(),
                            "Ignoring inconsistent child path"
                        );
                        continue;
                    }
                    self.add_child(didl, item, source, request);
                }
                Ok(listing.total)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn browse_leaf(
        &self,
        didl: &mut DIDLLite,
        path: &str,
        flag: BrowseFlag,
        start: usize,
        count: usize,
        source: &dyn ItemSource,
        request: &RequestInfo,
    ) -> Result<usize> {
        let address = ItemAddress::parse(path)
            .ok_or_else(|| ContentDirectoryError::NotFound(path.to_string()))?;
        let item = self.fetch_item(source, &address.base, request).await?;
        let selected = address.selected();

        match flag {
            BrowseFlag::DirectChildren => {
                let entries = self
                    .expander
                    .children(&item, selected.map(|e| &e.sub_item));
                let total = entries.len();
                let take = if count == 0 { usize::MAX } else { count };

                for entry in entries.iter().skip(start).take(take) {
                    let child_path = address.child_path(entry);
                    self.add_entry(didl, &item, entry, &child_path, source, request);
                }
                Ok(total)
            }
            BrowseFlag::Metadata => {
                match selected {
                    Some(entry) => self.add_entry(didl, &item, entry, path, source, request),
                    None if self.rendering(&item) == Rendering::Container => {
                        let title = marked_title(&item);
                        didl.push_container(self.container(path, &title, item.kind, false));
                    }
                    None => {
                        let title = item.title.clone();
                        self.add_file(didl, &item, path, &title, source, request);
                    }
                }
                Ok(1)
            }
        }
    }

    /// Item de base d'un chemin, `NotFound` pour l'item nul
    async fn fetch_item(
        &self,
        source: &dyn ItemSource,
        path: &str,
        request: &RequestInfo,
    ) -> Result<Item> {
        let item = source.get_item(request.client_id(), path).await?;
        if item.is_null() {
            debug!(path = %path, source = %source.name(), "Item has no content locator");
            return Err(ContentDirectoryError::NotFound(path.to_string()));
        }
        Ok(item)
    }

    /// Classement d'un enfant listé par une source
    fn rendering(&self, item: &Item) -> Rendering {
        if item.is_dir {
            return Rendering::Container;
        }
        match item.kind {
            ItemKind::None
            | ItemKind::Music
            | ItemKind::MusicVideo
            | ItemKind::Image
            | ItemKind::Photo => Rendering::Item { marked: false },
            ItemKind::AudioBroadcast | ItemKind::VideoBroadcast => Rendering::Item { marked: true },
            ItemKind::Audio | ItemKind::Video => {
                if item.duration < self.settings.long_item {
                    Rendering::Item { marked: true }
                } else {
                    Rendering::Container
                }
            }
            ItemKind::AudioBook | ItemKind::Movie => Rendering::Container,
        }
    }

    fn add_child(
        &self,
        didl: &mut DIDLLite,
        item: &Item,
        source: &dyn ItemSource,
        request: &RequestInfo,
    ) {
        match self.rendering(item) {
            Rendering::Container => {
                let title = marked_title(item);
                didl.push_container(self.container(&item.path, &title, item.kind, item.is_dir));
            }
            Rendering::Item { marked } => {
                let title = if marked {
                    marked_title(item)
                } else {
                    item.title.clone()
                };
                self.add_file(didl, item, &item.path, &title, source, request);
            }
        }
    }

    fn add_entry(
        &self,
        didl: &mut DIDLLite,
        item: &Item,
        entry: &Entry,
        path: &str,
        source: &dyn ItemSource,
        request: &RequestInfo,
    ) {
        match entry.sub_item {
            SubItem::Play { .. } => {
                let play = Expander::play_item(item, Some(entry));
                self.add_file(didl, &play, path, &entry.label, source, request);
            }
            SubItem::SeekMenu | SubItem::ChapterMenu => {
                didl.push_container(self.container(path, &entry.label, item.kind, false));
            }
        }
    }

    fn container(&self, path: &str, title: &str, kind: ItemKind, is_dir: bool) -> Container {
        let title = if title.is_empty() {
            match display_name(path) {
                "" => self.settings.root_title.clone(),
                name => name.to_string(),
            }
        } else {
            title.to_string()
        };

        Container {
            id: self.ids.intern(path),
            parent_id: self.ids.intern(&parent_path(path)),
            restricted: Some("1".to_string()),
            child_count: None,
            title,
            class: container_class(kind, is_dir).to_string(),
        }
    }

    fn add_file(
        &self,
        didl: &mut DIDLLite,
        item: &Item,
        path: &str,
        title: &str,
        source: &dyn ItemSource,
        request: &RequestInfo,
    ) {
        let not_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let mut resources = Vec::new();
        if !item.is_null() {
            let remaining = item.duration.saturating_sub(item.position);
            for mut protocol in self.settings.protocols.candidates(item) {
                if !source.negotiate_profile(item, &mut protocol) {
                    continue;
                }
                let token = self.urls.encode(path, &protocol.profile, &protocol.suffix);
                resources.push(Resource {
                    protocol_info: protocol.protocol_info(),
                    duration: (!remaining.is_zero()).then(|| format_res_duration(remaining)),
                    sample_frequency: (item.sample_rate > 0).then(|| item.sample_rate.to_string()),
                    nr_audio_channels: (item.channels > 0).then(|| item.channels.to_string()),
                    resolution: (item.width > 0 && item.height > 0)
                        .then(|| format!("{}x{}", item.width, item.height)),
                    url: self.resource_url(&token, request),
                });
            }
        }

        didl.push_item(cdsdidl::Item {
            id: self.ids.intern(path),
            parent_id: self.ids.intern(&parent_path(path)),
            restricted: Some("1".to_string()),
            title: title.to_string(),
            class: item_class(item.kind).to_string(),
            artist: not_empty(&item.artist),
            album: not_empty(&item.album),
            album_art: item.icon_url.clone(),
            original_track_number: (item.track > 0).then(|| item.track.to_string()),
            resources,
        });
    }

    /// URL absolue d'un token de ressource
    fn resource_url(&self, token: &str, request: &RequestInfo) -> String {
        if !request.host.is_empty() {
            format!("http://{}{}", request.host, token)
        } else if let Some(base) = &self.settings.base_url {
            format!("{}{}", base.trim_end_matches('/'), token)
        } else {
            token.to_string()
        }
    }

    /// Search : accepté mais sans capacité de recherche, toujours vide
    pub async fn search(
        &self,
        container_id: &str,
        criteria: &str,
        start: usize,
        count: usize,
    ) -> Result<BrowseResponse> {
        debug!(
            container_id = %container_id,
            criteria = %criteria,
            start,
            count,
            "ContentDirectory::Search"
        );

        Ok(BrowseResponse {
            result: DIDLLite::new().to_xml()?,
            number_returned: 0,
            total_matches: 0,
            update_id: self.tracker.system_update_id(),
        })
    }

    /// Ouvre le flux désigné par une URL de ressource.
    ///
    /// Toute erreur (token inconnu, source disparue, item nul, refus de la
    /// source) est rapportée comme `NotFound`.
    pub async fn serve_resource(
        &self,
        request_path: &str,
        request: &RequestInfo,
    ) -> Result<ServedResource> {
        let not_found = || ContentDirectoryError::NotFound(request_path.to_string());
        if !self.urls.handles(request_path) {
            return Err(not_found());
        }

        let (path, profile) = self.urls.decode(request_path)?;
        let (_, source) = self.sources.resolve(&path).await.ok_or_else(not_found)?;
        let address = ItemAddress::parse(&path).ok_or_else(not_found)?;
        let item = self
            .fetch_item(source.as_ref(), &address.base, request)
            .await
            .map_err(|_| not_found())?;

        let selected = address.selected();
        if selected.is_some_and(|e| !e.is_play()) {
            return Err(not_found());
        }
        let play = Expander::play_item(&item, selected);

        debug!(
            path = %path,
            profile = %profile,
            position_ms = play.position.as_millis() as u64,
            chapter = play.chapter,
            source = %source.name(),
            "Serving resource"
        );

        source
            .serve(&request.source_address, &play, &profile)
            .await
            .map_err(|e| {
                warn!(path = %path, profile = %profile, error = %e, "Source refused to serve resource");
                not_found()
            })
    }

    /// Signale que le contenu de `path` a changé.
    ///
    /// Sans effet si le conteneur n'a jamais été exposé à un client.
    pub fn notify_path_changed(&self, path: &str) -> bool {
        match self.ids.to_id(path, false) {
            Some(id) if id != ROOT_ID && id != NO_OBJECT_ID => self.tracker.bump_container(&id),
            _ => false,
        }
    }

    /// Oublie tous les identifiants et toutes les versions (arrêt du service)
    pub fn clear(&self) {
        self.tracker.clear();
        self.ids.clear();
        self.urls.clear();
    }
}

fn container_class(kind: ItemKind, is_dir: bool) -> &'static str {
    if is_dir {
        return "object.container.storageFolder";
    }
    match kind {
        ItemKind::Music | ItemKind::MusicVideo => "object.container.album.musicAlbum",
        ItemKind::Photo => "object.container.album.photoAlbum",
        _ => "object.container.album",
    }
}

fn item_class(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::None => "object.item",
        ItemKind::Audio => "object.item.audioItem",
        ItemKind::Music => "object.item.audioItem.musicTrack",
        ItemKind::AudioBroadcast => "object.item.audioItem.audioBroadcast",
        ItemKind::AudioBook => "object.item.audioItem.audioBook",
        ItemKind::Video => "object.item.videoItem",
        ItemKind::Movie => "object.item.videoItem.movie",
        ItemKind::VideoBroadcast => "object.item.videoItem.videoBroadcast",
        ItemKind::MusicVideo => "object.item.videoItem.musicVideoClip",
        ItemKind::Image => "object.item.imageItem",
        ItemKind::Photo => "object.item.imageItem.photo",
    }
}

/// Durée d'une ressource : `H:MM:SS.mmm`
fn format_res_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    let seconds = ms / 1000;
    format!(
        "{}:{:02}:{:02}.{:03}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60,
        ms % 1000
    )
}
