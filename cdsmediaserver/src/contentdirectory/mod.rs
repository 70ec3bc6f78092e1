//! # ContentDirectory Service - Service de gestion du contenu UPnP
//!
//! Ce module expose le service ContentDirectory:1 au-dessus du moteur
//! [`ContentHandler`] : actions SOAP, description SCPD, variables
//! évènementielles et service des ressources HTTP.
//!
//! ## Actions
//!
//! - ✅ Browse
//! - ✅ Search (aucune capacité de recherche, toujours vide)
//! - ✅ GetSearchCapabilities
//! - ✅ GetSortCapabilities
//! - ✅ GetSystemUpdateID
//! - ✅ X_GetFeatureList (Samsung)
//!
//! ## Collaborateurs
//!
//! Le transport HTTP/eventing n'est pas implémenté ici. L'hôte fournit un
//! [`Transport`] qui reçoit le handler des ressources et les notifications
//! de changement des variables d'état.
//!
//! ```rust,ignore
//! let cd = ContentDirectory::new(ContentDirectorySettings::default(), transport);
//! cd.register_source("/Movies/", Arc::new(movies)).await;
//! cd.initialize();
//!
//! let response = cd
//!     .browse("0", BrowseFlag::DirectChildren, 0, 0, &request)
//!     .await?;
//! ```

pub mod fault;
pub mod handlers;
pub mod scpd;

use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cdssource::{ItemSource, ServedResource};
use tracing::{debug, info, warn};
use xmltree::Element;

use crate::content_handler::{
    BrowseFlag, BrowseResponse, ContentDirectorySettings, ContentHandler, RequestInfo,
};
use crate::errors::{ContentDirectoryError, Result};

pub use fault::build_soap_fault;

/// Identifiant du service dans la description du device
pub const SERVICE_ID: &str = "urn:upnp-org:serviceId:ContentDirectory";

/// Type du service
pub const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Handler des requêtes HTTP sur les URLs de ressources
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, request_path: &str, request: &RequestInfo) -> Result<ServedResource>;
}

#[async_trait]
impl ResourceHandler for ContentHandler {
    async fn handle(&self, request_path: &str, request: &RequestInfo) -> Result<ServedResource> {
        self.serve_resource(request_path, request).await
    }
}

/// Transport HTTP et eventing fournis par l'hôte
pub trait Transport: Send + Sync {
    /// Route les requêtes HTTP commençant par `prefix` vers `handler`
    fn register_resource_handler(&self, prefix: &str, handler: Arc<dyn ResourceHandler>);

    fn unregister_resource_handler(&self, prefix: &str);

    /// Signale que les variables évènementielles de `service_id` ont changé.
    /// L'appel ne doit pas bloquer.
    fn post_event(&self, service_id: &str);

    /// Nombre d'abonnés actifs
    fn current_subscriber_count(&self) -> usize;
}

/// Service ContentDirectory
pub struct ContentDirectory {
    handler: Arc<ContentHandler>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ContentDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDirectory")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

impl ContentDirectory {
    pub fn new(settings: ContentDirectorySettings, transport: Arc<dyn Transport>) -> Self {
        let handler = Arc::new(ContentHandler::new(settings));

        let weak: Weak<dyn Transport> = Arc::downgrade(&transport);
        handler.tracker().set_notifier(Arc::new(move || {
            if let Some(transport) = weak.upgrade() {
                transport.post_event(SERVICE_ID);
            }
        }));

        Self { handler, transport }
    }

    pub fn handler(&self) -> &Arc<ContentHandler> {
        &self.handler
    }

    /// Démarre le service : nouveau SystemUpdateID et enregistrement du
    /// handler des ressources.
    pub fn initialize(&self) {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        self.handler.tracker().seed_system_update_id(seed);

        let prefix = self.handler.urls().base_dir().to_string();
        let resources: Arc<dyn ResourceHandler> = self.handler.clone();
        self.transport.register_resource_handler(&prefix, resources);

        self.handler
            .tracker()
            .connections_changed(self.transport.current_subscriber_count());

        info!(
            prefix = %prefix,
            system_update_id = self.handler.tracker().system_update_id(),
            "✅ ContentDirectory initialized"
        );
    }

    /// Arrête le service : toutes les tables sont vidées, les identifiants
    /// distribués ne sont plus valides.
    pub fn close(&self) {
        self.transport
            .unregister_resource_handler(self.handler.urls().base_dir());
        self.handler.clear();
        info!("ContentDirectory closed");
    }

    /// Monte une source et invalide les caches des clients
    pub async fn register_source(&self, prefix: &str, source: Arc<dyn ItemSource>) -> String {
        let prefix = self.handler.sources().register(prefix, source).await;
        self.handler.tracker().bump_system();
        prefix
    }

    pub async fn unregister_source(&self, prefix: &str) -> bool {
        let removed = self.handler.sources().unregister(prefix).await;
        if removed {
            self.handler.tracker().bump_system();
        }
        removed
    }

    pub async fn browse(
        &self,
        object_id: &str,
        flag: BrowseFlag,
        start: usize,
        count: usize,
        request: &RequestInfo,
    ) -> Result<BrowseResponse> {
        self.handler
            .browse(object_id, flag, start, count, request)
            .await
            .map_err(|e| Self::surface(object_id, e))
    }

    pub async fn search(
        &self,
        container_id: &str,
        criteria: &str,
        start: usize,
        count: usize,
    ) -> Result<BrowseResponse> {
        self.handler
            .search(container_id, criteria, start, count)
            .await
            .map_err(|e| Self::surface(container_id, e))
    }

    /// Les pannes de source sont présentées comme des objets introuvables
    fn surface(object_id: &str, err: ContentDirectoryError) -> ContentDirectoryError {
        match err {
            ContentDirectoryError::ProviderUnavailable(reason) => {
                warn!(object_id = %object_id, reason = %reason, "Item source failed");
                ContentDirectoryError::NotFound(object_id.to_string())
            }
            other => other,
        }
    }

    pub fn get_search_capabilities(&self) -> String {
        String::new()
    }

    pub fn get_sort_capabilities(&self) -> String {
        String::new()
    }

    pub fn get_system_update_id(&self) -> u32 {
        self.handler.tracker().system_update_id()
    }

    /// Document `FeatureList` de l'action Samsung X_GetFeatureList
    pub fn x_get_feature_list(&self) -> Result<String> {
        scpd::feature_list_xml()
    }

    pub async fn serve_resource(
        &self,
        request_path: &str,
        request: &RequestInfo,
    ) -> Result<ServedResource> {
        self.handler.serve_resource(request_path, request).await
    }

    /// Voir [`ContentHandler::notify_path_changed`]
    pub fn notify_path_changed(&self, path: &str) -> bool {
        let bumped = self.handler.notify_path_changed(path);
        debug!(path = %path, bumped, "Path changed");
        bumped
    }

    /// À appeler par le ConnectionManager quand le nombre de connexions change
    pub fn connections_changed(&self, count: usize) {
        self.handler.tracker().connections_changed(count);
    }

    /// Variables évènementielles et leurs valeurs courantes
    pub fn eventable_properties(&self) -> Vec<(String, String)> {
        let tracker = self.handler.tracker();
        let mut props = vec![(
            "SystemUpdateID".to_string(),
            tracker.system_update_id().to_string(),
        )];

        let container_update_ids = tracker.container_update_ids();
        if !container_update_ids.is_empty() {
            props.push(("ContainerUpdateIDs".to_string(), container_update_ids));
        }

        props.push(("TransferIDs".to_string(), String::new()));
        props
    }

    /// Valeur `SourceProtocolInfo` pour le ConnectionManager
    pub fn source_protocol_info(&self) -> String {
        self.handler.protocols().source_protocol_info()
    }

    pub fn scpd_element(&self) -> Element {
        scpd::scpd_element()
    }

    pub fn scpd_xml(&self) -> Result<String> {
        scpd::to_xml(&self.scpd_element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        prefixes: Mutex<Vec<String>>,
        events: AtomicUsize,
        subscribers: AtomicUsize,
    }

    impl Transport for RecordingTransport {
        fn register_resource_handler(&self, prefix: &str, _handler: Arc<dyn ResourceHandler>) {
            self.prefixes.lock().push(prefix.to_string());
        }

        fn unregister_resource_handler(&self, prefix: &str) {
            self.prefixes.lock().retain(|p| p != prefix);
        }

        fn post_event(&self, _service_id: &str) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn current_subscriber_count(&self) -> usize {
            self.subscribers.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_initialize_and_close() {
        let transport = Arc::new(RecordingTransport::default());
        let cd = ContentDirectory::new(ContentDirectorySettings::default(), transport.clone());

        cd.initialize();
        assert_eq!(*transport.prefixes.lock(), vec!["/upnp/condir/".to_string()]);
        assert_ne!(cd.get_system_update_id(), 0);

        cd.handler().ids().intern("/Movies/");
        cd.close();
        assert!(transport.prefixes.lock().is_empty());
        assert!(cd.handler().ids().is_empty());
    }

    #[test]
    fn test_capabilities_are_empty() {
        let cd = ContentDirectory::new(
            ContentDirectorySettings::default(),
            Arc::new(RecordingTransport::default()),
        );
        assert_eq!(cd.get_search_capabilities(), "");
        assert_eq!(cd.get_sort_capabilities(), "");
    }

    #[test]
    fn test_eventable_properties() {
        let transport = Arc::new(RecordingTransport::default());
        let cd = ContentDirectory::new(ContentDirectorySettings::default(), transport.clone());

        let names: Vec<_> = cd.eventable_properties().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["SystemUpdateID", "TransferIDs"]);

        // hors runtime, la publication est immédiate
        let id = cd.handler().ids().intern("/Movies/");
        cd.handler().tracker().observe_browse(&id, 0, 1);
        assert!(cd.notify_path_changed("/Movies/"));
        assert_eq!(transport.events.load(Ordering::SeqCst), 1);

        let props = cd.eventable_properties();
        assert_eq!(props[1].0, "ContainerUpdateIDs");
        assert_eq!(props[1].1, format!("{id},1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_during_connection_is_evented_later() {
        let transport = Arc::new(RecordingTransport::default());
        let cd = ContentDirectory::new(ContentDirectorySettings::default(), transport.clone());
        cd.initialize();
        let before = cd.get_system_update_id();

        cd.connections_changed(1);
        cd.register_source("/X/", Arc::new(cdssource::MemorySource::new("x", "/X/")))
            .await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cd.get_system_update_id(), before.wrapping_add(1));
        assert_eq!(transport.events.load(Ordering::SeqCst), 0);

        cd.connections_changed(0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failures_surface_as_not_found() {
        #[derive(Debug)]
        struct Broken;

        #[async_trait]
        impl ItemSource for Broken {
            fn name(&self) -> &str {
                "broken"
            }

            async fn list_children(
                &self,
                _client: &str,
                _path: &str,
                _start: usize,
                _count: usize,
            ) -> cdssource::Result<cdssource::Listing> {
                Err(cdssource::ItemSourceError::Unavailable("disk gone".into()))
            }

            async fn get_item(&self, _client: &str, path: &str) -> cdssource::Result<cdssource::Item> {
                Err(cdssource::ItemSourceError::NotFound(path.to_string()))
            }
        }

        let cd = ContentDirectory::new(
            ContentDirectorySettings::default(),
            Arc::new(RecordingTransport::default()),
        );
        cd.register_source("/Broken/", Arc::new(Broken)).await;
        let id = cd.handler().ids().intern("/Broken/");

        let err = cd
            .browse(&id, BrowseFlag::DirectChildren, 0, 0, &RequestInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentDirectoryError::NotFound(_)));
        assert_eq!(err.upnp_error_code(), 701);
    }
}
