//! Cœur ContentDirectory d'un MediaServer UPnP/DLNA.
//!
//! Ce crate expose, sous la forme d'un arbre UPnP navigable, le contenu de
//! plusieurs sources ([`cdssource::ItemSource`]) montées dans un espace de
//! chemins virtuels unique.
//!
//! # Architecture
//!
//! - [`object_ids`] : chemins virtuels <-> ObjectID UPnP
//! - [`resource_urls`] : (chemin, profil) <-> URL de ressource
//! - [`source_registry`] : montage des sources sur des préfixes
//! - [`virtual_items`] : sous-items Play/Resume, Seek et Chapters
//! - [`update_tracker`] : SystemUpdateID, ContainerUpdateIDs et eventing
//! - [`content_handler`] : moteur Browse/Search et service des ressources
//! - [`contentdirectory`] : service UPnP (actions, SCPD, faults)
//!
//! # Utilisation de base
//!
//! ```ignore
//! use cdsmediaserver::{ContentDirectory, ContentDirectorySettings, BrowseFlag, RequestInfo};
//! use std::sync::Arc;
//!
//! let cd = ContentDirectory::new(ContentDirectorySettings::default(), transport);
//! cd.register_source("/Movies/", Arc::new(movies)).await;
//! cd.initialize();
//!
//! let request = RequestInfo::new("Renderer/1.0", "10.0.0.2", "10.0.0.1:4280");
//! let page = cd.browse("0", BrowseFlag::DirectChildren, 0, 0, &request).await?;
//! println!("{}", page.result);
//! ```

pub mod content_handler;
pub mod contentdirectory;
pub mod errors;
pub mod object_ids;
pub mod paths;
pub mod protocols;
pub mod resource_urls;
pub mod source_registry;
pub mod update_tracker;
pub mod virtual_items;

pub use content_handler::{
    BrowseFlag, BrowseResponse, ContentDirectorySettings, ContentHandler, RequestInfo,
};
pub use contentdirectory::{
    ContentDirectory, ResourceHandler, SERVICE_ID, SERVICE_TYPE, Transport,
};
pub use errors::{ContentDirectoryError, Result};
pub use object_ids::{IdentifierRegistry, NO_OBJECT_ID, ROOT_ID};
pub use protocols::ProtocolCatalog;
pub use resource_urls::ResourceUrlCodec;
pub use source_registry::ItemSourceRegistry;
pub use update_tracker::UpdateTracker;
pub use virtual_items::{Entry, Expander, ItemAddress, SubItem};
