//! # cdsdidl - DIDL-Lite
//!
//! Structures DIDL-Lite (UPnP AV) sérialisées et parsées avec `quick-xml`.
//! Le ContentDirectory produit ces documents pour les réponses `Browse`;
//! le parseur sert aux clients et aux tests.

use serde::{Deserialize, Serialize};

pub const NS_DIDL_LITE: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const NS_UPNP: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_DLNA: &str = "urn:schemas-dlna-org:metadata-1-0/";

/// Erreurs de (dé)sérialisation DIDL-Lite
#[derive(Debug, thiserror::Error)]
pub enum DidlError {
    #[error("Failed to serialize DIDL-Lite: {0}")]
    Serialize(String),

    #[error("Failed to parse DIDL-Lite: {0}")]
    Parse(#[from] quick_xml::de::DeError),
}

// ============= Structures DIDL-Lite =============

/// Racine d'un document DIDL-Lite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DIDLLite {
    #[serde(rename = "@xmlns", default)]
    pub xmlns: String,

    #[serde(rename = "@xmlns:upnp", skip_serializing_if = "Option::is_none")]
    pub xmlns_upnp: Option<String>,

    #[serde(rename = "@xmlns:dc", skip_serializing_if = "Option::is_none")]
    pub xmlns_dc: Option<String>,

    #[serde(rename = "@xmlns:dlna", skip_serializing_if = "Option::is_none")]
    pub xmlns_dlna: Option<String>,

    /// Containers et items dans l'ordre du document
    #[serde(rename = "$value", default)]
    pub objects: Vec<DidlObject>,
}

/// Objet de premier niveau d'un document DIDL-Lite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DidlObject {
    #[serde(rename = "container")]
    Container(Container),
    #[serde(rename = "item")]
    Item(Item),
}

impl DidlObject {
    pub fn id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.id,
            DidlObject::Item(i) => &i.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.title,
            DidlObject::Item(i) => &i.title,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DidlObject::Container(_))
    }
}

/// Container (dossier) du ContentDirectory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "@childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,
}

/// Item (feuille) du ContentDirectory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:album",
        alias = "album",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<String>,

    #[serde(
        rename = "upnp:originalTrackNumber",
        alias = "originalTrackNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_track_number: Option<String>,

    #[serde(rename = "res", default)]
    pub resources: Vec<Resource>,
}

/// Ressource média : une URL par profil de diffusion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "@protocolInfo")]
    pub protocol_info: String,

    #[serde(rename = "@duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(rename = "@sampleFrequency", skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,

    #[serde(rename = "@nrAudioChannels", skip_serializing_if = "Option::is_none")]
    pub nr_audio_channels: Option<String>,

    #[serde(rename = "@resolution", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(rename = "$text")]
    pub url: String,
}

// ============= Implémentation des méthodes =============

impl DIDLLite {
    /// Document vide avec les namespaces standard (DIDL-Lite, upnp, dc, dlna)
    pub fn new() -> Self {
        Self {
            xmlns: NS_DIDL_LITE.to_string(),
            xmlns_upnp: Some(NS_UPNP.to_string()),
            xmlns_dc: Some(NS_DC.to_string()),
            xmlns_dlna: Some(NS_DLNA.to_string()),
            objects: Vec::new(),
        }
    }

    /// Parse un document DIDL-Lite
    pub fn parse(input: &str) -> Result<Self, DidlError> {
        Ok(quick_xml::de::from_str(input)?)
    }

    /// Sérialise le document en XML
    pub fn to_xml(&self) -> Result<String, DidlError> {
        quick_xml::se::to_string(self).map_err(|e| DidlError::Serialize(e.to_string()))
    }

    /// Nombre total d'objets (containers + items)
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn push_container(&mut self, container: Container) {
        self.objects.push(DidlObject::Container(container));
    }

    pub fn push_item(&mut self, item: Item) {
        self.objects.push(DidlObject::Item(item));
    }

    /// Containers, dans l'ordre du document
    pub fn containers(&self) -> Vec<&Container> {
        self.objects
            .iter()
            .filter_map(|o| match o {
                DidlObject::Container(c) => Some(c),
                DidlObject::Item(_) => None,
            })
            .collect()
    }

    /// Items, dans l'ordre du document
    pub fn items(&self) -> Vec<&Item> {
        self.objects
            .iter()
            .filter_map(|o| match o {
                DidlObject::Item(i) => Some(i),
                DidlObject::Container(_) => None,
            })
            .collect()
    }

    /// Trouve un container par ID
    pub fn get_container_by_id(&self, id: &str) -> Option<&Container> {
        self.containers().into_iter().find(|c| c.id == id)
    }

    /// Trouve un item par ID
    pub fn get_item_by_id(&self, id: &str) -> Option<&Item> {
        self.items().into_iter().find(|i| i.id == id)
    }

    /// Titres des objets, dans l'ordre du document
    pub fn titles(&self) -> Vec<&str> {
        self.objects.iter().map(DidlObject::title).collect()
    }

    /// IDs des objets, dans l'ordre du document
    pub fn ids(&self) -> Vec<&str> {
        self.objects.iter().map(DidlObject::id).collect()
    }
}

impl Item {
    /// Retourne la ressource principale (première disponible)
    pub fn primary_resource(&self) -> Option<&Resource> {
        self.resources.first()
    }
}
