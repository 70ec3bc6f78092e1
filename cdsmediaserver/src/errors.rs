//! Erreurs du service ContentDirectory.

use cdssource::ItemSourceError;
use thiserror::Error;

/// Erreurs remontées par le ContentDirectory
#[derive(Debug, Error)]
pub enum ContentDirectoryError {
    /// ObjectID, token de ressource ou chemin inconnu
    #[error("No such object: {0}")]
    NotFound(String),

    /// Argument d'action invalide (BrowseFlag, index, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Action SOAP inconnue
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Une source a échoué pendant l'appel
    #[error("Item source unavailable: {0}")]
    ProviderUnavailable(String),

    /// Échec de génération du document de réponse
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl ContentDirectoryError {
    /// Code d'erreur UPnP et description associée
    ///
    /// `ProviderUnavailable` est présenté au client comme un objet introuvable.
    pub fn upnp_error(&self) -> (u16, &'static str) {
        match self {
            ContentDirectoryError::NotFound(_) | ContentDirectoryError::ProviderUnavailable(_) => {
                (701, "No such object")
            }
            ContentDirectoryError::InvalidAction(_) => (401, "Invalid Action"),
            ContentDirectoryError::InvalidArgument(_) => (402, "Invalid Args"),
            ContentDirectoryError::Serialization(_) => (501, "Action Failed"),
        }
    }

    pub fn upnp_error_code(&self) -> u16 {
        self.upnp_error().0
    }

    /// Vrai pour toutes les erreurs vues comme "objet introuvable"
    pub fn is_not_found(&self) -> bool {
        self.upnp_error_code() == 701
    }
}

impl From<ItemSourceError> for ContentDirectoryError {
    fn from(err: ItemSourceError) -> Self {
        match err {
            ItemSourceError::NotFound(path) => ContentDirectoryError::NotFound(path),
            other => ContentDirectoryError::ProviderUnavailable(other.to_string()),
        }
    }
}

impl From<cdsdidl::DidlError> for ContentDirectoryError {
    fn from(err: cdsdidl::DidlError) -> Self {
        ContentDirectoryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContentDirectoryError>;
