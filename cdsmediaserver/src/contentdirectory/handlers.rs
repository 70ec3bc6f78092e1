//! # Handlers pour les actions ContentDirectory
//!
//! Fait le pont entre les actions SOAP (nom + arguments texte) et les
//! opérations typées de [`ContentDirectory`].
//!
//! ```text
//! UPnP Action (XML)
//!       ↓
//! handle_action (ce module) - extraction des paramètres
//!       ↓
//! ContentHandler - logique métier
//!       ↓
//! Sources
//! ```

use std::collections::HashMap;

use tracing::debug;

use super::ContentDirectory;
use crate::content_handler::{BrowseFlag, BrowseResponse, RequestInfo};
use crate::errors::{ContentDirectoryError, Result};

/// Arguments de sortie d'une action, dans l'ordre de la description SCPD
pub type ActionOutput = Vec<(String, String)>;

fn required<'a>(args: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| ContentDirectoryError::InvalidArgument(format!("{name} not found")))
}

/// Argument `ui4` ; absent vaut 0
fn ui4(args: &HashMap<String, String>, name: &str) -> Result<usize> {
    match args.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(0),
        Some(value) => value.parse::<u32>().map(|v| v as usize).map_err(|_| {
            ContentDirectoryError::InvalidArgument(format!("{name} must be an unsigned integer"))
        }),
    }
}

fn browse_output(response: BrowseResponse) -> ActionOutput {
    vec![
        ("Result".to_string(), response.result),
        (
            "NumberReturned".to_string(),
            response.number_returned.to_string(),
        ),
        ("TotalMatches".to_string(), response.total_matches.to_string()),
        ("UpdateID".to_string(), response.update_id.to_string()),
    ]
}

impl ContentDirectory {
    /// Exécute l'action SOAP `name`.
    ///
    /// Retourne les arguments de sortie ; une action inconnue donne
    /// [`ContentDirectoryError::InvalidAction`].
    pub async fn handle_action(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        request: &RequestInfo,
    ) -> Result<ActionOutput> {
        match name {
            "Browse" => {
                debug!("📂 Browse handler called");
                let object_id = required(args, "ObjectID")?;
                let flag: BrowseFlag = required(args, "BrowseFlag")?.parse()?;
                let start = ui4(args, "StartingIndex")?;
                let count = ui4(args, "RequestedCount")?;

                let response = self.browse(object_id, flag, start, count, request).await?;
                debug!(
                    object_id = %object_id,
                    returned = response.number_returned,
                    total = response.total_matches,
                    "✅ Browse completed"
                );
                Ok(browse_output(response))
            }
            "Search" => {
                debug!("🔍 Search handler called");
                let container_id = required(args, "ContainerID")?;
                let criteria = args.get("SearchCriteria").map(String::as_str).unwrap_or("");
                let start = ui4(args, "StartingIndex")?;
                let count = ui4(args, "RequestedCount")?;

                let response = self.search(container_id, criteria, start, count).await?;
                Ok(browse_output(response))
            }
            "GetSearchCapabilities" => Ok(vec![(
                "SearchCaps".to_string(),
                self.get_search_capabilities(),
            )]),
            "GetSortCapabilities" => Ok(vec![(
                "SortCaps".to_string(),
                self.get_sort_capabilities(),
            )]),
            "GetSystemUpdateID" => Ok(vec![(
                "Id".to_string(),
                self.get_system_update_id().to_string(),
            )]),
            "X_GetFeatureList" => Ok(vec![(
                "FeatureList".to_string(),
                self.x_get_feature_list()?,
            )]),
            other => Err(ContentDirectoryError::InvalidAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_handler::ContentDirectorySettings;
    use crate::contentdirectory::{ResourceHandler, Transport};
    use std::sync::Arc;

    struct NullTransport;

    impl Transport for NullTransport {
        fn register_resource_handler(&self, _prefix: &str, _handler: Arc<dyn ResourceHandler>) {}
        fn unregister_resource_handler(&self, _prefix: &str) {}
        fn post_event(&self, _service_id: &str) {}
        fn current_subscriber_count(&self) -> usize {
            0
        }
    }

    fn service() -> ContentDirectory {
        ContentDirectory::new(ContentDirectorySettings::default(), Arc::new(NullTransport))
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_browse_root() {
        let cd = service();
        let out = cd
            .handle_action(
                "Browse",
                &args(&[
                    ("ObjectID", "0"),
                    ("BrowseFlag", "BrowseMetadata"),
                    ("Filter", "*"),
                    ("StartingIndex", "0"),
                    ("RequestedCount", "0"),
                    ("SortCriteria", ""),
                ]),
                &RequestInfo::default(),
            )
            .await
            .unwrap();

        let names: Vec<_> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Result", "NumberReturned", "TotalMatches", "UpdateID"]);
        assert!(out[0].1.contains("<dc:title>root</dc:title>"));
        assert_eq!(out[1].1, "1");
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let cd = service();
        let request = RequestInfo::default();

        let err = cd
            .handle_action(
                "Browse",
                &args(&[("ObjectID", "0"), ("BrowseFlag", "BrowseEverything")]),
                &request,
            )
            .await
            .unwrap_err();
        assert_eq!(err.upnp_error_code(), 402);

        let err = cd
            .handle_action(
                "Browse",
                &args(&[
                    ("ObjectID", "0"),
                    ("BrowseFlag", "BrowseDirectChildren"),
                    ("StartingIndex", "-3"),
                ]),
                &request,
            )
            .await
            .unwrap_err();
        assert_eq!(err.upnp_error_code(), 402);

        let err = cd
            .handle_action("Browse", &args(&[("BrowseFlag", "BrowseMetadata")]), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentDirectoryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let err = service()
            .handle_action("DestroyObject", &HashMap::new(), &RequestInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentDirectoryError::InvalidAction(_)));
        assert_eq!(err.upnp_error_code(), 401);
    }

    #[tokio::test]
    async fn test_simple_actions() {
        let cd = service();
        let request = RequestInfo::default();

        let caps = cd
            .handle_action("GetSearchCapabilities", &HashMap::new(), &request)
            .await
            .unwrap();
        assert_eq!(caps, vec![("SearchCaps".to_string(), String::new())]);

        let id = cd
            .handle_action("GetSystemUpdateID", &HashMap::new(), &request)
            .await
            .unwrap();
        assert_eq!(id[0].1, cd.get_system_update_id().to_string());

        let search = cd
            .handle_action(
                "Search",
                &args(&[("ContainerID", "0"), ("SearchCriteria", "dc:title contains \"x\"")]),
                &request,
            )
            .await
            .unwrap();
        assert_eq!(search[1].1, "0");
        assert_eq!(search[2].1, "0");

        let features = cd
            .handle_action("X_GetFeatureList", &HashMap::new(), &request)
            .await
            .unwrap();
        assert!(features[0].1.contains("samsung.com_BASICVIEW"));
    }
}
