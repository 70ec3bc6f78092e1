//! # Source Registry - Montage des sources dans l'arbre virtuel
//!
//! Chaque [`ItemSource`] est montée sur un préfixe de chemin (`/Movies/`,
//! `/Library/Music/`, ...). Un chemin est servi par la source dont le
//! préfixe est le plus long préfixe du chemin. Tout ce qui n'est couvert par
//! aucun montage (la racine `/` et les dossiers intermédiaires comme
//! `/Library/`) est servi par une source racine synthétique qui liste les
//! points de montage.
//!
//! Le registre utilise `Arc<RwLock<...>>` : plusieurs requêtes peuvent
//! résoudre des chemins en parallèle, le montage prend un verrou exclusif.

use std::sync::Arc;

use async_trait::async_trait;
use cdssource::{Item, ItemSource, ItemSourceError, Listing};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::object_ids::ROOT_PATH;
use crate::paths::display_name;

#[derive(Debug, Clone)]
struct Binding {
    prefix: String,
    source: Arc<dyn ItemSource>,
}

type Bindings = Arc<RwLock<Vec<Binding>>>;

/// Normalise un préfixe de montage sous la forme `/a/b/`
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        ROOT_PATH.to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Registre des sources montées
#[derive(Debug, Clone)]
pub struct ItemSourceRegistry {
    bindings: Bindings,
    root: Arc<RootSource>,
}

impl ItemSourceRegistry {
    pub fn new() -> Self {
        let bindings: Bindings = Arc::new(RwLock::new(Vec::new()));
        Self {
            root: Arc::new(RootSource {
                bindings: bindings.clone(),
            }),
            bindings,
        }
    }

    /// Monte `source` sur `prefix`.
    ///
    /// Un montage existant sur le même préfixe est remplacé en conservant sa
    /// position (l'ordre d'enregistrement est l'ordre d'affichage).
    pub async fn register(&self, prefix: &str, source: Arc<dyn ItemSource>) -> String {
        let prefix = normalize_prefix(prefix);
        let mut bindings = self.bindings.write().await;

        info!(
            prefix = %prefix,
            source_name = %source.name(),
            "Registering item source"
        );

        match bindings.iter_mut().find(|b| b.prefix == prefix) {
            Some(binding) => binding.source = source,
            None => bindings.push(Binding {
                prefix: prefix.clone(),
                source,
            }),
        }
        prefix
    }

    /// Démonte la source de `prefix`
    pub async fn unregister(&self, prefix: &str) -> bool {
        let prefix = normalize_prefix(prefix);
        let mut bindings = self.bindings.write().await;
        let before = bindings.len();
        bindings.retain(|b| b.prefix != prefix);

        if bindings.len() < before {
            info!(prefix = %prefix, "Removed item source");
            true
        } else {
            false
        }
    }

    /// Source responsable de `path`, avec le préfixe qui l'a sélectionnée.
    ///
    /// `None` pour un chemin qui n'est pas absolu.
    pub async fn resolve(&self, path: &str) -> Option<(String, Arc<dyn ItemSource>)> {
        if !path.starts_with('/') {
            return None;
        }

        let bindings = self.bindings.read().await;
        let mounted = bindings
            .iter()
            .filter(|b| path.starts_with(&b.prefix))
            .max_by_key(|b| b.prefix.len());

        match mounted {
            Some(binding) => Some((binding.prefix.clone(), binding.source.clone())),
            None => {
                let root: Arc<dyn ItemSource> = self.root.clone();
                Some((ROOT_PATH.to_string(), root))
            }
        }
    }

    /// Préfixes montés, dans l'ordre d'enregistrement
    pub async fn prefixes(&self) -> Vec<String> {
        let bindings = self.bindings.read().await;
        bindings.iter().map(|b| b.prefix.clone()).collect()
    }

    pub async fn count(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn clear(&self) {
        self.bindings.write().await.clear();
    }
}

impl Default for ItemSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Source synthétique des dossiers qui ne sont couverts par aucun montage
#[derive(Debug)]
pub struct RootSource {
    bindings: Bindings,
}

impl RootSource {
    /// Enfants directs de `path` menant à un point de montage, dans l'ordre
    /// d'enregistrement, avec les sources montées sous chacun d'eux.
    async fn mount_children(&self, path: &str) -> Vec<(String, Vec<Binding>)> {
        let bindings = self.bindings.read().await;
        let mut children: Vec<(String, Vec<Binding>)> = Vec::new();

        for binding in bindings.iter() {
            let Some(rest) = binding.prefix.strip_prefix(path) else {
                continue;
            };
            let Some(slash) = rest.find('/') else {
                continue;
            };
            if slash == 0 {
                continue;
            }
            let child = format!("{path}{}", &rest[..=slash]);
            match children.iter_mut().find(|(c, _)| *c == child) {
                Some((_, under)) => under.push(binding.clone()),
                None => children.push((child, vec![binding.clone()])),
            }
        }
        children
    }

    /// Vrai si une des sources montées sous un dossier a du contenu
    async fn has_content(client: &str, under: &[Binding]) -> bool {
        for binding in under {
            match binding.source.list_children(client, &binding.prefix, 0, 1).await {
                Ok(listing) if listing.total > 0 => return true,
                Ok(_) => {}
                Err(e) => warn!(
                    prefix = %binding.prefix,
                    error = %e,
                    "Mounted source failed to list its root"
                ),
            }
        }
        false
    }
}

#[async_trait]
impl ItemSource for RootSource {
    fn name(&self) -> &str {
        "root"
    }

    async fn list_children(
        &self,
        client: &str,
        path: &str,
        start: usize,
        count: usize,
    ) -> cdssource::Result<Listing> {
        let mut all = Vec::new();
        for (child, under) in self.mount_children(path).await {
            if Self::has_content(client, &under).await {
                let title = display_name(&child).to_string();
                all.push(Item::directory(child, title));
            }
        }
        Ok(Listing::paginate(all, start, count))
    }

    async fn get_item(&self, _client: &str, path: &str) -> cdssource::Result<Item> {
        let known = path == ROOT_PATH
            || (path.ends_with('/')
                && self
                    .bindings
                    .read()
                    .await
                    .iter()
                    .any(|b| b.prefix.starts_with(path)));

        if known {
            Ok(Item::directory(path, display_name(path)))
        } else {
            Err(ItemSourceError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdssource::{ItemKind, MemorySource};

    fn source_with_movie(name: &str, root: &str) -> Arc<MemorySource> {
        let source = MemorySource::new(name, root);
        source
            .add_item(
                source.root(),
                "Inception",
                Item::file(ItemKind::Movie, "", "Inception", "mem://inception"),
            )
            .unwrap();
        Arc::new(source)
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("Movies"), "/Movies/");
        assert_eq!(normalize_prefix("/Movies/"), "/Movies/");
        assert_eq!(normalize_prefix("/Library/Music"), "/Library/Music/");
        assert_eq!(normalize_prefix(""), "/");
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let registry = ItemSourceRegistry::new();
        registry
            .register("/Library/", source_with_movie("lib", "/Library/"))
            .await;
        registry
            .register("/Library/Music/", source_with_movie("music", "/Library/Music/"))
            .await;

        let (prefix, source) = registry.resolve("/Library/Music/a.mp3").await.unwrap();
        assert_eq!(prefix, "/Library/Music/");
        assert_eq!(source.name(), "music");

        let (prefix, _) = registry.resolve("/Library/Other/").await.unwrap();
        assert_eq!(prefix, "/Library/");

        let (prefix, source) = registry.resolve("/Unknown/").await.unwrap();
        assert_eq!(prefix, "/");
        assert_eq!(source.name(), "root");

        assert!(registry.resolve("relative").await.is_none());
    }

    #[tokio::test]
    async fn test_sub_item_paths_resolve_to_their_source() {
        let registry = ItemSourceRegistry::new();
        registry
            .register("/Movies/", source_with_movie("movies", "/Movies/"))
            .await;
        let (prefix, _) = registry
            .resolve("/Movies/Inception///p&position=60000#Resume (0:01:00/2:30:00)")
            .await
            .unwrap();
        assert_eq!(prefix, "/Movies/");
    }

    #[tokio::test]
    async fn test_replace_keeps_position() {
        let registry = ItemSourceRegistry::new();
        registry.register("/A/", source_with_movie("a", "/A/")).await;
        registry.register("/B/", source_with_movie("b", "/B/")).await;
        registry.register("/A/", source_with_movie("a2", "/A/")).await;

        assert_eq!(registry.prefixes().await, vec!["/A/", "/B/"]);
        let (_, source) = registry.resolve("/A/x").await.unwrap();
        assert_eq!(source.name(), "a2");

        assert!(registry.unregister("A").await);
        assert!(!registry.unregister("/A/").await);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_root_lists_mount_points() {
        let registry = ItemSourceRegistry::new();
        registry
            .register("/Movies/", source_with_movie("movies", "/Movies/"))
            .await;
        registry
            .register("/Library/Music/", source_with_movie("music", "/Library/Music/"))
            .await;
        registry
            .register("/Empty/", Arc::new(MemorySource::new("empty", "/Empty/")))
            .await;

        let (_, root) = registry.resolve("/").await.unwrap();
        let listing = root.list_children("test", "/", 0, 0).await.unwrap();
        let titles: Vec<_> = listing.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Movies", "Library"]);
        assert!(listing.items.iter().all(|i| i.is_dir));

        let library = root.list_children("test", "/Library/", 0, 0).await.unwrap();
        assert_eq!(library.items[0].path, "/Library/Music/");

        assert!(root.get_item("test", "/Library/").await.unwrap().is_dir);
        assert!(root.get_item("test", "/Nowhere/").await.is_err());
    }
}
