//! In-memory item source.
//!
//! Keeps a small tree of items keyed by virtual path. Hosts use it for
//! synthetic menus; tests use it as a fully controllable provider.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{Item, ItemSource, ItemSourceError, Listing, Result, ServedResource};

#[derive(Debug, Default)]
struct Tree {
    /// Container path -> child paths, in insertion order.
    children: HashMap<String, Vec<String>>,
    items: HashMap<String, Item>,
    /// mrl -> (content type, bytes)
    payloads: HashMap<String, (String, Vec<u8>)>,
}

/// An item source backed by an in-memory tree.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    root: String,
    tree: RwLock<Tree>,
}

impl MemorySource {
    /// Creates an empty tree mounted at `root` (which must end with `/`).
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }

        let mut tree = Tree::default();
        tree.children.insert(root.clone(), Vec::new());
        tree.items
            .insert(root.clone(), Item::directory(root.clone(), String::new()));

        Self {
            name: name.into(),
            root,
            tree: RwLock::new(tree),
        }
    }

    /// Mount point of the tree.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Adds a sub-directory `name` under the container `parent` and
    /// returns its path.
    pub fn add_directory(&self, parent: &str, name: &str) -> Result<String> {
        validate_name(name)?;
        let path = format!("{parent}{name}/");

        let mut tree = self.tree.write();
        let siblings = tree
            .children
            .get_mut(parent)
            .ok_or_else(|| ItemSourceError::NotFound(parent.to_string()))?;
        if !siblings.contains(&path) {
            siblings.push(path.clone());
        }
        tree.children.entry(path.clone()).or_default();
        tree.items
            .insert(path.clone(), Item::directory(path.clone(), name));

        Ok(path)
    }

    /// Adds a leaf named `name` under the container `parent` and returns
    /// its path. The item's `path` field is overwritten.
    pub fn add_item(&self, parent: &str, name: &str, mut item: Item) -> Result<String> {
        validate_name(name)?;
        let path = format!("{parent}{name}");
        item.path = path.clone();
        item.is_dir = false;

        let mut tree = self.tree.write();
        let siblings = tree
            .children
            .get_mut(parent)
            .ok_or_else(|| ItemSourceError::NotFound(parent.to_string()))?;
        if !siblings.contains(&path) {
            siblings.push(path.clone());
        }
        tree.items.insert(path.clone(), item);

        Ok(path)
    }

    /// Applies `update` to the item at `path`, e.g. to record a new
    /// playback position.
    pub fn update_item(&self, path: &str, update: impl FnOnce(&mut Item)) -> bool {
        match self.tree.write().items.get_mut(path) {
            Some(item) => {
                update(item);
                true
            }
            None => false,
        }
    }

    /// Removes the node at `path` (and its subtree for containers).
    pub fn remove(&self, path: &str) -> bool {
        let mut tree = self.tree.write();
        if tree.items.remove(path).is_none() {
            return false;
        }

        for siblings in tree.children.values_mut() {
            siblings.retain(|p| p != path);
        }

        if path.ends_with('/') {
            let doomed: Vec<String> = tree
                .items
                .keys()
                .filter(|p| p.starts_with(path))
                .cloned()
                .collect();
            for p in doomed {
                tree.items.remove(&p);
            }
            tree.children.retain(|p, _| !p.starts_with(path));
        }

        true
    }

    /// Registers the bytes served for items whose mrl is `mrl`.
    pub fn add_payload(&self, mrl: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) {
        self.tree
            .write()
            .payloads
            .insert(mrl.into(), (content_type.into(), bytes));
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(ItemSourceError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ItemSource for MemorySource {
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
        let tree = self.tree.read();
        let children = tree
            .children
            .get(path)
            .ok_or_else(|| ItemSourceError::NotFound(path.to_string()))?;

        let all = children
            .iter()
            .filter_map(|p| tree.items.get(p).cloned())
            .collect();

        Ok(Listing::paginate(all, start, count))
    }

    async fn get_item(&self, _client: &str, path: &str) -> Result<Item> {
        self.tree
            .read()
            .items
            .get(path)
            .cloned()
            .ok_or_else(|| ItemSourceError::NotFound(path.to_string()))
    }

    async fn serve(
        &self,
        _source_address: &str,
        item: &Item,
        _profile: &str,
    ) -> Result<ServedResource> {
        let (content_type, bytes) = self
            .tree
            .read()
            .payloads
            .get(&item.mrl)
            .cloned()
            .ok_or_else(|| ItemSourceError::NotFound(item.mrl.clone()))?;

        Ok(ServedResource {
            content_type,
            length: Some(bytes.len() as u64),
            body: Box::pin(Cursor::new(bytes)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemKind;
    use tokio::io::AsyncReadExt;

    fn movies() -> MemorySource {
        let source = MemorySource::new("movies", "/Movies/");
        source
            .add_item(
                "/Movies/",
                "Inception",
                Item::file(ItemKind::Movie, "", "Inception", "mem://inception"),
            )
            .unwrap();
        source.add_directory("/Movies/", "Series").unwrap();
        source
    }

    #[tokio::test]
    async fn test_list_children_in_insertion_order() {
        let source = movies();
        let listing = source.list_children("", "/Movies/", 0, 0).await.unwrap();
        assert_eq!(listing.total, 2);
        assert_eq!(listing.items[0].path, "/Movies/Inception");
        assert_eq!(listing.items[1].path, "/Movies/Series/");
        assert!(listing.items[1].is_dir);
    }

    #[tokio::test]
    async fn test_unknown_container() {
        let source = movies();
        let err = source.list_children("", "/Nope/", 0, 0).await.unwrap_err();
        assert!(matches!(err, ItemSourceError::NotFound(_)));
    }

    #[test]
    fn test_names_with_separators_are_rejected() {
        let source = movies();
        assert!(matches!(
            source.add_directory("/Movies/", "a/b"),
            Err(ItemSourceError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let source = movies();
        assert!(source.update_item("/Movies/Inception", |item| item.track = 7));
        assert_eq!(
            source.get_item("", "/Movies/Inception").await.unwrap().track,
            7
        );

        assert!(source.remove("/Movies/Series/"));
        let listing = source.list_children("", "/Movies/", 0, 0).await.unwrap();
        assert_eq!(listing.total, 1);
        assert!(!source.remove("/Movies/Series/"));
    }

    #[tokio::test]
    async fn test_serve_payload() {
        let source = movies();
        source.add_payload("mem://inception", "video/x-matroska", b"matroska".to_vec());

        let item = source.get_item("", "/Movies/Inception").await.unwrap();
        let mut served = source.serve("127.0.0.1", &item, "mkv").await.unwrap();
        assert_eq!(served.content_type, "video/x-matroska");
        assert_eq!(served.length, Some(8));

        let mut body = Vec::new();
        served.body.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"matroska");
    }
}
