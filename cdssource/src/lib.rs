//! # cdssource
//!
//! Item model and the `ItemSource` trait implemented by every provider
//! mounted in the content directory.
//!
//! A source owns one subtree of the virtual path space (for example
//! `/Movies/`). The content directory asks it to enumerate containers,
//! to describe single items, to accept or veto delivery profiles and to
//! open the byte stream of a playable item.
//!
//! ## Reference sources
//!
//! - [`MemorySource`]: an in-memory tree, handy for tests and embedding.
//! - [`FolderSource`]: a filesystem directory mounted at a virtual prefix.
//!
//! ## Implementing a source
//!
//! ```rust,ignore
//! use cdssource::{ItemSource, Item, Listing, Result, async_trait};
//!
//! #[derive(Debug)]
//! struct Setup;
//!
//! #[async_trait]
//! impl ItemSource for Setup {
//!     fn name(&self) -> &str { "setup" }
//!
//!     async fn list_children(&self, _client: &str, path: &str, start: usize, count: usize)
//!         -> Result<Listing>
//!     {
//!         let all = vec![Item::directory(format!("{path}Shutdown/"), "Shutdown")];
//!         Ok(Listing::paginate(all, start, count))
//!     }
//!
//!     async fn get_item(&self, _client: &str, path: &str) -> Result<Item> {
//!         Err(cdssource::ItemSourceError::NotFound(path.to_string()))
//!     }
//! }
//! ```

pub mod folder;
pub mod item;
pub mod memory;
pub mod protocol;

use std::fmt::Debug;
use std::pin::Pin;

use tokio::io::AsyncRead;

pub use async_trait::async_trait;
pub use folder::FolderSource;
pub use item::{Chapter, Item, ItemKind};
pub use memory::MemorySource;
pub use protocol::{MediaFamily, Protocol};

/// Error types for item source operations
#[derive(Debug, thiserror::Error)]
pub enum ItemSourceError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Source not available: {0}")]
    Unavailable(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for item source operations
pub type Result<T> = std::result::Result<T, ItemSourceError>;

/// One page of children returned by [`ItemSource::list_children`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Children in the order the source wants them displayed.
    pub items: Vec<Item>,
    /// Total number of children of the container, regardless of paging.
    pub total: usize,
}

impl Listing {
    /// Builds a page out of a complete child list.
    ///
    /// `count == 0` returns everything from `start` onwards.
    pub fn paginate(all: Vec<Item>, start: usize, count: usize) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip(start)
            .take(if count == 0 { usize::MAX } else { count })
            .collect();
        Self { items, total }
    }
}

/// Byte stream handed back to the HTTP layer.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// A stream opened by [`ItemSource::serve`].
pub struct ServedResource {
    pub content_type: String,
    pub length: Option<u64>,
    pub body: BoxedReader,
}

impl Debug for ServedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServedResource")
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Provider of one mounted subtree.
///
/// `client` is the client identity derived from the request user agent;
/// sources may use it to tailor listings. Paths are always absolute
/// virtual paths inside the subtree the source was registered for.
#[async_trait]
pub trait ItemSource: Debug + Send + Sync {
    /// Human readable name, used in logs.
    fn name(&self) -> &str;

    /// Enumerates `[start, start + count)` children of the container at
    /// `path`. `count == 0` means "all of them".
    async fn list_children(
        &self,
        client: &str,
        path: &str,
        start: usize,
        count: usize,
    ) -> Result<Listing>;

    /// Describes the leaf at `path`.
    ///
    /// Sources may either fail with [`ItemSourceError::NotFound`] or answer
    /// with a null item (see [`Item::is_null`]).
    async fn get_item(&self, client: &str, path: &str) -> Result<Item>;

    /// Lets the source veto, or adjust, a delivery profile for `item`.
    fn negotiate_profile(&self, _item: &Item, _protocol: &mut Protocol) -> bool {
        true
    }

    /// Opens the stream of `item` encoded with `profile`.
    async fn serve(
        &self,
        _source_address: &str,
        item: &Item,
        _profile: &str,
    ) -> Result<ServedResource> {
        Err(ItemSourceError::NotFound(item.path.clone()))
    }
}
