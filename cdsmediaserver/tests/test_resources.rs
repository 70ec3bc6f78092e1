use std::sync::Arc;
use std::time::Duration;

use cdsconfig::Config;
use cdsdidl::DIDLLite;
use cdsmediaserver::{
    BrowseFlag, ContentDirectory, ContentDirectoryError, ContentDirectorySettings, RequestInfo,
    ResourceHandler, Transport,
};
use cdssource::{FolderSource, Item, ItemKind, MemorySource};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio_test::{assert_err, assert_ok};

const HOST: &str = "192.168.1.10:4280";

/// Transport qui garde les handlers enregistrés
#[derive(Default)]
struct RecordingTransport {
    handlers: Mutex<Vec<String>>,
}

impl Transport for RecordingTransport {
    fn register_resource_handler(&self, prefix: &str, _handler: Arc<dyn ResourceHandler>) {
        self.handlers.lock().push(prefix.to_string());
    }
    fn unregister_resource_handler(&self, prefix: &str) {
        self.handlers.lock().retain(|p| p != prefix);
    }
    fn post_event(&self, _service_id: &str) {}
    fn current_subscriber_count(&self) -> usize {
        0
    }
}

fn request() -> RequestInfo {
    RequestInfo::new("TestRenderer/2.0", "192.168.1.20", HOST)
}

fn service(transport: Arc<RecordingTransport>) -> ContentDirectory {
    let settings = ContentDirectorySettings::from_config(&Config::embedded());
    let cd = ContentDirectory::new(settings, transport);
    cd.initialize();
    cd
}

/// Chemin HTTP d'une URL de ressource
fn request_path(url: &str) -> String {
    url.strip_prefix(&format!("http://{HOST}"))
        .unwrap_or(url)
        .to_string()
}

async fn first_listing(cd: &ContentDirectory) -> DIDLLite {
    let root = cd
        .browse("0", BrowseFlag::DirectChildren, 0, 0, &request())
        .await
        .unwrap();
    let root = DIDLLite::parse(&root.result).unwrap();
    let response = cd
        .browse(&root.containers()[0].id, BrowseFlag::DirectChildren, 0, 0, &request())
        .await
        .unwrap();
    DIDLLite::parse(&response.result).unwrap()
}

#[tokio::test]
async fn test_serve_memory_payload() {
    let transport = Arc::new(RecordingTransport::default());
    let cd = service(transport.clone());
    assert_eq!(transport.handlers.lock().as_slice(), ["/upnp/condir/"]);

    let music = MemorySource::new("music", "/Music/");
    music
        .add_item(
            music.root(),
            "Song",
            Item::file(ItemKind::Music, "", "Song", "mem://song")
                .with_duration(Duration::from_secs(200)),
        )
        .unwrap();
    music.add_payload("mem://song", "audio/mpeg", b"ID3 not really".to_vec());
    cd.register_source("/Music/", Arc::new(music)).await;

    let listing = first_listing(&cd).await;
    let song = listing.items()[0];
    assert_eq!(song.title, "Song");

    // un <res> par profil audio configuré
    let infos: Vec<_> = song.resources.iter().map(|r| r.protocol_info.as_str()).collect();
    assert_eq!(infos.len(), 3);
    assert!(infos[0].starts_with("http-get:*:audio/mpeg:DLNA.ORG_PN=MP3"));
    assert_eq!(song.resources[0].duration.as_deref(), Some("0:03:20.000"));

    let url = &song.resources[0].url;
    assert!(url.starts_with("http://192.168.1.10:4280/upnp/condir/"));
    assert!(url.ends_with(".mp3"));

    let mut served = cd.serve_resource(&request_path(url), &request()).await.unwrap();
    assert_eq!(served.content_type, "audio/mpeg");
    assert_eq!(served.length, Some(14));

    let mut body = Vec::new();
    served.body.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"ID3 not really");
}

#[tokio::test]
async fn test_serve_rejects_unknown_tokens() {
    let cd = service(Arc::new(RecordingTransport::default()));

    for path in [
        "/upnp/condir/00042-00.mp3",
        "/upnp/condir/garbage",
        "/elsewhere/00000-00.mp3",
    ] {
        let err = assert_err!(cd.serve_resource(path, &request()).await);
        assert!(matches!(err, ContentDirectoryError::NotFound(_)), "{path}");
    }
}

#[tokio::test]
async fn test_tokens_do_not_survive_close() {
    let transport = Arc::new(RecordingTransport::default());
    let cd = service(transport.clone());

    let music = MemorySource::new("music", "/Music/");
    music
        .add_item(music.root(), "Song", Item::file(ItemKind::Music, "", "Song", "mem://song"))
        .unwrap();
    music.add_payload("mem://song", "audio/mpeg", vec![0; 4]);
    cd.register_source("/Music/", Arc::new(music)).await;

    let listing = first_listing(&cd).await;
    let path = request_path(&listing.items()[0].resources[0].url);
    let song_id = listing.items()[0].id.clone();
    assert_ok!(cd.serve_resource(&path, &request()).await);

    cd.close();
    assert!(transport.handlers.lock().is_empty());

    let err = cd.serve_resource(&path, &request()).await.unwrap_err();
    assert!(matches!(err, ContentDirectoryError::NotFound(_)));
    let err = cd
        .browse(&song_id, BrowseFlag::Metadata, 0, 0, &request())
        .await
        .unwrap_err();
    assert_eq!(err.upnp_error_code(), 701);
}

#[tokio::test]
async fn test_menu_entries_are_not_servable() {
    let cd = service(Arc::new(RecordingTransport::default()));
    let movies = MemorySource::new("movies", "/Movies/");
    movies
        .add_item(
            movies.root(),
            "Inception",
            Item::file(ItemKind::Movie, "", "Inception", "mem://inception")
                .with_duration(Duration::from_secs(9000)),
        )
        .unwrap();
    movies.add_payload("mem://inception", "video/mpeg", vec![1, 2, 3]);
    cd.register_source("/Movies/", Arc::new(movies)).await;

    let listing = first_listing(&cd).await;
    let entries = cd
        .browse(&listing.containers()[0].id, BrowseFlag::DirectChildren, 0, 0, &request())
        .await
        .unwrap();
    let entries = DIDLLite::parse(&entries.result).unwrap();

    // seul le profil vidéo DLNA et le profil privé mkv s'appliquent
    let play = entries.items()[0];
    assert_eq!(play.resources.len(), 2);
    let served = cd
        .serve_resource(&request_path(&play.resources[0].url), &request())
        .await
        .unwrap();
    assert_eq!(served.content_type, "video/mpeg");

    // le menu Seek n'a pas de ressource
    assert!(entries.containers()[0].class.starts_with("object.container"));
}

#[tokio::test]
async fn test_folder_library() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("Albums")).unwrap();
    std::fs::write(dir.path().join("Albums").join("01 Intro.mp3"), b"mp3 bytes").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let cd = service(Arc::new(RecordingTransport::default()));
    cd.register_source(
        "/Library/",
        Arc::new(FolderSource::new("library", dir.path(), "/Library/")),
    )
    .await;

    let library = first_listing(&cd).await;
    assert_eq!(library.titles(), vec!["Albums"]);

    let albums = cd
        .browse(&library.containers()[0].id, BrowseFlag::DirectChildren, 0, 0, &request())
        .await
        .unwrap();
    let albums = DIDLLite::parse(&albums.result).unwrap();
    assert_eq!(albums.titles(), vec!["01 Intro"]);
    assert_eq!(albums.items()[0].class, "object.item.audioItem.musicTrack");

    let url = &albums.items()[0].resources[0].url;
    let mut served = cd.serve_resource(&request_path(url), &request()).await.unwrap();
    let mut body = String::new();
    served.body.read_to_string(&mut body).await.unwrap();
    assert_eq!(body, "mp3 bytes");
}
