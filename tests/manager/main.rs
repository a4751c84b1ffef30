//! End-to-end scenarios against the public manager API

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filetime::FileTime;
use mockito::{Matcher, Mock, Server, ServerGuard};
use tempfile::TempDir;
use tokio::sync::mpsc;

use resource_mirror::app::{
    CredentialStore, Credentials, DownloadPhase, DownloadableFileManager, DownloadableFileState,
    FileStatus, ListenerRef, ListenerTracker, ManagerConfig, UrlStatus,
};
use resource_mirror::errors::{AccessError, DownloadError};

const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";
// 2015-10-21T07:28:00Z
const LAST_MODIFIED_SECS: i64 = 1_445_412_480;

async fn manager_for(root: &str, dir: &TempDir) -> Arc<DownloadableFileManager> {
    let config = ManagerConfig::new(root, dir.path().join("cache")).with_probe_on_start(false);
    Arc::new(
        DownloadableFileManager::new(config, Arc::new(CredentialStore::new()))
            .await
            .unwrap(),
    )
}

/// HEAD and GET mocks for `path`; the GET must be hit exactly `get_hits` times
async fn mock_resource(
    server: &mut ServerGuard,
    path: &str,
    body: &[u8],
    get_hits: usize,
) -> (Mock, Mock) {
    let pattern = format!("^{}", regex_escape(path));
    let head = server
        .mock("HEAD", Matcher::Regex(pattern.clone()))
        .with_status(200)
        .with_header("last-modified", LAST_MODIFIED)
        .create_async()
        .await;
    let get = server
        .mock("GET", Matcher::Regex(pattern))
        .with_status(200)
        .with_header("last-modified", LAST_MODIFIED)
        .with_body(body)
        .expect(get_hits)
        .create_async()
        .await;
    (head, get)
}

fn regex_escape(path: &str) -> String {
    path.replace('.', r"\.")
}

fn write_local(path: &Path, content: &[u8], mtime_secs: i64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

fn channel_listener() -> (ListenerRef, mpsc::UnboundedReceiver<DownloadableFileState>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: ListenerRef = Arc::new(move |state: &DownloadableFileState| {
        let _ = tx.send(state.clone());
    });
    (listener, rx)
}

async fn drain(
    rx: &mut mpsc::UnboundedReceiver<DownloadableFileState>,
) -> Vec<DownloadableFileState> {
    let mut events = Vec::new();
    while let Ok(Some(state)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        events.push(state);
    }
    events
}

#[tokio::test]
async fn test_download_happens_once_then_serves_cache() {
    let mut server = Server::new_async().await;
    let (_head, get) = mock_resource(&mut server, "/models/bunny.obj", b"v 0 0 0\n", 1).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    let first = manager.get_downloaded_file("models/bunny.obj", false).await.unwrap();
    assert_eq!(first.file_state().status, FileStatus::Accessible);
    assert_eq!(std::fs::read(first.file_state().path()).unwrap(), b"v 0 0 0\n");

    let second = manager.get_downloaded_file("models/bunny.obj", false).await.unwrap();
    assert!(!second.is_download_necessary());
    assert_eq!(second.file_state().path(), first.file_state().path());
    get.assert_async().await;
}

#[tokio::test]
async fn test_older_local_copy_is_refreshed() {
    let mut server = Server::new_async().await;
    let (_head, get) = mock_resource(&mut server, "/catalog.json", b"{\"v\":2}", 1).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;
    let path = manager.state("catalog.json").unwrap().file_state().path().to_path_buf();
    write_local(&path, b"{\"v\":1}", LAST_MODIFIED_SECS - 86_400);

    let state = manager.query("catalog.json", true).await.unwrap();
    assert!(state.is_download_necessary());

    let state = manager.get_downloaded_file("catalog.json", false).await.unwrap();
    assert!(!state.is_download_necessary());
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":2}");
    get.assert_async().await;
}

#[tokio::test]
async fn test_newer_local_copy_is_kept() {
    let mut server = Server::new_async().await;
    let (_head, get) = mock_resource(&mut server, "/catalog.json", b"{\"v\":2}", 0).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;
    let path = manager.state("catalog.json").unwrap().file_state().path().to_path_buf();
    write_local(&path, b"{\"v\":3}", LAST_MODIFIED_SECS + 86_400);

    let state = manager.get_downloaded_file("catalog.json", false).await.unwrap();
    assert_eq!(state.url_state().status, UrlStatus::Accessible);
    assert!(!state.is_download_necessary());
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":3}");
    get.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_root_serves_stale_cache() {
    let dir = TempDir::new().unwrap();
    let config = ManagerConfig::new("http://127.0.0.1:9/", dir.path().join("cache"));
    let manager = DownloadableFileManager::new(config, Arc::new(CredentialStore::new()))
        .await
        .unwrap();
    assert!(!manager.is_server_access_enabled());

    let path = manager.state("a/b.txt").unwrap().file_state().path().to_path_buf();
    write_local(&path, b"stale", LAST_MODIFIED_SECS);

    let state = manager.get_downloaded_file("a/b.txt", false).await.unwrap();
    assert_eq!(state.url_state().status, UrlStatus::Unknown);
    assert!(state.is_local_file_available());
    assert!(!state.is_download_necessary());
    assert_eq!(std::fs::read(&path).unwrap(), b"stale");
}

#[tokio::test]
async fn test_missing_resource_reports_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("HEAD", Matcher::Regex(r"^/missing\.bin".to_string()))
        .with_status(404)
        .create_async()
        .await;
    let get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    let state = manager.query("missing.bin", false).await.unwrap();
    assert!(state.is_url_not_found());

    let error = manager.get_downloaded_file("missing.bin", false).await.unwrap_err();
    assert!(matches!(
        error,
        DownloadError::Access(AccessError::NotFound { .. })
    ));
    assert!(!state.file_state().path().exists());
    get.assert_async().await;
}

#[tokio::test]
async fn test_gzip_download_reports_wire_progress() {
    let content = b"id,name\n1,alpha\n".repeat(500);
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    std::io::Write::write_all(&mut encoder, &content).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut server = Server::new_async().await;
    let _mocks = mock_resource(&mut server, "/tables/names.csv.gz", &compressed, 1).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    let handle = manager
        .download_in_background("tables/names.csv.gz", false)
        .unwrap();
    let progress = handle.progress();
    let state = handle.wait().await.unwrap();

    assert!(state.file_state().path().ends_with("tables/names.csv"));
    assert_eq!(std::fs::read(state.file_state().path()).unwrap(), content);
    assert_eq!(state.file_state().length, Some(content.len() as u64));

    let done = progress.borrow().clone();
    assert_eq!(done.phase, DownloadPhase::Done);
    assert_eq!(done.bytes_transferred, compressed.len() as u64);
}

#[tokio::test]
async fn test_canceled_background_download_leaves_no_file() {
    let mut server = Server::new_async().await;
    let (_head, get) = mock_resource(&mut server, "/big.bin", &[0u8; 1024], 0).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    let handle = manager.download_in_background("big.bin", false).unwrap();
    let progress = handle.progress();
    handle.cancel();

    let error = handle.wait().await.unwrap_err();
    assert!(error.is_canceled());
    assert_eq!(progress.borrow().phase, DownloadPhase::Canceled);

    let path = manager.state("big.bin").unwrap().file_state().path().to_path_buf();
    assert!(!path.exists());
    get.assert_async().await;
}

#[tokio::test]
async fn test_offline_query_opens_no_connection() {
    let mut server = Server::new_async().await;
    let head = server
        .mock("HEAD", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;
    manager.set_enable_server_access(false);

    let state = manager.query("x/y.dat", true).await.unwrap();
    assert_eq!(state.url_state().status, UrlStatus::Unknown);
    assert_eq!(state.file_state().status, FileStatus::Inaccessible);

    let error = manager.get_downloaded_file("x/y.dat", true).await.unwrap_err();
    assert!(matches!(
        error,
        DownloadError::Access(AccessError::ServerAccessDisabled)
    ));
    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_download_path_is_stable_across_spellings() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for("https://data.example.org/mirror/", &dir).await;

    let relative = manager.state("models/bunny.obj.gz").unwrap();
    let absolute = manager
        .state("https://data.example.org/mirror/models/bunny.obj.gz")
        .unwrap();
    let expected = manager.file_manager().cache_root().join("models").join("bunny.obj");

    assert_eq!(relative.file_state().path(), expected);
    assert_eq!(absolute.file_state().path(), expected);
    assert_eq!(manager.known_urls().len(), 1);
}

#[tokio::test]
async fn test_listener_hears_changes_only() {
    let mut server = Server::new_async().await;
    let _mocks = mock_resource(&mut server, "/watched.txt", b"watched", 1).await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;
    let (listener, mut rx) = channel_listener();
    manager.add_state_listener("watched.txt", listener).unwrap();

    manager.query("watched.txt", true).await.unwrap();
    let events = drain(&mut rx).await;
    assert!(!events.is_empty());
    let last = events.last().unwrap();
    assert_eq!(last.url_state().status, UrlStatus::Accessible);
    assert_eq!(last.file_state().status, FileStatus::Inaccessible);

    // Same answers again: no event
    manager.query("watched.txt", true).await.unwrap();
    assert!(drain(&mut rx).await.is_empty());

    manager.get_downloaded_file("watched.txt", false).await.unwrap();
    let events = drain(&mut rx).await;
    assert!(events
        .iter()
        .any(|state| state.file_state().status == FileStatus::Accessible));
}

#[tokio::test]
async fn test_listener_tracker_dedupes_and_releases() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for("http://127.0.0.1:9/", &dir).await;
    let (listener, _rx) = channel_listener();

    let tracker = ListenerTracker::new(Arc::clone(&manager));
    assert!(tracker.add("a.txt", Arc::clone(&listener)).unwrap());
    assert!(!tracker.add("a.txt", Arc::clone(&listener)).unwrap());
    assert!(tracker.add("b.txt", Arc::clone(&listener)).unwrap());
    assert_eq!(manager.listener_count("a.txt").unwrap(), 1);
    assert_eq!(tracker.len(), 2);

    assert!(tracker.remove("b.txt", &listener).unwrap());
    assert!(!tracker.remove("b.txt", &listener).unwrap());
    assert_eq!(manager.listener_count("b.txt").unwrap(), 0);

    drop(tracker);
    assert_eq!(manager.listener_count("a.txt").unwrap(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_are_not_installed() {
    let mut server = Server::new_async().await;
    server
        .mock("HEAD", Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    let accepted = manager
        .update_credentials(Credentials::new("reader", "wrong"))
        .await;
    assert!(!accepted);
    assert!(manager.url_manager().current_credentials().is_none());
}

#[tokio::test]
async fn test_accepted_credentials_are_used_for_downloads() {
    let mut server = Server::new_async().await;
    server
        .mock("HEAD", Matcher::Any)
        .match_header("authorization", Matcher::Any)
        .with_status(200)
        .with_header("last-modified", LAST_MODIFIED)
        .create_async()
        .await;
    let get = server
        .mock("GET", Matcher::Regex(r"^/private\.txt".to_string()))
        .match_header("authorization", Matcher::Any)
        .with_status(200)
        .with_body("secret")
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.url(), &dir).await;

    assert!(
        manager
            .update_credentials(Credentials::new("reader", "right"))
            .await
    );
    let state = manager.get_downloaded_file("private.txt", false).await.unwrap();
    assert_eq!(std::fs::read(state.file_state().path()).unwrap(), b"secret");
    get.assert_async().await;
}
