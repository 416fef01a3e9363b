//! End-to-end directory monitor scenarios against the platform watcher.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use meerkat_core::OutboundEvent;
use meerkat_watchman::{DirectoryMonitor, FileFilter, FileFilterExt, FilenameFilter, WatchmanError};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SETTLE: Duration = Duration::from_secs(5);

fn jpg_filter() -> Arc<dyn FileFilter> {
    Arc::new(FilenameFilter::new(&[r"(?i)\.jpg$"]).unwrap())
}

/// `{a,b}/{c,d}/{e,f}`: 14 directories below the root.
fn make_tree(root: &Path) {
    for a in ["a", "b"] {
        for c in ["c", "d"] {
            for e in ["e", "f"] {
                std::fs::create_dir_all(root.join(a).join(c).join(e)).unwrap();
            }
        }
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + SETTLE;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Running {
    async fn stop(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("monitor did not stop in time")
            .unwrap();
    }
}

fn start(monitor: DirectoryMonitor, events: mpsc::Sender<OutboundEvent>) -> Running {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone(), events));
    Running { cancel, handle }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_existing_tree_is_fully_watched() {
    let temp = TempDir::new().unwrap();
    make_tree(temp.path());

    let monitor = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, _rx) = mpsc::channel(10);
    let running = start(monitor, tx);

    assert!(wait_for(|| watch_set.len() == 15).await, "watched {}", watch_set.len());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(watch_set.len(), 15);

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tree_created_while_monitoring_is_fully_watched() {
    let temp = TempDir::new().unwrap();
    let monitor = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, _rx) = mpsc::channel(10);
    let running = start(monitor, tx);

    make_tree(temp.path());

    assert!(wait_for(|| watch_set.len() == 15).await, "watched {}", watch_set.len());
    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_redundant_monitors_each_cover_the_tree() {
    let temp = TempDir::new().unwrap();
    let first = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let first_set = first.watch_set();
    let (tx, _rx) = mpsc::channel(10);
    let first = start(first, tx.clone());

    make_tree(temp.path());

    let second = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let second_set = second.watch_set();
    let second = start(second, tx);

    assert!(wait_for(|| first_set.len() == 15 && second_set.len() == 15).await);

    first.stop().await;
    second.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rapid_nested_directories_are_not_missed() {
    let temp = TempDir::new().unwrap();
    let monitor = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, _rx) = mpsc::channel(10);
    let running = start(monitor, tx);

    let mut deepest = temp.path().to_path_buf();
    for level in 0..12 {
        deepest = deepest.join(format!("level{level}"));
        std::fs::create_dir(&deepest).unwrap();
    }

    let root = std::fs::canonicalize(temp.path()).unwrap();
    let deepest = root.join(deepest.strip_prefix(temp.path()).unwrap());
    assert!(wait_for(|| watch_set.len() == 13).await, "watched {}", watch_set.len());
    assert!(watch_set.contains(&deepest));

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_matching_files_are_emitted() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("cam")).unwrap();
    std::fs::write(temp.path().join("cam/old.jpg"), b"jpeg").unwrap();

    let filter: Arc<dyn FileFilter> = Arc::new(
        FilenameFilter::new(&[r"(?i)\.jpg$"])
            .unwrap()
            .created_after_now(),
    );
    let monitor = DirectoryMonitor::new(temp.path(), filter).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, mut rx) = mpsc::channel(10);
    let running = start(monitor, tx);
    assert!(wait_for(|| watch_set.len() == 2).await);

    tokio::time::sleep(Duration::from_millis(20)).await;
    std::fs::write(temp.path().join("cam/foobar.png"), b"png").unwrap();
    std::fs::write(temp.path().join("cam/baz.JPG"), b"jpeg").unwrap();

    let event = tokio::time::timeout(SETTLE, rx.recv())
        .await
        .expect("no event emitted")
        .unwrap();
    match event {
        OutboundEvent::Photo(photo) => assert_eq!(photo.caption.as_deref(), Some("baz.JPG")),
        other => panic!("expected a photo, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rate_limited_burst_emits_once() {
    let temp = TempDir::new().unwrap();
    let filter: Arc<dyn FileFilter> = Arc::new(
        FilenameFilter::new(&[r"(?i)\.jpg$"])
            .unwrap()
            .created_after_now()
            .rate_limited(Duration::from_secs(60)),
    );
    let monitor = DirectoryMonitor::new(temp.path(), filter).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, mut rx) = mpsc::channel(10);
    let running = start(monitor, tx);
    assert!(wait_for(|| watch_set.len() == 1).await);

    tokio::time::sleep(Duration::from_millis(20)).await;
    for n in 0..10 {
        std::fs::write(temp.path().join(format!("burst{n}.jpg")), b"jpeg").unwrap();
    }

    let event = tokio::time::timeout(SETTLE, rx.recv())
        .await
        .expect("no event emitted")
        .unwrap();
    assert_eq!(event.kind(), "photo");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err(), "burst was not rate limited");

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_removed_directories_leave_the_watch_set() {
    let temp = TempDir::new().unwrap();
    make_tree(temp.path());

    let monitor = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, mut rx) = mpsc::channel(10);
    let running = start(monitor, tx);
    assert!(wait_for(|| watch_set.len() == 15).await);

    std::fs::remove_dir_all(temp.path().join("a")).unwrap();
    assert!(wait_for(|| watch_set.len() == 8).await, "watched {}", watch_set.len());

    // The monitor keeps working after the double remove notifications.
    std::fs::write(temp.path().join("b/c/e/new.jpg"), b"jpeg").unwrap();
    let event = tokio::time::timeout(SETTLE, rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.kind(), "photo");

    running.stop().await;
}

#[tokio::test]
async fn test_missing_root_is_a_constructor_error() {
    let temp = TempDir::new().unwrap();
    let result = DirectoryMonitor::new(temp.path().join("nope"), jpg_filter());
    assert!(matches!(result, Err(WatchmanError::DirectoryNotFound(_))));

    let file = temp.path().join("file.jpg");
    std::fs::write(&file, b"jpeg").unwrap();
    let result = DirectoryMonitor::new(&file, jpg_filter());
    assert!(matches!(result, Err(WatchmanError::NotADirectory(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_monitor_stops_when_consumer_is_gone() {
    let temp = TempDir::new().unwrap();
    let monitor = DirectoryMonitor::new(temp.path(), jpg_filter()).unwrap();
    let watch_set = monitor.watch_set();
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let handle = tokio::spawn(monitor.run(CancellationToken::new(), tx));

    std::fs::write(temp.path().join("x.jpg"), b"jpeg").unwrap();
    tokio::time::timeout(SETTLE, handle).await.unwrap().unwrap();
    assert!(watch_set.is_closed());
}
