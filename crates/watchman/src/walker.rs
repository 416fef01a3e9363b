//! Directory walks.
//!
//! Each directory is listed one level deep, without descending; every child
//! directory is registered in the watch set and, when it was not tracked
//! before, pushed onto the walk's local work queue to be listed in turn. A
//! walk therefore covers the whole untracked subtree below its root, while
//! subtrees already registered (e.g. from a live create notification) are
//! left to their own walk.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tracker::{WatchBackend, WatchSet};

/// Capacity of the pending walk queue shared by the monitor and classifier.
pub const WALK_QUEUE_CAPACITY: usize = 100;

/// Registers every untracked directory below `root`, breadth first, one
/// listing per directory. `root` must already be registered.
/// Returns the number of directories newly registered by this walk.
pub async fn walk_tree<B: WatchBackend>(watch_set: &WatchSet<B>, root: PathBuf) -> usize {
    let mut pending = VecDeque::from([root]);
    let mut registered = 0;

    while let Some(dir) = pending.pop_front() {
        for child in child_directories(&dir).await {
            match watch_set.try_add(&child) {
                Ok(false) => {
                    registered += 1;
                    pending.push_back(child);
                }
                Ok(true) => {}
                Err(e) => warn!("👀 Watchman: failed to watch {}: {}", child.display(), e),
            }
        }
    }

    registered
}

async fn child_directories(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("👀 Watchman: cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut children = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                // file_type does not follow symlinks, so linked trees are not walked
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    children.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("👀 Watchman: listing {} stopped: {}", dir.display(), e);
                break;
            }
        }
    }
    children
}

/// Long-lived consumer of the pending walk queue. Exits when the queue is
/// closed or `cancel` fires.
pub async fn walker_loop<B: WatchBackend>(
    watch_set: Arc<WatchSet<B>>,
    mut queue: mpsc::Receiver<PathBuf>,
    cancel: CancellationToken,
) {
    loop {
        let dir = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(dir) => dir,
                None => break,
            },
        };

        let registered = walk_tree(&watch_set, dir.clone()).await;
        debug!(
            "👀 Watchman: walked {} ({} new directories)",
            dir.display(),
            registered
        );
    }
    info!("👀 Watchman: walker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::tests::CountingBackend;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn make_tree(root: &Path) {
        for a in ["a", "b"] {
            for c in ["c", "d"] {
                for e in ["e", "f"] {
                    std::fs::create_dir_all(root.join(a).join(c).join(e)).unwrap();
                }
            }
        }
        std::fs::write(root.join("a").join("photo.jpg"), b"jpeg").unwrap();
    }

    #[tokio::test]
    async fn test_walk_covers_whole_tree() {
        let temp = TempDir::new().unwrap();
        make_tree(temp.path());

        let backend = CountingBackend::default();
        let adds = backend.adds.clone();
        let set = WatchSet::new(backend);
        set.try_add(temp.path()).unwrap();

        let registered = walk_tree(&set, temp.path().to_path_buf()).await;

        assert_eq!(registered, 14);
        assert_eq!(set.len(), 15);
        assert_eq!(adds.load(Ordering::SeqCst), 15);
        assert!(set.contains(&temp.path().join("b/d/f")));
        assert!(!set.contains(&temp.path().join("a/photo.jpg")));
    }

    #[tokio::test]
    async fn test_walk_skips_tracked_subtrees() {
        let temp = TempDir::new().unwrap();
        make_tree(temp.path());

        let set = WatchSet::new(CountingBackend::default());
        set.try_add(temp.path()).unwrap();
        // Already registered from a create notification; its own walk covers it.
        set.try_add(&temp.path().join("a")).unwrap();

        walk_tree(&set, temp.path().to_path_buf()).await;

        assert!(set.contains(&temp.path().join("b/c/e")));
        assert!(!set.contains(&temp.path().join("a/c")));
    }

    #[tokio::test]
    async fn test_walker_loop_exits_when_queue_closes() {
        let temp = TempDir::new().unwrap();
        make_tree(temp.path());

        let set = Arc::new(WatchSet::new(CountingBackend::default()));
        set.try_add(temp.path()).unwrap();

        let (tx, rx) = mpsc::channel(WALK_QUEUE_CAPACITY);
        let walker = tokio::spawn(walker_loop(set.clone(), rx, CancellationToken::new()));
        tx.send(temp.path().to_path_buf()).await.unwrap();
        drop(tx);

        walker.await.unwrap();
        assert_eq!(set.len(), 15);
    }

    #[tokio::test]
    async fn test_walker_loop_honors_cancellation() {
        let set = Arc::new(WatchSet::new(CountingBackend::default()));
        let (_tx, rx) = mpsc::channel(WALK_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        let walker = tokio::spawn(walker_loop(set, rx, cancel.clone()));
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(1), walker)
            .await
            .unwrap()
            .unwrap();
    }
}
