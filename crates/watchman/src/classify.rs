use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::filter::FileFilter;
use crate::tracker::{WatchBackend, WatchSet};
use crate::types::{ChangeKind, RawChange};

/// Decides what a raw change means for the monitor:
///
/// | change | target | action |
/// |---|---|---|
/// | rename, chmod, write | - | ignored |
/// | create | directory | register, then queue a walk if it was new |
/// | create | file | returned when the filter accepts it |
/// | remove | - | dropped from the watch set if tracked |
pub struct Classifier<'a, B: WatchBackend> {
    watch_set: &'a WatchSet<B>,
    walk_requests: &'a mpsc::Sender<PathBuf>,
    filter: &'a dyn FileFilter,
}

impl<'a, B: WatchBackend> Classifier<'a, B> {
    pub fn new(
        watch_set: &'a WatchSet<B>,
        walk_requests: &'a mpsc::Sender<PathBuf>,
        filter: &'a dyn FileFilter,
    ) -> Self {
        Self {
            watch_set,
            walk_requests,
            filter,
        }
    }

    /// Returns the path of a new file worth reporting, if any.
    pub async fn classify(&self, change: &RawChange) -> Option<PathBuf> {
        match change.kind {
            ChangeKind::Create => self.on_create(change).await,
            ChangeKind::Remove => {
                // Directory removal shows up twice (entry leaving the parent and
                // the directory itself); the second one finds nothing to drop.
                if self.watch_set.remove(&change.path) {
                    debug!("👀 Watchman: stopped watching {}", change.path.display());
                }
                None
            }
            ChangeKind::Rename | ChangeKind::Chmod | ChangeKind::Write | ChangeKind::Other => None,
        }
    }

    async fn on_create(&self, change: &RawChange) -> Option<PathBuf> {
        let metadata = match tokio::fs::metadata(&change.path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("👀 Watchman: stat {} failed: {}", change.path.display(), e);
                return None;
            }
        };

        if metadata.is_dir() {
            match self.watch_set.try_add(&change.path) {
                Ok(false) => {
                    if self.walk_requests.send(change.path.clone()).await.is_err() {
                        debug!("👀 Watchman: walk queue closed, {} not walked", change.path.display());
                    }
                }
                Ok(true) => {}
                Err(e) => warn!(
                    "👀 Watchman: failed to add directory {} watch: {}",
                    change.path.display(),
                    e
                ),
            }
            return None;
        }

        if self.filter.accept(&change.path) {
            info!("👀 Watchman detected new file: {}", change.path.display());
            Some(change.path.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilenameFilter;
    use crate::tracker::tests::CountingBackend;
    use crate::walker::WALK_QUEUE_CAPACITY;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        set: WatchSet<CountingBackend>,
        tx: mpsc::Sender<PathBuf>,
        rx: mpsc::Receiver<PathBuf>,
        filter: FilenameFilter,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let set = WatchSet::new(CountingBackend::default());
        set.try_add(temp.path()).unwrap();
        let (tx, rx) = mpsc::channel(WALK_QUEUE_CAPACITY);
        Fixture {
            temp,
            set,
            tx,
            rx,
            filter: FilenameFilter::new(&[r"(?i)\.jpg$"]).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_new_directory_is_registered_then_queued() {
        let mut f = fixture();
        let dir = f.temp.path().join("day1");
        std::fs::create_dir(&dir).unwrap();

        let classifier = Classifier::new(&f.set, &f.tx, &f.filter);
        let created = RawChange::new(ChangeKind::Create, &dir);
        assert_eq!(classifier.classify(&created).await, None);
        // A repeated notification for the same directory is not walked twice.
        assert_eq!(classifier.classify(&created).await, None);

        assert!(f.set.contains(&dir));
        assert_eq!(f.rx.try_recv().unwrap(), dir);
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_new_file_goes_through_filter() {
        let f = fixture();
        let jpg = f.temp.path().join("bar.JPG");
        let png = f.temp.path().join("foobar.png");
        std::fs::write(&jpg, b"jpeg").unwrap();
        std::fs::write(&png, b"png").unwrap();

        let classifier = Classifier::new(&f.set, &f.tx, &f.filter);
        assert_eq!(
            classifier.classify(&RawChange::new(ChangeKind::Create, &jpg)).await,
            Some(jpg.clone())
        );
        assert_eq!(
            classifier.classify(&RawChange::new(ChangeKind::Create, &png)).await,
            None
        );
    }

    #[tokio::test]
    async fn test_ignored_kinds() {
        let f = fixture();
        let jpg = f.temp.path().join("bar.jpg");
        std::fs::write(&jpg, b"jpeg").unwrap();

        let classifier = Classifier::new(&f.set, &f.tx, &f.filter);
        for kind in [ChangeKind::Rename, ChangeKind::Chmod, ChangeKind::Write, ChangeKind::Other] {
            assert_eq!(classifier.classify(&RawChange::new(kind, &jpg)).await, None);
        }
    }

    #[tokio::test]
    async fn test_vanished_path_is_dropped() {
        let f = fixture();
        let classifier = Classifier::new(&f.set, &f.tx, &f.filter);
        let gone = f.temp.path().join("gone.jpg");

        assert_eq!(
            classifier.classify(&RawChange::new(ChangeKind::Create, &gone)).await,
            None
        );
    }

    #[tokio::test]
    async fn test_double_remove_is_tolerated() {
        let f = fixture();
        let dir = f.temp.path().join("old");
        f.set.try_add(&dir).unwrap();

        let classifier = Classifier::new(&f.set, &f.tx, &f.filter);
        let removed = RawChange::new(ChangeKind::Remove, &dir);
        assert_eq!(classifier.classify(&removed).await, None);
        assert_eq!(classifier.classify(&removed).await, None);
        assert!(!f.set.contains(&dir));
        assert!(f.set.contains(f.temp.path()));
    }
}
