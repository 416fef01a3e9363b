use std::path::{Path, PathBuf};
use std::sync::Arc;

use meerkat_core::OutboundEvent;
use notify::Event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classify::Classifier;
use crate::error::{Result, WatchmanError};
use crate::filter::FileFilter;
use crate::tracker::{NotifyBackend, WatchSet};
use crate::types::RawChange;
use crate::walker::{WALK_QUEUE_CAPACITY, walker_loop};

/// Watches one directory tree and reports new files accepted by its filter.
pub struct DirectoryMonitor {
    root: PathBuf,
    filter: Arc<dyn FileFilter>,
    watch_set: Arc<WatchSet>,
    raw_events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl DirectoryMonitor {
    /// Creates a fresh watch handle and registers `root` with it.
    ///
    /// Notifications are buffered from this point on, so nothing that happens
    /// between construction and [`run`](Self::run) is lost.
    pub fn new(root: impl AsRef<Path>, filter: Arc<dyn FileFilter>) -> Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WatchmanError::DirectoryNotFound(root.display().to_string()),
            _ => WatchmanError::Io(e),
        })?;
        if !root.is_dir() {
            return Err(WatchmanError::NotADirectory(root.display().to_string()));
        }

        // The notify thread must never block: registering a watch round-trips
        // through that thread, so a full channel here could deadlock the walker.
        let (tx, raw_events) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        let watch_set = Arc::new(WatchSet::new(NotifyBackend(watcher)));
        watch_set.try_add(&root)?;

        info!("👀 Watchman: watching {}", root.display());
        Ok(Self {
            root,
            filter,
            watch_set,
            raw_events,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn watch_set(&self) -> Arc<WatchSet> {
        self.watch_set.clone()
    }

    /// Runs until `cancel` fires or the consumer of `events` goes away.
    ///
    /// Sending to `events` blocks the notification loop while the consumer is
    /// busy: a slow consumer throttles the monitor instead of growing memory.
    pub async fn run(self, cancel: CancellationToken, events: mpsc::Sender<OutboundEvent>) {
        let Self {
            root,
            filter,
            watch_set,
            mut raw_events,
        } = self;

        // 1. Start the walker, then seed it with the already registered root
        let (walk_tx, walk_rx) = mpsc::channel(WALK_QUEUE_CAPACITY);
        let walker = tokio::spawn(walker_loop(watch_set.clone(), walk_rx, cancel.clone()));
        if walk_tx.send(root.clone()).await.is_err() {
            error!("👀 Watchman: walker for {} is gone", root.display());
        }

        // 2. Consume notifications
        let classifier = Classifier::new(&watch_set, &walk_tx, filter.as_ref());
        'events: loop {
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                raw = raw_events.recv() => match raw {
                    Some(raw) => raw,
                    None => break,
                },
            };

            let event = match raw {
                Ok(event) => event,
                Err(e) => {
                    warn!("👀 Watchman error: {}", e);
                    continue;
                }
            };

            for change in RawChange::from_event(event) {
                let Some(path) = classifier.classify(&change).await else {
                    continue;
                };

                let outbound = OutboundEvent::for_new_file(&path);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'events,
                    sent = events.send(outbound) => {
                        if sent.is_err() {
                            warn!("👀 Watchman: event consumer closed, stopping {}", root.display());
                            break 'events;
                        }
                    }
                }
            }
        }

        // 3. Shut down: drop the watch handle, close the queue, join the walker
        watch_set.close();
        drop(walk_tx);
        if let Err(e) = walker.await {
            error!("👀 Watchman: walker task failed: {}", e);
        }
        info!("👀 Watchman: stopped watching {}", root.display());
    }
}
