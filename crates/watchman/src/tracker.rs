//! Watch set: which directories are registered with the OS notification
//! facility.
//!
//! The check and the registration happen under one lock, so concurrent
//! `try_add` calls for the same path register it with the OS exactly once.
//! A failed registration leaves the path untracked and a later retry is
//! possible.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::error::{Result, WatchmanError};

/// OS-level watch registration.
pub trait WatchBackend: Send {
    fn add(&mut self, path: &Path) -> notify::Result<()>;
    fn remove(&mut self, path: &Path) -> notify::Result<()>;
}

/// Non-recursive registrations on notify's platform watcher.
pub struct NotifyBackend(pub RecommendedWatcher);

impl WatchBackend for NotifyBackend {
    fn add(&mut self, path: &Path) -> notify::Result<()> {
        self.0.watch(path, RecursiveMode::NonRecursive)
    }

    fn remove(&mut self, path: &Path) -> notify::Result<()> {
        self.0.unwatch(path)
    }
}

struct Inner<B> {
    /// `None` once the monitor shut the handle down.
    backend: Option<B>,
    paths: HashSet<PathBuf>,
}

pub struct WatchSet<B: WatchBackend = NotifyBackend> {
    inner: Mutex<Inner<B>>,
}

impl<B: WatchBackend> WatchSet<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Mutex::new(Inner {
                backend: Some(backend),
                paths: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `path` unless it is already tracked.
    ///
    /// Returns `Ok(true)` without touching the OS when the path is already
    /// tracked, `Ok(false)` when this call registered it.
    pub fn try_add(&self, path: &Path) -> Result<bool> {
        let mut inner = self.lock();
        if inner.paths.contains(path) {
            return Ok(true);
        }

        let backend = inner.backend.as_mut().ok_or(WatchmanError::Closed)?;
        backend.add(path)?;
        inner.paths.insert(path.to_path_buf());
        Ok(false)
    }

    /// Forgets `path`. Removing an untracked path is a no-op; OS-level
    /// removal failures are only logged (the kernel usually dropped the
    /// watch together with the directory already).
    pub fn remove(&self, path: &Path) -> bool {
        let mut inner = self.lock();
        if !inner.paths.remove(path) {
            return false;
        }

        if let Some(backend) = inner.backend.as_mut() {
            if let Err(e) = backend.remove(path) {
                debug!("👀 Watchman: unwatch {} failed: {}", path.display(), e);
            }
        }
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of tracked paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().paths.iter().cloned().collect()
    }

    /// Drops the OS handle; further `try_add` calls fail with `Closed`.
    pub fn close(&self) {
        let backend = self.lock().backend.take();
        drop(backend);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().backend.is_none()
    }
}
