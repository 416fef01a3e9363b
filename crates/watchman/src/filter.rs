//! Filename predicates.
//!
//! A base [`FilenameFilter`] matches a file's base name against a set of
//! patterns; [`CreatedAfter`] and [`RateLimited`] wrap any filter with a
//! modification-time gate and a global minimum spacing between accepted
//! files.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use regex::Regex;
use tracing::debug;

use crate::error::Result;

pub trait FileFilter: Send + Sync {
    fn accept(&self, path: &Path) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Accepts a path when its base name matches any of the patterns.
#[derive(Debug, Clone)]
pub struct FilenameFilter {
    patterns: Vec<Regex>,
}

impl FilenameFilter {
    /// Compiles `patterns`. Besides plain regex syntax (`(?i)\.jpg$`), the
    /// slash form `\.jpg$/i` is read as a case-insensitive pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&normalize_pattern(p.as_ref())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

fn normalize_pattern(pattern: &str) -> String {
    match pattern.strip_suffix("/i") {
        Some(body) => format!("(?i){}", body),
        None => pattern.to_string(),
    }
}

impl FileFilter for FilenameFilter {
    fn accept(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.patterns.iter().any(|p| p.is_match(&name))
    }
}

/// Additionally requires the file to be modified strictly after the gate was
/// built, so files that existed before monitoring began are never reported.
pub struct CreatedAfter<F> {
    inner: F,
    since: SystemTime,
}

impl<F: FileFilter> CreatedAfter<F> {
    pub fn new(inner: F, since: SystemTime) -> Self {
        Self { inner, since }
    }
}

impl<F: FileFilter> FileFilter for CreatedAfter<F> {
    fn accept(&self, path: &Path) -> bool {
        if !self.inner.accept(path) {
            return false;
        }
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified > self.since,
            Err(e) => {
                debug!("👀 Watchman: stat {} failed: {}", path.display(), e);
                false
            }
        }
    }
}

/// Additionally enforces a minimum spacing between accepted files, across all
/// paths. Files arriving too soon are dropped, not deferred.
pub struct RateLimited<F> {
    inner: F,
    min_spacing: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl<F: FileFilter> RateLimited<F> {
    pub fn new(inner: F, min_spacing: Duration) -> Self {
        Self {
            inner,
            min_spacing,
            last_accepted: Mutex::new(None),
        }
    }
}

impl<F: FileFilter> FileFilter for RateLimited<F> {
    fn accept(&self, path: &Path) -> bool {
        if !self.inner.accept(path) {
            return false;
        }

        let mut last = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.min_spacing {
                debug!("👀 Watchman: rate limited {}", path.display());
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

/// Builder-style wrappers for any filter.
pub trait FileFilterExt: FileFilter + Sized {
    fn created_after(self, since: SystemTime) -> CreatedAfter<Self> {
        CreatedAfter::new(self, since)
    }

    fn created_after_now(self) -> CreatedAfter<Self> {
        CreatedAfter::new(self, SystemTime::now())
    }

    fn rate_limited(self, min_spacing: Duration) -> RateLimited<Self> {
        RateLimited::new(self, min_spacing)
    }
}

impl<F: FileFilter + Sized> FileFilterExt for F {}
