//! Meerkat Watchman - Recursive Directory Observer
//!
//! This module is organized into:
//! - types: raw change notifications (ChangeKind, RawChange)
//! - tracker: the watch set, deduplicating OS watch registrations
//! - walker: one-level directory walks feeding the watch set
//! - filter: filename predicates and their time / rate gates
//! - classify: turning raw changes into walk requests or new-file emissions
//! - watcher: the DirectoryMonitor tying it all together
//!
//! Data flow:
//!
//! ```text
//! notify ──► DirectoryMonitor ──► Classifier ──► FileFilter ──► OutboundEvent channel
//!                  │                  │
//!                  ▼                  ▼
//!               Walker ◄──────── WatchSet
//! ```

mod classify;
mod error;
mod filter;
mod tracker;
mod types;
mod walker;
mod watcher;

pub use classify::Classifier;
pub use error::{Result, WatchmanError};
pub use filter::{CreatedAfter, FileFilter, FileFilterExt, FilenameFilter, RateLimited};
pub use tracker::{NotifyBackend, WatchBackend, WatchSet};
pub use types::{ChangeKind, RawChange};
pub use walker::{WALK_QUEUE_CAPACITY, walk_tree, walker_loop};
pub use watcher::DirectoryMonitor;
