//! Path utilities for Meerkat
//!
//! Handles tilde expansion, the app root and the cache directory used for
//! small bits of persisted state.

use std::path::PathBuf;

use tracing::debug;

pub const SERVICE_NAME: &str = "meerkat";

/// Cache directory used when running as a system service.
pub const DAEMON_STORAGE_DIR: &str = "/var/cache/meerkat";

/// Expands a leading tilde (~) to the user's home directory.
/// Examples:
/// "~/.meerkat" -> "/home/pi/.meerkat"
/// "/tmp/foo" -> "/tmp/foo" (no change)
pub fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

/// Helper to convert a potentially tilde-containing string into a PathBuf.
pub fn get_path(path: &str) -> PathBuf {
    PathBuf::from(expand_tilde(path))
}

/// Resolves the Meerkat app root using the MEERKAT_ROOT env var.
/// Handles absolute paths, tilde expansion, and names relative to $HOME.
pub fn get_app_root() -> PathBuf {
    let root_name = std::env::var("MEERKAT_ROOT").unwrap_or_else(|_| ".meerkat".to_string());

    if root_name.starts_with('/') {
        PathBuf::from(root_name)
    } else if root_name.starts_with('~') {
        get_path(&root_name)
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(root_name)
    }
}

/// Picks the first usable storage directory: the system cache dir when it
/// exists or can be created, otherwise the per-user cache dir.
pub fn storage_dir() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(DAEMON_STORAGE_DIR)];
    if let Some(cache) = dirs::cache_dir() {
        candidates.push(cache.join(SERVICE_NAME));
    }
    first_usable_dir(candidates)
}

pub(crate) fn first_usable_dir(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    for dir in candidates {
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => return Some(dir),
            Ok(_) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match std::fs::create_dir_all(&dir) {
                    Ok(()) => return Some(dir),
                    Err(e) => debug!("storage dir {} unusable: {}", dir.display(), e),
                }
            }
            Err(e) => debug!("storage dir {} unusable: {}", dir.display(), e),
        }
    }
    None
}
