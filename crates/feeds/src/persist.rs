use std::net::IpAddr;
use std::path::{Path, PathBuf};

use meerkat_core::path_utils;
use tracing::{debug, warn};

pub const IP_ADDRESS_FILE: &str = "ip.address";

/// Last known public IP, kept in a one-line file. Persistence is only an
/// optimization: every failure is logged and ignored.
#[derive(Debug, Clone)]
pub struct IpStore {
    path: Option<PathBuf>,
}

impl IpStore {
    /// `ip.address` under the first usable storage directory.
    pub fn default_location() -> Self {
        let path = path_utils::storage_dir().map(|dir| dir.join(IP_ADDRESS_FILE));
        if path.is_none() {
            warn!("💾 IP store: no usable storage directory, not persisting");
        }
        Self { path }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn read(&self) -> Option<IpAddr> {
        let path = self.path.as_ref()?;
        let raw = std::fs::read_to_string(path)
            .map_err(|e| debug!("💾 IP store: cannot read {}: {}", path.display(), e))
            .ok()?;
        raw.trim().parse().ok()
    }

    pub fn write(&self, ip: &IpAddr) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = std::fs::write(path, ip.to_string()) {
            warn!("💾 IP store: failed to persist {} to {}: {}", ip, path.display(), e);
        }
    }
}
