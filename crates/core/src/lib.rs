//! Meerkat Core
//!
//! Shared pieces used by every meerkat crate:
//! - config: environment / dotenv backed settings
//! - path_utils: app root and cache directory resolution
//! - event: the outbound chat message sum type
//! - error: settings errors

pub mod config;
pub mod error;
pub mod event;
pub mod path_utils;

pub use error::SettingsError;
pub use event::{Attachment, OutboundEvent};

use tracing::info;

pub fn init() {
    info!("🦦 Meerkat Core Initialized");
}
