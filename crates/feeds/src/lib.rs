//! Meerkat feeds: the things the bot reports on.
//!
//! - temperature: 1-wire sensor reads and the change monitor
//! - external_ip: public IP change detection
//! - persist: last known IP on disk
//! - commands: `/ping`, `/temp`, `/pic`

pub mod commands;
pub mod error;
pub mod external_ip;
pub mod persist;
pub mod temperature;

pub use commands::{PictureCommand, PingCommand, TempCommand};
pub use error::FeedError;
pub use external_ip::PublicIpResolver;
pub use persist::IpStore;
pub use temperature::{TemperatureMonitor, TemperatureSensor};
