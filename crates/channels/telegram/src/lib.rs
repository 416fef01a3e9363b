//! Telegram channel for Meerkat
//!
//! - transport: the `ChatTransport` seam and its teloxide implementation
//! - bot: the dispatch loop merging commands, periodic reports and
//!   background events into one stream of sends
//! - retry: the shared send retry policy
//! - periodic: periodic task definitions counted in base ticks

pub mod bot;
pub mod error;
pub mod periodic;
pub mod retry;
pub mod transport;

pub use bot::{BackgroundFunction, Bot, CommandHandler};
pub use error::{Shutdown, TransportError};
pub use periodic::{BASE_PERIOD, PeriodicTaskDef, TaskFunction};
pub use retry::{RETRY_INTERVAL, retry_till_cancelled};
pub use transport::{ChatTransport, InboundMessage, TelegramTransport};
