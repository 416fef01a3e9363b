use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Shutdown;

/// Pause between failed send attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Runs `op` until it succeeds, waiting `interval` after every failure.
/// Gives up only when `cancel` fires during a wait.
pub async fn retry_till_cancelled<F, Fut, E>(
    cancel: &CancellationToken,
    interval: Duration,
    runtime: &str,
    mut op: F,
) -> Result<(), Shutdown>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    loop {
        let Err(e) = op().await else {
            return Ok(());
        };

        warn!("📡 Telegram API failure: {}", e);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Shutdown::Interrupted { runtime: runtime.to_string() });
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
