use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Tick period of the dispatch loop. Periodic task intervals are counted in
/// multiples of it.
pub const BASE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Produces the body of a periodic report. An empty report sends nothing.
#[async_trait]
pub trait TaskFunction: Send + Sync {
    async fn report(&self, cancel: &CancellationToken) -> String;
}

#[derive(Clone)]
pub struct PeriodicTaskDef {
    interval: u64,
    pub intro: String,
    pub function: Arc<dyn TaskFunction>,
}

impl PeriodicTaskDef {
    pub fn new(interval: Duration, base: Duration, intro: impl Into<String>, function: Arc<dyn TaskFunction>) -> Self {
        Self {
            interval: ticks_for(interval, base),
            intro: intro.into(),
            function,
        }
    }

    /// Number of base ticks between runs, at least 1.
    pub fn interval(&self) -> u64 {
        self.interval.max(1)
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval() == 0
    }

    pub fn message(&self, report: &str) -> String {
        format!("{} {}", self.intro, report)
    }
}

/// Rounds `interval` up to a whole number of `base` ticks; zero means every tick.
pub fn ticks_for(interval: Duration, base: Duration) -> u64 {
    if interval.is_zero() || base.is_zero() {
        return 1;
    }
    let ticks = interval.as_nanos().div_ceil(base.as_nanos());
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}
